//! Compiling and parsing with a grammar loaded from `grammar.json`.

use sapling::{compile, parse_grammar, GrammarError, InputEdit, Parser};

const INI: &str = r##"{
  "name": "ini",
  "word": "identifier",
  "extras": [
    { "type": "SYMBOL", "name": "comment" },
    { "type": "PATTERN", "value": "\\s" }
  ],
  "rules": {
    "document": {
      "type": "REPEAT",
      "content": {
        "type": "CHOICE",
        "members": [
          { "type": "SYMBOL", "name": "section" },
          { "type": "SYMBOL", "name": "pair" }
        ]
      }
    },
    "section": {
      "type": "SEQ",
      "members": [
        { "type": "STRING", "value": "[" },
        { "type": "FIELD", "name": "name", "content": { "type": "SYMBOL", "name": "identifier" } },
        { "type": "STRING", "value": "]" }
      ]
    },
    "pair": {
      "type": "SEQ",
      "members": [
        { "type": "FIELD", "name": "key", "content": { "type": "SYMBOL", "name": "identifier" } },
        { "type": "STRING", "value": "=" },
        {
          "type": "FIELD",
          "name": "value",
          "content": {
            "type": "CHOICE",
            "members": [
              { "type": "SYMBOL", "name": "number" },
              { "type": "SYMBOL", "name": "boolean" },
              { "type": "SYMBOL", "name": "identifier" }
            ]
          }
        }
      ]
    },
    "boolean": {
      "type": "CHOICE",
      "members": [
        { "type": "STRING", "value": "true" },
        { "type": "STRING", "value": "false" }
      ]
    },
    "number": { "type": "PATTERN", "value": "\\d+" },
    "identifier": { "type": "PATTERN", "value": "[a-z_]+" },
    "comment": {
      "type": "TOKEN",
      "content": {
        "type": "SEQ",
        "members": [
          { "type": "STRING", "value": "#" },
          { "type": "PATTERN", "value": ".*" }
        ]
      }
    }
  }
}"##;

fn parser() -> Parser {
    let grammar = parse_grammar(INI).unwrap();
    let language = compile(&grammar).unwrap();
    let mut parser = Parser::new();
    parser.set_language(&language).unwrap();
    parser
}

#[test]
fn test_json_grammar_parses_documents() {
    let text = "[server]\nhost = local\nport = 8080\n# done\ndebug = true\n";
    let tree = parser().parse(text, None).unwrap();
    let root = tree.root_node();
    assert!(!root.has_error());
    assert_eq!(
        root.to_sexp(),
        "(document (section name: (identifier)) \
         (pair key: (identifier) value: (identifier)) \
         (pair key: (identifier) value: (number)) \
         (comment) \
         (pair key: (identifier) value: (boolean)))"
    );

    let port = root.named_child(2).unwrap();
    let value = port.child_by_field_name("value").unwrap();
    assert_eq!(value.utf8_text(text.as_bytes()).unwrap(), "8080");
    assert_eq!(value.start_position().row, 2);
    assert_eq!(value.start_position().column, 7);
}

#[test]
fn test_keywords_are_names_where_only_names_fit() {
    let tree = parser().parse("true = false", None).unwrap();
    assert_eq!(
        tree.root_node().to_sexp(),
        "(document (pair key: (identifier) value: (boolean)))"
    );
}

#[test]
fn test_reparse_after_edit() {
    let text = "a = 1\nb = 2\nc = 3";
    let mut parser = parser();
    let mut tree = parser.parse(text, None).unwrap();

    tree.edit(&InputEdit::replace(text, 10, 11, "two"));
    let new_text = "a = 1\nb = two\nc = 3";
    let tree = parser.parse(new_text, Some(&tree)).unwrap();
    assert_eq!(
        tree.root_node().to_sexp(),
        parser.parse(new_text, None).unwrap().root_node().to_sexp()
    );
    let value = tree
        .root_node()
        .named_child(1)
        .and_then(|pair| pair.child_by_field_name("value"))
        .unwrap();
    assert_eq!(value.kind(), "identifier");
}

#[test]
fn test_malformed_json_is_rejected() {
    assert!(matches!(
        parse_grammar("{ \"name\": "),
        Err(GrammarError::JsonParse(_))
    ));
}

#[test]
fn test_undefined_symbols_are_rejected() {
    let json = INI.replace("\"name\": \"number\"", "\"name\": \"numeral\"");
    let grammar = parse_grammar(&json).unwrap();
    assert!(matches!(
        compile(&grammar),
        Err(GrammarError::Validation(ref message)) if message.contains("'numeral'")
    ));
}
