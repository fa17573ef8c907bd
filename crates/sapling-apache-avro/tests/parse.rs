//! Parsing Apache Avro IDL documents with the compiled grammar.

use rstest::rstest;
use sapling::{InputEdit, Node, Parser, Tree};
use sapling_apache_avro::kinds;
use std::fmt::Write;

const GREETER: &str = r#"/* A protocol with one of everything */
@namespace("org.example.greeter")
protocol Greeter {
  import idl "common.avdl";

  enum Mood { HAPPY, SAD, } = HAPPY;

  fixed Hash(16);

  record Greeting {
    string @java-class("java.lang.String") message;
    union { null, string } note = null;
    array<int> counts;
    map<long> totals;
    decimal(9, 2) price;
    timestamp_ms sent;
    Mood mood = "HAPPY";
    bytes? raw;
    @order("ignore") string id;
  }

  error Oops { string reason; }

  // Messages
  Greeting hello(Greeting greeting, int times = 1) throws Oops;
  void ping() oneway;
}
"#;

fn parser() -> Parser {
    let mut parser = Parser::new();
    let language = sapling_apache_avro::language().expect("Error loading Apache Avro grammar");
    parser
        .set_language(&language)
        .expect("Error loading Apache Avro grammar");
    parser
}

fn parse(text: &str) -> Tree {
    parser().parse(text, None).unwrap()
}

fn kinds_of<'a>(nodes: impl Iterator<Item = Node<'a>>) -> Vec<&'a str> {
    nodes.map(|node| node.kind()).collect()
}

#[test]
fn test_protocol_parses_without_errors() {
    let tree = parse(GREETER);
    let root = tree.root_node();
    assert!(!root.has_error(), "{}", root.to_sexp());
    assert_eq!(root.kind(), kinds::PROGRAM);
    assert_eq!(root.end_byte(), GREETER.len());

    let protocol = root.named_child(1).unwrap();
    assert_eq!(protocol.kind(), kinds::PROTOCOL_DECLARATION);
    assert_eq!(
        protocol
            .child_by_field_name("name")
            .unwrap()
            .utf8_text(GREETER.as_bytes())
            .unwrap(),
        "Greeter"
    );

    let block = protocol.named_child(protocol.named_child_count() - 1).unwrap();
    assert_eq!(
        kinds_of(block.named_children()),
        [
            kinds::IMPORT_DECLARATION,
            kinds::ENUM_DECLARATION,
            kinds::FIXED_DECLARATION,
            kinds::RECORD_DECLARATION,
            kinds::ERROR_DECLARATION,
            kinds::COMMENT,
            kinds::RPC_MESSAGE_DECLARATION,
            kinds::RPC_MESSAGE_DECLARATION,
        ]
    );
}

#[test]
fn test_record_shape() {
    let tree = parse("record Foo { int a; }");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(program (record_declaration name: (identifier) (statement_block \
         (field_declaration type: (primitive_type) name: (identifier)))))"
    );
}

#[test]
fn test_default_values_are_aliased() {
    let tree = parse("record R { long count = 0; }");
    assert_eq!(
        tree.root_node().to_sexp(),
        "(program (record_declaration name: (identifier) (statement_block \
         (field_declaration type: (primitive_type) (default_value_expression \
         left: (identifier) right: (value (literal_type (number))))))))"
    );
}

#[test]
fn test_keywords_are_context_sensitive() {
    let text = "record R { date date; }";
    let tree = parse(text);
    let root = tree.root_node();
    assert!(!root.has_error(), "{}", root.to_sexp());

    let field = root.descendant_for_byte_range(11, 21).unwrap();
    assert_eq!(field.kind(), kinds::FIELD_DECLARATION);
    let field_type = field.child_by_field_name("type").unwrap();
    assert_eq!(field_type.kind(), kinds::LOGICAL_TYPE);
    assert_eq!(field_type.named_child(0).unwrap().kind(), "known_logical_type");
    let name = field.child_by_field_name("name").unwrap();
    assert_eq!(name.kind(), kinds::IDENTIFIER);
    assert_eq!(name.utf8_text(text.as_bytes()).unwrap(), "date");
}

#[test]
fn test_nullable_types() {
    let tree = parse("record R { @order(\"ignore\") string? s; }");
    let root = tree.root_node();
    assert!(!root.has_error(), "{}", root.to_sexp());
    assert!(root.to_sexp().contains("(nullable"), "{}", root.to_sexp());
}

#[rstest]
#[case::schema("schema int;")]
#[case::namespaced_schema("namespace org.example;\nschema Thing;")]
#[case::enumeration("enum Suit { SPADES, HEARTS } = SPADES;")]
#[case::fixed("fixed MD5(16);")]
#[case::annotated_record("@aliases([\"a\", \"b\"]) record R { }")]
#[case::union("record R { union { null, string } s = null; }")]
#[case::error("error E { string message; }")]
#[case::import("import idl \"common.avdl\";")]
#[case::message("int add(int a, int b);")]
#[case::comments("// leading\nrecord R { int a; } /* trailing */")]
#[case::empty("")]
fn test_valid_documents(#[case] text: &str) {
    let tree = parse(text);
    let root = tree.root_node();
    assert!(!root.has_error(), "{text:?} -> {}", root.to_sexp());
    assert_eq!(root.end_byte(), text.len());
}

#[test]
fn test_missing_semicolon_is_inserted() {
    let tree = parse("record R { int a }");
    let root = tree.root_node();
    assert!(root.has_error());
    assert!(
        root.to_sexp().contains("(MISSING \";\")"),
        "{}",
        root.to_sexp()
    );
    assert_eq!(root.named_child(0).unwrap().kind(), kinds::RECORD_DECLARATION);
}

#[test]
fn test_invalid_input_still_spans_the_document() {
    let text = "record { int a; }\nrecord Ok { string b; }";
    let tree = parse(text);
    let root = tree.root_node();
    assert!(root.has_error());
    assert_eq!(root.start_byte(), 0);
    assert_eq!(root.end_byte(), text.len());
}

#[test]
fn test_edit_and_reparse() {
    let text = "record A { int a; }\nrecord B { int b; }\nrecord C { int c; }\n";
    let mut parser = parser();
    let mut old = parser.parse(text, None).unwrap();

    let start = text.find("int b").unwrap();
    old.edit(&InputEdit::replace(text, start, start + 3, "long"));
    let new_text = text.replacen("int b", "long b", 1);

    let new = parser.parse(&new_text, Some(&old)).unwrap();
    let fresh = parser.parse(&new_text, None).unwrap();
    assert_eq!(new.root_node().to_sexp(), fresh.root_node().to_sexp());
    assert!(!new.root_node().has_error());

    let record = |tree: &Tree, index| tree.root_node().named_child(index).unwrap().id();
    assert_eq!(record(&new, 0), record(&old, 0));
    assert_ne!(record(&new, 1), record(&old, 1));
    assert_eq!(record(&new, 2), record(&old, 2));

    let ranges = new.changed_ranges(&old);
    assert!(
        ranges.iter().any(|r| r.start <= start && r.end >= start + 4),
        "{ranges:?}"
    );
}

/// Every node with its byte range, anonymous tokens included.
fn outline(node: Node<'_>) -> String {
    fn walk(node: Node<'_>, out: &mut String) {
        write!(out, "({} {:?}", node.kind(), node.byte_range()).unwrap();
        for child in node.children() {
            out.push(' ');
            walk(child, out);
        }
        out.push(')');
    }
    let mut out = String::new();
    walk(node, &mut out);
    out
}

fn token_boundaries(node: Node<'_>, out: &mut Vec<usize>) {
    if node.child_count() == 0 {
        out.extend([node.start_byte(), node.end_byte()]);
    }
    for child in node.children() {
        token_boundaries(child, out);
    }
}

/// Applies one edit to `text` and `tree`, reparses incrementally and checks the
/// result against a parse from scratch.
fn edit_and_compare(
    parser: &mut Parser,
    text: &mut String,
    tree: &mut Tree,
    range: std::ops::Range<usize>,
    replacement: &str,
) {
    tree.edit(&InputEdit::replace(text, range.start, range.end, replacement));
    text.replace_range(range.clone(), replacement);

    let fresh = parser.parse(text, None).unwrap();
    *tree = parser.parse(text, Some(&*tree)).unwrap();
    assert_eq!(
        outline(tree.root_node()),
        outline(fresh.root_node()),
        "{range:?} -> {replacement:?}\n{text}"
    );
    assert_eq!(tree.root_node().end_byte(), text.len());
}

#[rstest]
#[case::open_brace_before_field("    array<int> counts", 0, 0, "{")]
#[case::semicolon_for_angle("<long>", 0, 1, ";")]
#[case::drop_field_semicolon("note = null;", 11, 1, "")]
#[case::drop_fixed_paren("Hash(16);", 4, 1, "")]
#[case::drop_throws("throws Oops;", 0, 6, "")]
#[case::stray_close_brace("enum Mood", 0, 0, "}")]
#[case::drop_nullable_mark("bytes? raw", 5, 1, "")]
#[case::stray_nullable_mark("string reason;", 6, 0, "?")]
#[case::unterminated_comment("/* A protocol", 0, 2, "")]
#[case::drop_annotation_sigil("@namespace", 0, 1, "")]
#[case::rename_keyword("record Greeting", 0, 6, "recor")]
#[case::join_tokens("fixed Hash", 5, 1, "")]
fn test_reparse_after_edit_matches_fresh_parse(
    #[case] anchor: &str,
    #[case] offset: usize,
    #[case] deleted: usize,
    #[case] replacement: &str,
) {
    let mut parser = parser();
    let mut text = GREETER.to_string();
    let mut tree = parser.parse(&text, None).unwrap();
    let start = GREETER.find(anchor).unwrap() + offset;
    edit_and_compare(&mut parser, &mut text, &mut tree, start..start + deleted, replacement);
}

/// A xorshift generator, so the sweep below is the same on every run.
struct Seeded(u64);

impl Seeded {
    fn below(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % bound as u64) as usize
    }
}

#[test]
fn test_edit_sweep_matches_fresh_parses() {
    const REPLACEMENTS: [&str; 14] = [
        "", "{", "}", ";", "?", "<", ">", "(", ",", "@", "x", " int ", "record R { ", "\n",
    ];
    let mut parser = parser();
    let mut seeded = Seeded(0x5eed_0a5c_1d1c_2024);
    let mut text = String::new();
    let mut tree = parser.parse("", None).unwrap();

    for step in 0..120 {
        // Edits pile up on each other, so later ones land inside error
        // regions left by earlier ones.
        if step % 20 == 0 {
            text = GREETER.to_string();
            tree = parser.parse(&text, None).unwrap();
        }
        let mut boundaries = vec![text.len()];
        token_boundaries(tree.root_node(), &mut boundaries);
        let start = if seeded.below(4) == 0 {
            seeded.below(text.len() + 1)
        } else {
            boundaries[seeded.below(boundaries.len())]
        };
        let end = (start + seeded.below(4)).min(text.len());
        let replacement = REPLACEMENTS[seeded.below(REPLACEMENTS.len())];
        edit_and_compare(&mut parser, &mut text, &mut tree, start..end, replacement);
    }
}
