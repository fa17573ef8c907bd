//! The Apache Avro IDL grammar for sapling.
//!
//! [`grammar`] builds the grammar with sapling's DSL; [`language`] compiles it
//! once and hands out cheap clones of the result.
//!
//! ```
//! use sapling::Parser;
//!
//! let mut parser = Parser::new();
//! parser.set_language(&sapling_apache_avro::language()?)?;
//! let tree = parser.parse("record Point { int x; int y; }", None).unwrap();
//! assert!(!tree.root_node().has_error());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use sapling::grammar::dsl::{
    alias, choice, comma_sep, field, optional, pattern, prec, prec_right, repeat, seq, string,
    sym, token, GrammarBuilder,
};
use sapling::{Grammar, GrammarError, Language, Rule};
use std::sync::OnceLock;

/// Names of the node kinds the grammar produces.
pub mod kinds {
    /// The root of every document.
    pub const PROGRAM: &str = "program";
    /// `schema <type>;`
    pub const SCHEMA_DECLARATION: &str = "schema_declaration";
    /// `protocol Name { ... }`
    pub const PROTOCOL_DECLARATION: &str = "protocol_declaration";
    /// `import idl "file.avdl";`
    pub const IMPORT_DECLARATION: &str = "import_declaration";
    /// `record Name { ... }`
    pub const RECORD_DECLARATION: &str = "record_declaration";
    /// `error Name { ... }`
    pub const ERROR_DECLARATION: &str = "error_declaration";
    /// `enum Name { A, B } = A;`
    pub const ENUM_DECLARATION: &str = "enum_declaration";
    /// `fixed Name(16);`
    pub const FIXED_DECLARATION: &str = "fixed_declaration";
    /// A message of a protocol: `Type name(params) throws Error;`
    pub const RPC_MESSAGE_DECLARATION: &str = "rpc_message_declaration";
    /// A field of a record or error.
    pub const FIELD_DECLARATION: &str = "field_declaration";
    /// `@name(arguments)`
    pub const ANOTATION_STATEMENT: &str = "anotation_statement";
    /// `namespace a.b.c;`
    pub const NAMESPACE_STATEMENT: &str = "namespace_statement";
    /// `int`, `long`, `string` and the other primitive types.
    pub const PRIMITIVE_TYPE: &str = "primitive_type";
    /// `date`, `uuid`, `decimal(p, s)`, or a named type.
    pub const LOGICAL_TYPE: &str = "logical_type";
    /// A type followed by `?`.
    pub const NULLABLE: &str = "nullable";
    /// A plain name.
    pub const IDENTIFIER: &str = "identifier";
    /// `//` and `/* */` comments.
    pub const COMMENT: &str = "comment";
}

/// Precedence levels of the grammar's rules.
mod precedence {
    pub const ASSIGN: i32 = 0;
    pub const CALL: i32 = 5;
    pub const STATEMENT: i32 = 8;
    pub const MEMBER: i32 = 9;
}

// Characters that may start a name: anything but controls, whitespace,
// digits and punctuation, or a `\u` escape.
const NAME_START: &str = r#"[^\x00-\x1F\s\p{Zs}0-9:;"'@#,|^&<=>+\*/\\%?!~()\[\]{}\uFEFF\u2060\u200B\u2028\u2029]|\\u[0-9a-fA-F]{4}|\\u\{[0-9a-fA-F]+\}"#;
const NAME_CONTINUE: &str = r#"[^\x00-\x1F\s\p{Zs}:;"'@#,|^&<=>+\*/\\%?!~()\[\]{}\uFEFF\u2060\u200B\u2028\u2029]|\\u[0-9a-fA-F]{4}|\\u\{[0-9a-fA-F]+\}"#;

// Identifiers additionally exclude `.` and `-`, which namespaces allow.
const IDENTIFIER_START: &str = r#"[^\x00-\x1F\s\p{Zs}0-9:;"'@#.,|^&<=>+\-*/\\%?!~()\[\]{}\uFEFF\u2060\u200B\u2028\u2029]|\\u[0-9a-fA-F]{4}|\\u\{[0-9a-fA-F]+\}"#;
const IDENTIFIER_CONTINUE: &str = r#"[^\x00-\x1F\s\p{Zs}:;"'@#.,|^&<=>+\-*/\\%?!~()\[\]{}\uFEFF\u2060\u200B\u2028\u2029]|\\u[0-9a-fA-F]{4}|\\u\{[0-9a-fA-F]+\}"#;

/// Builds the Avro IDL grammar.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn grammar() -> Grammar {
    use precedence::{ASSIGN, CALL, MEMBER, STATEMENT};

    GrammarBuilder::new("apache_avro")
        .conflict(&["_anotated_type", "nullable"])
        .word("identifier")
        .extras([
            sym("comment"),
            pattern(r"[\s\p{Zs}\uFEFF\u2028\u2029\u2060\u200B]"),
        ])
        .rule("program", repeat(sym("_all_declarations")))
        .rule(
            "_all_declarations",
            choice(
                [
                    "schema_declaration",
                    "protocol_declaration",
                    "import_declaration",
                    "enum_declaration",
                    "fixed_declaration",
                    "record_declaration",
                    "error_declaration",
                    "rpc_message_declaration",
                ]
                .map(sym),
            ),
        )
        .rule(
            "_protocol_declarations",
            choice(
                [
                    "import_declaration",
                    "enum_declaration",
                    "fixed_declaration",
                    "record_declaration",
                    "error_declaration",
                    "rpc_message_declaration",
                ]
                .map(sym),
            ),
        )
        .rule(
            "schema_declaration",
            prec(
                MEMBER,
                seq([
                    optional(sym("namespace_statement")),
                    string("schema"),
                    choice([sym("primitive_type"), sym("identifier")]),
                    string(";"),
                ]),
            ),
        )
        .rule(
            "protocol_declaration",
            prec(
                MEMBER,
                seq([
                    optional(sym("anotation_statement")),
                    string("protocol"),
                    field("name", sym("identifier")),
                    sym("protocol_block"),
                ]),
            ),
        )
        .rule(
            "protocol_block",
            block(optional(repeat(sym("_protocol_declarations")))),
        )
        .rule(
            "import_declaration",
            prec(
                MEMBER,
                seq([
                    string("import"),
                    sym("identifier"),
                    sym("literal_type"),
                    string(";"),
                ]),
            ),
        )
        .rule(
            "fixed_declaration",
            prec(
                MEMBER,
                seq([
                    string("fixed"),
                    choice([sym("call_expression"), sym("identifier")]),
                    string(";"),
                ]),
            ),
        )
        .rule(
            "record_declaration",
            prec(
                MEMBER,
                seq([
                    optional(sym("anotation_statement")),
                    string("record"),
                    field("name", sym("identifier")),
                    sym("statement_block"),
                ]),
            ),
        )
        .rule(
            "error_declaration",
            prec(
                MEMBER,
                seq([
                    string("error"),
                    field("name", sym("identifier")),
                    sym("statement_block"),
                ]),
            ),
        )
        .rule(
            "enum_declaration",
            prec(
                MEMBER,
                seq([
                    optional(sym("anotation_statement")),
                    string("enum"),
                    field("name", sym("identifier")),
                    sym("enum_block"),
                    optional(sym("default_enumeral")),
                ]),
            ),
        )
        .rule(
            "enum_block",
            block(optional(repeat(seq([
                sym("enumeral"),
                optional(string(",")),
            ])))),
        )
        .rule(
            "statement_block",
            block(optional(repeat(sym("field_declaration")))),
        )
        .rule(
            "default_enumeral",
            seq([string("="), sym("identifier"), string(";")]),
        )
        .rule("enumeral", sym("identifier"))
        .rule(
            "call_expression",
            prec(CALL, seq([sym("identifier"), sym("argument_list")])),
        )
        .rule(
            "argument_list",
            parenthesized(comma_sep(optional(sym("_expression")))),
        )
        .rule(
            "field_declaration",
            seq([
                field("type", sym("_possible_types")),
                optional(sym("anotation_statement")),
                choice([
                    field("name", sym("identifier")),
                    sym("default_value_expression"),
                ]),
                string(";"),
            ]),
        )
        .rule(
            "rpc_message_declaration",
            seq([
                sym("return_value"),
                seq([field("name", sym("identifier")), sym("parameter_list")]),
                optional(choice([sym("throw_statement"), sym("oneway")])),
                string(";"),
            ]),
        )
        .rule(
            "return_value",
            choice([sym("_possible_types"), sym("void")]),
        )
        .rule(
            "parameter_list",
            parenthesized(comma_sep(optional(sym("parameter")))),
        )
        .rule(
            "parameter",
            seq([
                field("type", sym("_possible_types")),
                field(
                    "name",
                    choice([sym("identifier"), sym("default_value_expression")]),
                ),
            ]),
        )
        .rule(
            "throw_statement",
            seq([string("throws"), sym("identifier")]),
        )
        .rule("oneway", string("oneway"))
        .rule(
            "namespace_statement",
            prec(
                STATEMENT,
                seq([
                    string("namespace"),
                    sym("namespace_identifier"),
                    string(";"),
                ]),
            ),
        )
        .rule(
            "anotation_statement",
            prec(
                STATEMENT,
                seq([
                    field("name", sym("anotation_identifier")),
                    sym("anotation_arguments"),
                ]),
            ),
        )
        .rule(
            "anotation_arguments",
            parenthesized(choice([
                sym("literal_type"),
                seq([
                    string("["),
                    comma_sep(optional(sym("literal_type"))),
                    string("]"),
                ]),
            ])),
        )
        .rule(
            "_possible_types",
            choice(
                [
                    "primitive_type",
                    "logical_type",
                    "array",
                    "map",
                    "union",
                    "nullable",
                    "_anotated_type",
                ]
                .map(sym),
            ),
        )
        .rule(
            "_anotated_type",
            seq([sym("anotation_statement"), sym("_possible_types")]),
        )
        .rule(
            "assignment_expression",
            prec_right(
                ASSIGN,
                seq([
                    field("right", sym("identifier")),
                    string("="),
                    field("left", sym("_expression")),
                ]),
            ),
        )
        .rule(
            "default_value_expression",
            prec_right(
                ASSIGN,
                seq([
                    field("left", sym("identifier")),
                    string("="),
                    field(
                        "right",
                        alias(sym("_constructable_expression"), "value", true),
                    ),
                ]),
            ),
        )
        .rule(
            "_expression",
            choice([
                sym("_constructable_expression"),
                sym("assignment_expression"),
                sym("call_expression"),
            ]),
        )
        .rule(
            "_constructable_expression",
            choice([sym("literal_type"), sym("identifier")]),
        )
        .rule("namespace_identifier", name(None, NAME_START, NAME_CONTINUE))
        .rule(
            "anotation_identifier",
            name(Some("@"), NAME_START, NAME_CONTINUE),
        )
        .rule(
            "identifier",
            name(None, IDENTIFIER_START, IDENTIFIER_CONTINUE),
        )
        .rule("array", seq([string("array"), sym("type_block")]))
        .rule("map", seq([string("map"), sym("type_block")]))
        .rule(
            "type_block",
            seq([string("<"), sym("_possible_types"), string(">")]),
        )
        .rule("union", seq([string("union"), sym("union_block")]))
        .rule("union_block", block(comma_sep(sym("_possible_types"))))
        .rule("nullable", seq([sym("_possible_types"), string("?")]))
        .rule(
            "logical_type",
            choice([
                sym("known_logical_type"),
                sym("identifier"),
                sym("call_expression"),
            ]),
        )
        .rule(
            "known_logical_type",
            choice([
                sym("decimal"),
                string("date"),
                string("time_ms"),
                string("timestamp_ms"),
                string("local_timestamp_ms"),
                string("uuid"),
            ]),
        )
        .rule(
            "decimal",
            seq([string("decimal"), optional(sym("argument_list"))]),
        )
        .rule(
            "primitive_type",
            choice(
                [
                    "int", "long", "string", "boolean", "float", "double", "null", "bytes",
                ]
                .map(string),
            ),
        )
        .rule("void", string("void"))
        .rule(
            "literal_type",
            choice(["number", "string", "true", "false", "null"].map(sym)),
        )
        .rule("string", string_literal())
        .rule("number", number())
        .rule("true", string("true"))
        .rule("false", string("false"))
        .rule("null", string("null"))
        .rule("comment", comment())
        .build()
}

/// The compiled Avro IDL language.
///
/// The grammar is compiled on the first successful call and shared after
/// that.
///
/// # Errors
///
/// Returns the [`GrammarError`] that compiling the grammar produced.
pub fn language() -> Result<Language, GrammarError> {
    static LANGUAGE: OnceLock<Language> = OnceLock::new();

    if let Some(language) = LANGUAGE.get() {
        return Ok(language.clone());
    }
    let language = sapling::compile(&grammar())?;
    tracing::debug!(
        states = language.state_count(),
        symbols = language.symbol_count(),
        "compiled apache_avro"
    );
    Ok(LANGUAGE.get_or_init(|| language).clone())
}

/// `{ rule }`
fn block(rule: Rule) -> Rule {
    seq([string("{"), rule, string("}")])
}

/// `( rule )`
fn parenthesized(rule: Rule) -> Rule {
    seq([string("("), rule, string(")")])
}

/// A name token: an optional sigil, one start character, then any number of
/// continuing characters.
fn name(sigil: Option<&str>, start: &str, rest: &str) -> Rule {
    let mut members: Vec<Rule> = sigil.map(string).into_iter().collect();
    members.push(pattern(start));
    members.push(repeat(pattern(rest)));
    token(seq(members))
}

/// Single- or double-quoted strings with backslash escapes.
fn string_literal() -> Rule {
    token(choice([
        seq([string("'"), pattern(r"([^'\n]|\\(.|\n))*"), string("'")]),
        seq([string("\""), pattern(r#"([^"\n]|\\(.|\n))*"#), string("\"")]),
    ]))
}

/// Integers and decimals with optional sign, exponent and `_` separators.
fn number() -> Rule {
    let decimal_digits = || pattern(r"\d(_?\d)*");
    let signed_integer = || {
        seq([
            optional(choice([string("-"), string("+")])),
            decimal_digits(),
        ])
    };
    let exponent_part = || seq([choice([string("e"), string("E")]), signed_integer()]);
    let decimal_integer_literal = || {
        choice([
            string("0"),
            seq([
                optional(string("0")),
                pattern("[1-9]"),
                optional(decimal_digits()),
            ]),
        ])
    };

    token(choice([
        seq([
            decimal_integer_literal(),
            string("."),
            optional(decimal_digits()),
            optional(exponent_part()),
        ]),
        seq([string("."), decimal_digits(), optional(exponent_part())]),
        seq([decimal_integer_literal(), exponent_part()]),
        signed_integer(),
        decimal_digits(),
    ]))
}

/// `// line` and `/* block */` comments.
fn comment() -> Rule {
    token(choice([
        seq([string("//"), pattern(r"[^\r\n\u2028\u2029]*")]),
        seq([
            string("/*"),
            pattern(r"[^*]*\*+([^/*][^*]*\*+)*"),
            string("/"),
        ]),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapling::Parser;

    #[test]
    fn test_can_load_grammar() {
        let mut parser = Parser::new();
        let language = language().expect("Error loading Apache Avro grammar");
        parser
            .set_language(&language)
            .expect("Error loading Apache Avro grammar");
    }

    #[test]
    fn test_language_is_compiled_once() {
        let first = language().unwrap();
        let second = language().unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn test_grammar_is_valid() {
        let warnings = sapling::validate(&grammar()).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_grammar_round_trips_through_json() {
        let grammar = grammar();
        let json = grammar.to_json().unwrap();
        let parsed = sapling::parse_grammar(&json).unwrap();
        assert_eq!(parsed.name, "apache_avro");
        assert_eq!(parsed.rules.len(), grammar.rules.len());
        assert_eq!(parsed.word.as_deref(), Some("identifier"));
    }
}
