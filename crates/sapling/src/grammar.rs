//! Core structures and parsing logic for Tree-sitter grammars.
//!
//! This module defines the internal representation of a grammar as parsed from
//! Tree-sitter's JSON format. It uses [`serde_json`] for deserialization and
//! provides ergonomic accessors for inspecting rule properties and structure.
//! Grammars can also be written directly in Rust through the [`dsl`] helpers.

pub mod dsl;
mod rules;

pub use rules::{Rule, RuleType, RuleValue};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents a full Tree-sitter grammar definition.
///
/// This structure directly mirrors the serialized JSON format produced by
/// `tree-sitter generate`. It captures the complete rule set along with
/// auxiliary metadata such as precedences, conflicts, and supertypes.
///
/// `Grammar` is the root artifact in Sapling's parsing pipeline. Rule order is
/// preserved: the first rule is the start rule.
///
/// See <https://tree-sitter.github.io/tree-sitter/assets/schemas/grammar.schema.json>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    /// Optional `$schema` field from the JSON, typically used for schema
    /// validation or editor integration.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// The short name of the grammar (e.g. `"javascript"` or `"rust"`).
    pub name: String,

    /// Optional name of a base grammar that this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits: Option<String>,

    /// All rule identifiers mapped to their definitions, in declaration order.
    pub rules: IndexMap<String, Rule>,

    /// “Extras” that may appear between other tokens, such as whitespace or comments.
    /// A grammar that leaves the key out gets `/\s/`, as `grammar.js` does.
    #[serde(default = "default_extras")]
    pub extras: Vec<Rule>,

    /// Rules implemented externally via a scanner.
    #[serde(default)]
    pub externals: Vec<Rule>,

    /// Names of rules that should be inlined into other rules.
    #[serde(default)]
    pub inline: Vec<String>,

    /// Precedence orderings: each list names levels from highest to lowest.
    #[serde(default)]
    pub precedences: Vec<Vec<Rule>>,

    /// Explicit conflict groups expected during parsing.
    #[serde(default)]
    pub conflicts: Vec<Vec<String>>,

    /// Context-specific reserved word definitions.
    #[serde(default)]
    pub reserved: IndexMap<String, Vec<Rule>>,

    /// The special rule name used to identify word tokens (keywords, identifiers, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,

    /// A list of node supertypes, grouping related syntactic forms.
    #[serde(default)]
    pub supertypes: Vec<String>,
}

fn default_extras() -> Vec<Rule> {
    vec![dsl::pattern(r"\s")]
}

impl Grammar {
    /// The start rule's name: the first rule declared.
    #[must_use]
    pub fn start_rule(&self) -> Option<&str> {
        self.rules.keys().next().map(String::as_str)
    }

    /// Serializes the grammar back to Tree-sitter's JSON format.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::JsonParse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, GrammarError> {
        serde_json::to_string_pretty(self).map_err(|e| GrammarError::JsonParse(e.to_string()))
    }
}

/// Parse a JSON grammar definition into a strongly typed [`Grammar`] structure.
///
/// # Errors
///
/// Returns [`GrammarError::JsonParse`] if the provided string is not valid JSON
/// or fails schema deserialization.
pub fn parse_grammar(json: &str) -> Result<Grammar, GrammarError> {
    serde_json::from_str(json).map_err(|e| GrammarError::JsonParse(e.to_string()))
}

/// Possible errors raised while loading, validating or compiling a grammar.
#[derive(Debug, Error)]
pub enum GrammarError {
    /// The input JSON was syntactically invalid or structurally mismatched.
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Higher-level structural or semantic validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// The grammar defines no rules.
    #[error("grammar '{0}' has no rules")]
    EmptyGrammar(String),

    /// A rule, extra, conflict or word token names a rule that does not exist.
    #[error("undefined symbol '{name}' referenced in {context}")]
    UndefinedSymbol {
        /// The missing rule name.
        name: String,
        /// Where the reference was found.
        context: String,
    },

    /// A token's regular expression failed to compile.
    #[error("invalid pattern for token '{terminal}': {source}")]
    InvalidPattern {
        /// The token whose pattern is invalid.
        terminal: String,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// A construct the compiler does not handle.
    #[error("unsupported grammar construct: {0}")]
    Unsupported(String),

    /// An LR conflict that neither precedence nor the `conflicts` list resolves.
    #[error("unresolved conflict for symbols [{}] on lookahead '{lookahead}'", .symbols.join(", "))]
    Conflict {
        /// The rules whose items conflict.
        symbols: Vec<String>,
        /// The lookahead token on which they conflict.
        lookahead: String,
    },

    /// The grammar needs more symbols than a parse table can address.
    #[error("grammar has too many symbols ({0})")]
    TooManySymbols(usize),
}

impl From<crate::validate::ValidationError> for GrammarError {
    fn from(error: crate::validate::ValidationError) -> Self {
        GrammarError::Validation(error.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_grammar() {
        let json = r#"{
            "name": "test",
            "rules": {
                "source_file": {
                    "type": "SYMBOL",
                    "name": "expression"
                },
                "expression": {
                    "type": "CHOICE",
                    "members": [
                        {
                            "type": "STRING",
                            "value": "hello"
                        },
                        {
                            "type": "PATTERN",
                            "value": "[0-9]+"
                        }
                    ]
                }
            }
        }"#;

        let grammar = parse_grammar(json).unwrap();
        assert_eq!(grammar.name, "test");
        assert_eq!(grammar.rules.len(), 2);
        assert_eq!(grammar.start_rule(), Some("source_file"));
        assert_eq!(grammar.extras, vec![dsl::pattern(r"\s")]);
    }

    #[test]
    fn test_explicit_empty_extras_are_kept() {
        let json = r#"{"name":"t","extras":[],"rules":{"a":{"type":"STRING","value":"x"}}}"#;
        let grammar = parse_grammar(json).unwrap();
        assert!(grammar.extras.is_empty());
    }

    #[test]
    fn test_missing_extras_match_the_builder_default() {
        let json = r#"{"name":"t","rules":{"a":{"type":"STRING","value":"x"}}}"#;
        let built = dsl::GrammarBuilder::new("t").rule("a", dsl::string("x")).build();
        assert_eq!(parse_grammar(json).unwrap(), built);
    }

    #[test]
    fn test_parse_precedence() {
        let json = r#"{
            "name": "test",
            "rules": {
                "expr": {
                    "type": "PREC_LEFT",
                    "value": 1,
                    "content": {
                        "type": "SEQ",
                        "members": [
                            {"type": "SYMBOL", "name": "expr"},
                            {"type": "STRING", "value": "+"},
                            {"type": "SYMBOL", "name": "expr"}
                        ]
                    }
                }
            },
            "conflicts": [["expr"]],
            "word": "expr"
        }"#;

        let grammar = parse_grammar(json).unwrap();
        let expr_rule = grammar.rules.get("expr").unwrap();
        assert_eq!(expr_rule.precedence(), Some(1));
        assert!(matches!(expr_rule.rule_type, RuleType::PrecLeft));
        assert_eq!(grammar.conflicts, vec![vec!["expr".to_string()]]);
        assert_eq!(grammar.word.as_deref(), Some("expr"));
    }

    #[test]
    fn test_rule_order_is_preserved() {
        let json = r#"{
            "name": "ordered",
            "rules": {
                "zeta": {"type": "SYMBOL", "name": "alpha"},
                "alpha": {"type": "STRING", "value": "a"},
                "mid": {"type": "BLANK"}
            }
        }"#;

        let grammar = parse_grammar(json).unwrap();
        let names: Vec<_> = grammar.rules.keys().map(String::as_str).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let err = parse_grammar("{ not json").unwrap_err();
        assert!(matches!(err, GrammarError::JsonParse(_)));
        assert!(err.to_string().starts_with("JSON parse error"));
    }

    #[test]
    fn test_json_round_trip_keeps_rules() {
        let json = r#"{"name":"t","rules":{"a":{"type":"STRING","value":"x"}}}"#;
        let grammar = parse_grammar(json).unwrap();
        let again = parse_grammar(&grammar.to_json().unwrap()).unwrap();
        assert_eq!(grammar, again);
    }
}
