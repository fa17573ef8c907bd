//! A Rust-native tree-sitter.
//!
//! Sapling compiles Tree-sitter grammars (from `grammar.json` or the
//! [`grammar::dsl`] builders) into LR(1) parse tables, and parses documents
//! with them into persistent syntax trees that can be edited and reparsed
//! incrementally.
//!
//! ```
//! use sapling::grammar::dsl::{field, pattern, repeat, seq, string, sym, GrammarBuilder};
//! use sapling::{compile, InputEdit, Parser};
//!
//! let grammar = GrammarBuilder::new("assignments")
//!     .rule("program", repeat(sym("assignment")))
//!     .rule(
//!         "assignment",
//!         seq([field("name", sym("name")), string("="), field("value", sym("name"))]),
//!     )
//!     .rule("name", pattern("[a-z]+"))
//!     .build();
//! let language = compile(&grammar)?;
//!
//! let mut parser = Parser::new();
//! parser.set_language(&language)?;
//! let text = "a = b\nc = d";
//! let mut tree = parser.parse(text, None).unwrap();
//! assert_eq!(
//!     tree.root_node().to_sexp(),
//!     "(program (assignment name: (name) value: (name)) (assignment name: (name) value: (name)))"
//! );
//!
//! tree.edit(&InputEdit::replace(text, 10, 11, "e"));
//! let tree = parser.parse("a = b\nc = e", Some(&tree)).unwrap();
//! assert!(!tree.root_node().has_error());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

/// Core structures and parsing logic for Tree-sitter grammars.
///
/// This module defines how Sapling understands and manipulates the
/// declarative shape of a language: the grammar itself. Everything else
/// in the compiler builds upon these types.
pub mod grammar;

/// Grammar validation and consistency checking utilities.
///
/// Validation exists to protect the compiler from malformed grammars. It
/// enforces Tree-sitter's invariants and ensures that what's parsed is also
/// semantically meaningful.
pub mod validate;

pub mod compile;
pub mod language;
mod lexer;
pub mod parser;
pub mod tree;

pub use compile::compile;
pub use grammar::{parse_grammar, Grammar, GrammarError, Rule};
pub use language::{Language, LanguageError, Symbol};
pub use parser::Parser;
pub use tree::{InputEdit, Length, Node, Point, Tree};
pub use validate::{validate, ValidationError, ValidationWarning};
