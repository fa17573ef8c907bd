//! Core types for representing Tree-sitter grammar rules.
//!
//! This module contains the types used to model grammar rules and their
//! structure according to the Tree-sitter JSON schema.

use serde::{Deserialize, Serialize};

/// Represents a grammar rule in the Tree-sitter format.
///
/// Each rule corresponds to a node in the grammar's rule graph, identified by a
/// [`RuleType`] and containing type-specific fields such as `members` or
/// `content`.
///
/// A `Rule` can be atomic (like a literal or regex) or composite
/// (like a sequence, choice, or precedence group). Together, they
/// form a self-describing syntax graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// The discriminant identifying what kind of rule this is.
    #[serde(rename = "type")]
    pub rule_type: RuleType,

    /// Optional literal or numeric value, depending on rule kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RuleValue>,

    /// Optional name used by `SYMBOL`, `FIELD`, or `ALIAS` rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional nested rule for unary constructs such as `REPEAT` or `PREC`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Box<Rule>>,

    /// List of child rules for compound constructs (`SEQ`, `CHOICE`, etc.).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Rule>,

    /// Whether the node produced by this rule is named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub named: Option<bool>,

    /// Regex flags for `PATTERN` rules (e.g. `"i"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,

    /// Optional context label used for reserved-word handling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_name: Option<String>,
}

/// A literal or numeric value attached to a rule node.
///
/// `RuleValue` abstracts small scalar payloads that alter how a rule behaves,
/// such as precedence numbers or literal match text. In `grammar.json` it is
/// written bare, so it deserializes untagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    /// An integer numeric value (used by precedence modifiers).
    Integer(i32),

    /// A string literal value (e.g. `"+"`, `"if"`), or a named precedence.
    String(String),
}

/// The enumeration of all recognized Tree-sitter rule types.
///
/// Each variant corresponds to one of the `type` strings found in the JSON
/// grammar format: the syntactic combinators that compose into a language's
/// structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleType {
    /// An empty (ε) production.
    #[serde(rename = "BLANK")]
    Blank,
    /// A literal string token.
    #[serde(rename = "STRING")]
    String,
    /// A regular-expression pattern token.
    #[serde(rename = "PATTERN")]
    Pattern,
    /// A reference to another named rule.
    #[serde(rename = "SYMBOL")]
    Symbol,
    /// A rule that matches one of several alternatives.
    #[serde(rename = "CHOICE")]
    Choice,
    /// A sequential composition of member rules.
    #[serde(rename = "SEQ")]
    Seq,
    /// A zero-or-more repetition of a rule.
    #[serde(rename = "REPEAT")]
    Repeat,
    /// A one-or-more repetition of a rule.
    #[serde(rename = "REPEAT1")]
    Repeat1,
    /// A generic precedence wrapper.
    #[serde(rename = "PREC")]
    Prec,
    /// A left-associative precedence wrapper.
    #[serde(rename = "PREC_LEFT")]
    PrecLeft,
    /// A right-associative precedence wrapper.
    #[serde(rename = "PREC_RIGHT")]
    PrecRight,
    /// A dynamic (runtime) precedence wrapper.
    #[serde(rename = "PREC_DYNAMIC")]
    PrecDynamic,
    /// A named field applied to a subrule.
    #[serde(rename = "FIELD")]
    Field,
    /// An alias providing an alternate node name.
    #[serde(rename = "ALIAS")]
    Alias,
    /// A tokenization wrapper.
    #[serde(rename = "TOKEN")]
    Token,
    /// A token that must appear immediately without leading trivia.
    #[serde(rename = "IMMEDIATE_TOKEN")]
    ImmediateToken,
    /// A reserved-word context wrapper.
    #[serde(rename = "RESERVED")]
    Reserved,
}

impl Rule {
    /// Creates a rule of the given type with every optional part empty.
    #[must_use]
    pub fn new(rule_type: RuleType) -> Self {
        Self {
            rule_type,
            value: None,
            name: None,
            content: None,
            members: Vec::new(),
            named: None,
            flags: None,
            context_name: None,
        }
    }

    /// Returns the canonical string name of this rule type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.rule_type {
            RuleType::Blank => "BLANK",
            RuleType::String => "STRING",
            RuleType::Pattern => "PATTERN",
            RuleType::Symbol => "SYMBOL",
            RuleType::Choice => "CHOICE",
            RuleType::Seq => "SEQ",
            RuleType::Repeat => "REPEAT",
            RuleType::Repeat1 => "REPEAT1",
            RuleType::Prec => "PREC",
            RuleType::PrecLeft => "PREC_LEFT",
            RuleType::PrecRight => "PREC_RIGHT",
            RuleType::PrecDynamic => "PREC_DYNAMIC",
            RuleType::Field => "FIELD",
            RuleType::Alias => "ALIAS",
            RuleType::Token => "TOKEN",
            RuleType::ImmediateToken => "IMMEDIATE_TOKEN",
            RuleType::Reserved => "RESERVED",
        }
    }

    /// Returns `true` if this rule represents a terminal (lexical) token.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.rule_type,
            RuleType::String | RuleType::Pattern | RuleType::Token | RuleType::ImmediateToken
        )
    }

    /// Returns `true` if this rule is a symbol reference.
    #[must_use]
    pub fn is_symbol(&self) -> bool {
        matches!(self.rule_type, RuleType::Symbol)
    }

    /// Returns `true` if this rule wraps a single `content` rule.
    #[must_use]
    pub fn is_wrapper(&self) -> bool {
        matches!(
            self.rule_type,
            RuleType::Repeat
                | RuleType::Repeat1
                | RuleType::Prec
                | RuleType::PrecLeft
                | RuleType::PrecRight
                | RuleType::PrecDynamic
                | RuleType::Field
                | RuleType::Alias
                | RuleType::Token
                | RuleType::ImmediateToken
                | RuleType::Reserved
        )
    }

    /// Returns the referenced symbol name, if applicable.
    #[must_use]
    pub fn symbol_name(&self) -> Option<&str> {
        if self.is_symbol() {
            self.name.as_deref()
        } else {
            None
        }
    }

    /// Returns the numeric precedence value if this rule is a precedence wrapper.
    #[must_use]
    pub fn precedence(&self) -> Option<i32> {
        match self.rule_type {
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight | RuleType::PrecDynamic => {
                self.value.as_ref().and_then(|v| match v {
                    RuleValue::Integer(i) => Some(*i),
                    RuleValue::String(_) => None,
                })
            }
            _ => None,
        }
    }

    /// Returns the named precedence if this wrapper uses one (`prec("name", ...)`).
    #[must_use]
    pub fn precedence_name(&self) -> Option<&str> {
        match self.rule_type {
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight => {
                self.value.as_ref().and_then(|v| match v {
                    RuleValue::String(s) => Some(s.as_str()),
                    RuleValue::Integer(_) => None,
                })
            }
            _ => None,
        }
    }

    /// Returns the literal string value if this is a `STRING` rule.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        if matches!(self.rule_type, RuleType::String) {
            self.value.as_ref().and_then(|v| match v {
                RuleValue::String(s) => Some(s.as_str()),
                RuleValue::Integer(_) => None,
            })
        } else {
            None
        }
    }

    /// Returns the pattern source if this is a `PATTERN` rule.
    #[must_use]
    pub fn pattern_value(&self) -> Option<&str> {
        if matches!(self.rule_type, RuleType::Pattern) {
            self.value.as_ref().and_then(|v| match v {
                RuleValue::String(s) => Some(s.as_str()),
                RuleValue::Integer(_) => None,
            })
        } else {
            None
        }
    }

    /// The alias or field name carried by `ALIAS`/`FIELD` rules.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self.rule_type {
            RuleType::Field => self.name.as_deref(),
            RuleType::Alias => self.value.as_ref().and_then(|v| match v {
                RuleValue::String(s) => Some(s.as_str()),
                RuleValue::Integer(_) => None,
            }),
            _ => None,
        }
    }

    /// Child rules, whichever of `content` or `members` this rule uses.
    pub fn children(&self) -> impl Iterator<Item = &Rule> {
        self.content.as_deref().into_iter().chain(self.members.iter())
    }
}
