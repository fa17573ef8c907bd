//! Builders mirroring Tree-sitter's `grammar.js` DSL.
//!
//! Each helper returns the [`Rule`] that `tree-sitter generate` would emit for
//! the corresponding JavaScript call, so a grammar written with them is
//! indistinguishable from one loaded out of `grammar.json`:
//!
//! ```
//! use sapling::grammar::dsl::{choice, seq, string, sym, GrammarBuilder};
//!
//! let grammar = GrammarBuilder::new("greeting")
//!     .rule("source", seq([string("hello"), sym("name")]))
//!     .rule("name", choice([string("world"), string("there")]))
//!     .build();
//! assert_eq!(grammar.start_rule(), Some("source"));
//! ```

use super::{Grammar, Rule, RuleType, RuleValue};
use indexmap::IndexMap;

/// A reference to another rule (`$.name`).
#[must_use]
pub fn sym(name: &str) -> Rule {
    Rule {
        name: Some(name.to_string()),
        ..Rule::new(RuleType::Symbol)
    }
}

/// A literal token (`"text"`).
#[must_use]
pub fn string(text: &str) -> Rule {
    Rule {
        value: Some(RuleValue::String(text.to_string())),
        ..Rule::new(RuleType::String)
    }
}

/// A regular-expression token (`/source/`), written in JavaScript syntax.
#[must_use]
pub fn pattern(source: &str) -> Rule {
    Rule {
        value: Some(RuleValue::String(source.to_string())),
        ..Rule::new(RuleType::Pattern)
    }
}

/// The empty rule.
#[must_use]
pub fn blank() -> Rule {
    Rule::new(RuleType::Blank)
}

/// Rules matched one after another.
#[must_use]
pub fn seq(members: impl IntoIterator<Item = Rule>) -> Rule {
    Rule {
        members: members.into_iter().collect(),
        ..Rule::new(RuleType::Seq)
    }
}

/// Exactly one of several alternatives.
#[must_use]
pub fn choice(members: impl IntoIterator<Item = Rule>) -> Rule {
    Rule {
        members: members.into_iter().collect(),
        ..Rule::new(RuleType::Choice)
    }
}

/// Zero or one occurrence; `tree-sitter` encodes this as a choice with blank.
#[must_use]
pub fn optional(rule: Rule) -> Rule {
    choice([rule, blank()])
}

fn wrap(rule_type: RuleType, value: Option<RuleValue>, content: Rule) -> Rule {
    Rule {
        value,
        content: Some(Box::new(content)),
        ..Rule::new(rule_type)
    }
}

/// Zero or more occurrences.
#[must_use]
pub fn repeat(rule: Rule) -> Rule {
    wrap(RuleType::Repeat, None, rule)
}

/// One or more occurrences.
#[must_use]
pub fn repeat1(rule: Rule) -> Rule {
    wrap(RuleType::Repeat1, None, rule)
}

/// Numeric precedence with no associativity.
#[must_use]
pub fn prec(level: i32, rule: Rule) -> Rule {
    wrap(RuleType::Prec, Some(RuleValue::Integer(level)), rule)
}

/// Named precedence, ordered by the grammar's `precedences` lists.
#[must_use]
pub fn prec_named(level: &str, rule: Rule) -> Rule {
    wrap(RuleType::Prec, Some(RuleValue::String(level.to_string())), rule)
}

/// Left-associative precedence.
#[must_use]
pub fn prec_left(level: i32, rule: Rule) -> Rule {
    wrap(RuleType::PrecLeft, Some(RuleValue::Integer(level)), rule)
}

/// Right-associative precedence.
#[must_use]
pub fn prec_right(level: i32, rule: Rule) -> Rule {
    wrap(RuleType::PrecRight, Some(RuleValue::Integer(level)), rule)
}

/// Dynamic precedence, consulted when reductions tie.
#[must_use]
pub fn prec_dynamic(level: i32, rule: Rule) -> Rule {
    wrap(RuleType::PrecDynamic, Some(RuleValue::Integer(level)), rule)
}

/// Labels the child produced by `rule` with a field name.
#[must_use]
pub fn field(name: &str, rule: Rule) -> Rule {
    Rule {
        name: Some(name.to_string()),
        ..wrap(RuleType::Field, None, rule)
    }
}

/// Renames the node produced by `rule`; `named` mirrors `alias($.x, $.name)`
/// versus `alias($.x, "name")`.
#[must_use]
pub fn alias(rule: Rule, name: &str, named: bool) -> Rule {
    Rule {
        named: Some(named),
        ..wrap(RuleType::Alias, Some(RuleValue::String(name.to_string())), rule)
    }
}

/// Collapses `rule` into a single token.
#[must_use]
pub fn token(rule: Rule) -> Rule {
    wrap(RuleType::Token, None, rule)
}

/// A token that may not be preceded by extras.
#[must_use]
pub fn immediate_token(rule: Rule) -> Rule {
    wrap(RuleType::ImmediateToken, None, rule)
}

/// `rule` followed by any number of `, rule` (at least one).
#[must_use]
pub fn comma_sep1(rule: Rule) -> Rule {
    seq([rule.clone(), repeat(seq([string(","), rule]))])
}

/// Zero or more comma-separated occurrences of `rule`.
#[must_use]
pub fn comma_sep(rule: Rule) -> Rule {
    optional(comma_sep1(rule))
}

/// Incrementally assembles a [`Grammar`].
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    /// Starts a grammar with the given name and the default extras (`/\s/`).
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            grammar: Grammar {
                schema: None,
                name: name.to_string(),
                inherits: None,
                rules: IndexMap::new(),
                extras: vec![pattern(r"\s")],
                externals: Vec::new(),
                inline: Vec::new(),
                precedences: Vec::new(),
                conflicts: Vec::new(),
                reserved: IndexMap::new(),
                word: None,
                supertypes: Vec::new(),
            },
        }
    }

    /// Adds a rule. The first rule added is the start rule.
    #[must_use]
    pub fn rule(mut self, name: &str, rule: Rule) -> Self {
        self.grammar.rules.insert(name.to_string(), rule);
        self
    }

    /// Replaces the extras.
    #[must_use]
    pub fn extras(mut self, extras: impl IntoIterator<Item = Rule>) -> Self {
        self.grammar.extras = extras.into_iter().collect();
        self
    }

    /// Declares an expected conflict between the named rules.
    #[must_use]
    pub fn conflict(mut self, rules: &[&str]) -> Self {
        self.grammar
            .conflicts
            .push(rules.iter().map(ToString::to_string).collect());
        self
    }

    /// Sets the word token used for keyword extraction.
    #[must_use]
    pub fn word(mut self, name: &str) -> Self {
        self.grammar.word = Some(name.to_string());
        self
    }

    /// Adds a named precedence ordering, highest first.
    #[must_use]
    pub fn precedences(mut self, levels: &[&str]) -> Self {
        self.grammar
            .precedences
            .push(levels.iter().map(|l| string(l)).collect());
        self
    }

    /// Marks rules to be treated as hidden wherever they appear.
    #[must_use]
    pub fn inline(mut self, names: &[&str]) -> Self {
        self.grammar
            .inline
            .extend(names.iter().map(ToString::to_string));
        self
    }

    /// Finishes the grammar.
    #[must_use]
    pub fn build(self) -> Grammar {
        self.grammar
    }
}
