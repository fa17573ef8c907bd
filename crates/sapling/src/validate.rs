//! Validation routines for Tree-sitter grammars.
//!
//! This module performs structural checks over parsed [`Grammar`](crate::grammar::Grammar)
//! definitions, such as verifying symbol references, ensuring all rules are reachable,
//! detecting left recursion, and confirming precedence consistency. It runs at the
//! start of [`compile`](crate::compile::compile) and from the `sapling` CLI.

use crate::grammar::{Grammar, Rule, RuleType};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Represents a validation failure encountered when checking a grammar.
///
/// Validation errors indicate issues such as undefined symbols or an empty
/// rule set, which make the grammar impossible to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// The descriptive human-readable error message.
    pub message: String,
}

impl ValidationError {
    /// Creates a new [`ValidationError`] from a message string.
    fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// A non-fatal finding: the grammar compiles, but probably not as intended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// No path from the start rule, the extras or the word token reaches this rule.
    UnreachableRule(String),
    /// The rule wraps parts of itself in different numeric precedence levels.
    MixedPrecedence {
        /// The rule name.
        rule: String,
        /// The levels found, in rule order.
        levels: Vec<i32>,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidationWarning::UnreachableRule(rule) => write!(f, "unreachable rule '{rule}'"),
            ValidationWarning::MixedPrecedence { rule, levels } => {
                write!(f, "rule '{rule}' has multiple precedence levels: {levels:?}")
            }
        }
    }
}

/// Performs semantic validation of a parsed [`Grammar`](crate::grammar::Grammar).
///
/// This function runs several consistency passes over the grammar:
///
/// - Checks that all referenced symbols are defined.
/// - Warns about unreachable rules.
/// - Reports immediate left recursion (at debug level; LR tables handle it).
/// - Verifies precedence consistency.
///
/// Warnings are logged through [`tracing`] and returned to the caller.
///
/// # Errors
///
/// Returns a [`ValidationError`] if any structural rule violation is detected.
pub fn validate(grammar: &Grammar) -> Result<Vec<ValidationWarning>, ValidationError> {
    if grammar.rules.is_empty() {
        return Err(ValidationError::new(format!(
            "grammar '{}' has no rules",
            grammar.name
        )));
    }

    // Check for undefined symbol references
    check_undefined_symbols(grammar)?;

    let mut warnings = Vec::new();

    // Check for unreachable rules
    check_unreachable_rules(grammar, &mut warnings);

    // Left recursion is fine for an LR table, just document it
    check_left_recursion(grammar);

    // Validate precedence usage
    check_precedence(grammar, &mut warnings);

    for warning in &warnings {
        tracing::warn!(grammar = %grammar.name, "{warning}");
    }

    Ok(warnings)
}

fn check_undefined_symbols(grammar: &Grammar) -> Result<(), ValidationError> {
    let defined: HashSet<&str> = grammar.rules.keys().map(String::as_str).collect();

    for (rule_name, rule) in &grammar.rules {
        check_rule_symbols(rule, &defined, &format!("rule '{rule_name}'"))?;
    }

    for extra in &grammar.extras {
        check_rule_symbols(extra, &defined, "extras")?;
    }

    let named_lists = [
        ("word", grammar.word.iter().collect::<Vec<_>>()),
        ("inline", grammar.inline.iter().collect()),
        ("supertypes", grammar.supertypes.iter().collect()),
        ("conflicts", grammar.conflicts.iter().flatten().collect()),
    ];
    for (context, names) in named_lists {
        if let Some(name) = names.into_iter().find(|n| !defined.contains(n.as_str())) {
            return Err(ValidationError::new(format!(
                "undefined symbol '{name}' referenced in {context}"
            )));
        }
    }

    Ok(())
}

fn check_rule_symbols(
    rule: &Rule,
    defined: &HashSet<&str>,
    context: &str,
) -> Result<(), ValidationError> {
    if let Some(name) = rule.symbol_name() {
        if !defined.contains(name) {
            return Err(ValidationError::new(format!(
                "undefined symbol '{name}' referenced in {context}"
            )));
        }
    }
    for child in rule.children() {
        check_rule_symbols(child, defined, context)?;
    }
    Ok(())
}

fn check_unreachable_rules(grammar: &Grammar, warnings: &mut Vec<ValidationWarning>) {
    // The start rule plus everything the lexer may produce on its own
    let mut to_visit: Vec<String> = grammar.start_rule().map(str::to_string).into_iter().collect();
    to_visit.extend(grammar.word.iter().cloned());
    for extra in &grammar.extras {
        collect_referenced_symbols(extra, &mut to_visit);
    }

    let mut reachable = HashSet::new();
    while let Some(rule_name) = to_visit.pop() {
        if !reachable.insert(rule_name.clone()) {
            continue; // Already visited
        }

        if let Some(rule) = grammar.rules.get(&rule_name) {
            collect_referenced_symbols(rule, &mut to_visit);
        }
    }

    for rule_name in grammar.rules.keys() {
        if !reachable.contains(rule_name) && !grammar.inline.contains(rule_name) {
            warnings.push(ValidationWarning::UnreachableRule(rule_name.clone()));
        }
    }
}

fn collect_referenced_symbols(rule: &Rule, symbols: &mut Vec<String>) {
    if let Some(name) = rule.symbol_name() {
        symbols.push(name.to_string());
    }
    for child in rule.children() {
        collect_referenced_symbols(child, symbols);
    }
}

fn check_left_recursion(grammar: &Grammar) {
    for (rule_name, rule) in &grammar.rules {
        if has_immediate_left_recursion(rule, rule_name) {
            tracing::debug!(rule = %rule_name, "rule is left-recursive");
        }
    }
}

fn has_immediate_left_recursion(rule: &Rule, target: &str) -> bool {
    match rule.rule_type {
        RuleType::Symbol => rule.name.as_deref() == Some(target),

        RuleType::Seq => rule
            .members
            .first()
            .is_some_and(|first| has_immediate_left_recursion(first, target)),

        RuleType::Choice => rule
            .members
            .iter()
            .any(|member| has_immediate_left_recursion(member, target)),

        RuleType::Prec
        | RuleType::PrecLeft
        | RuleType::PrecRight
        | RuleType::PrecDynamic
        | RuleType::Field
        | RuleType::Alias => rule
            .content
            .as_deref()
            .is_some_and(|content| has_immediate_left_recursion(content, target)),

        _ => false,
    }
}

fn check_precedence(grammar: &Grammar, warnings: &mut Vec<ValidationWarning>) {
    let mut prec_levels: BTreeMap<&str, Vec<i32>> = BTreeMap::new();

    for (rule_name, rule) in &grammar.rules {
        let mut levels = Vec::new();
        collect_precedence_levels(rule, &mut levels);
        levels.dedup();
        if levels.len() > 1 {
            prec_levels.insert(rule_name, levels);
        }
    }

    for (rule, levels) in prec_levels {
        warnings.push(ValidationWarning::MixedPrecedence {
            rule: rule.to_string(),
            levels,
        });
    }
}

fn collect_precedence_levels(rule: &Rule, levels: &mut Vec<i32>) {
    if let Some(p) = rule.precedence() {
        if !levels.contains(&p) {
            levels.push(p);
        }
    }
    // Token internals carry lexical precedence, which is a separate scale
    if matches!(rule.rule_type, RuleType::Token | RuleType::ImmediateToken) {
        return;
    }
    for child in rule.children() {
        collect_precedence_levels(child, levels);
    }
}
