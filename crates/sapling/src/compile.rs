//! The grammar compiler.
//!
//! [`compile`] turns a [`Grammar`] into a [`Language`] in four passes:
//!
//! 1. `intern` separates tokens from syntactic rules and resolves names,
//! 2. `lexical` turns every token into an anchored regular expression,
//! 3. `flatten` expands syntactic rules into flat productions,
//! 4. `table` builds the LR(1) automaton and settles its conflicts.
//!
//! Finally each parse state is assigned a lexical mode, the set of terminals
//! the lexer should look for while the parser is in that state.

mod flatten;
mod intern;
mod lexical;
mod table;

use crate::grammar::{Grammar, GrammarError};
use crate::language::{
    LanguageData, LexMode, LexicalTable, Symbol, SymbolKind, SymbolMetadata, FIRST_TERMINAL,
};
use crate::Language;
use std::collections::HashMap;
use std::sync::Arc;

/// Compiles a grammar into parse and lexical tables.
///
/// The grammar is validated first; validation warnings are logged, not
/// returned.
///
/// # Errors
///
/// Returns a [`GrammarError`] if the grammar is invalid, uses a construct the
/// compiler does not support, contains a token pattern that is not a valid
/// regular expression, or has an LR conflict that neither precedence nor the
/// grammar's `conflicts` list resolves.
pub fn compile(grammar: &Grammar) -> Result<Language, GrammarError> {
    crate::validate::validate(grammar)?;

    let interned = intern::intern(grammar)?;
    let flat = flatten::flatten(&interned.syntax, interned.lexical.len())?;

    let terminal_end = FIRST_TERMINAL + interned.lexical.len();
    let symbol_count = terminal_end + flat.variables.len();
    if symbol_count >= usize::from(u16::MAX) {
        return Err(GrammarError::TooManySymbols(symbol_count));
    }

    let patterns = lexical::build_patterns(&interned.lexical)?;
    let whitespace = lexical::build_whitespace(&interned.whitespace)?;

    let extras: Vec<Symbol> = interned
        .extra_terminals
        .iter()
        .map(|&index| Symbol::new(FIRST_TERMINAL + index))
        .collect();

    let mut symbols = vec![
        SymbolMetadata {
            name: "end".to_string(),
            kind: SymbolKind::End,
            visible: false,
            named: true,
            extra: false,
        },
        SymbolMetadata {
            name: "ERROR".to_string(),
            kind: SymbolKind::Error,
            visible: true,
            named: true,
            extra: false,
        },
    ];
    symbols.extend(interned.lexical.iter().enumerate().map(|(index, var)| {
        SymbolMetadata {
            name: var.name.clone(),
            kind: SymbolKind::Terminal,
            visible: var.visible,
            named: var.named,
            extra: interned.extra_terminals.contains(&index),
        }
    }));
    symbols.extend(flat.variables.iter().map(|var| SymbolMetadata {
        name: var.name.clone(),
        kind: if var.parent.is_some() {
            SymbolKind::Auxiliary
        } else {
            SymbolKind::NonTerminal
        },
        visible: var.visible,
        named: true,
        extra: false,
    }));

    let names: Vec<String> = symbols.iter().map(|m| m.name.clone()).collect();
    let parents: HashMap<Symbol, Symbol> = flat
        .variables
        .iter()
        .enumerate()
        .filter_map(|(index, var)| {
            var.parent.map(|parent| {
                (
                    Symbol::new(terminal_end + index),
                    Symbol::new(terminal_end + parent),
                )
            })
        })
        .collect();
    let conflicts: Vec<Vec<Symbol>> = interned
        .conflicts
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|&index| Symbol::new(terminal_end + index))
                .collect()
        })
        .collect();
    let start_symbol = Symbol::new(terminal_end);

    let mut states = table::build(&table::TableInput {
        productions: &flat.productions,
        terminal_end,
        symbol_count,
        start: start_symbol,
        names: &names,
        parents: &parents,
        conflicts: &conflicts,
        precedence_orders: &interned.precedence_orders,
    })?;

    let mut modes: Vec<LexMode> = Vec::new();
    let mut mode_ids: HashMap<Vec<Symbol>, usize> = HashMap::new();
    for state in &mut states {
        let valid: Vec<Symbol> = state
            .actions
            .keys()
            .copied()
            .filter(|&symbol| symbol != Symbol::END)
            .collect();
        state.lex_mode = *mode_ids.entry(valid.clone()).or_insert_with(|| {
            modes.push(LexMode { valid });
            modes.len() - 1
        });
    }

    let word = interned.word.map(|index| Symbol::new(FIRST_TERMINAL + index));
    let mut keywords: HashMap<String, Vec<Symbol>> = HashMap::new();
    if let Some(word_pattern) = interned.word.and_then(|index| patterns.get(index)) {
        for (index, pattern) in patterns.iter().enumerate() {
            let Some(text) = pattern.literal.as_deref() else {
                continue;
            };
            let symbol = Symbol::new(FIRST_TERMINAL + index);
            let whole = word_pattern
                .regex
                .find(text)
                .is_some_and(|m| m.end() == text.len());
            if whole && Some(symbol) != word {
                keywords.entry(text.to_string()).or_default().push(symbol);
            }
        }
    }

    tracing::debug!(
        grammar = %grammar.name,
        terminals = interned.lexical.len(),
        nonterminals = flat.variables.len(),
        productions = flat.productions.len(),
        states = states.len(),
        lex_modes = modes.len(),
        keywords = keywords.len(),
        "compiled grammar"
    );

    Ok(Language(Arc::new(LanguageData {
        name: grammar.name.clone(),
        symbols,
        productions: flat.productions,
        states,
        field_names: flat.field_names,
        aliases: flat.aliases,
        lexical: LexicalTable {
            patterns,
            whitespace,
            extras,
            word,
            keywords,
            modes,
        },
        start_symbol,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{
        choice, pattern, prec_left, prec_right, repeat, seq, string, sym, GrammarBuilder,
    };

    fn arithmetic() -> GrammarBuilder {
        GrammarBuilder::new("arith")
            .rule("program", sym("expr"))
            .rule(
                "expr",
                choice([
                    prec_left(1, seq([sym("expr"), string("+"), sym("expr")])),
                    prec_left(2, seq([sym("expr"), string("*"), sym("expr")])),
                    sym("number"),
                ]),
            )
            .rule("number", pattern(r"\d+"))
    }

    #[test]
    fn test_precedence_resolves_arithmetic() {
        let language = compile(&arithmetic().build()).unwrap();
        assert_eq!(language.name(), "arith");
        assert!(language.state_count() > 0);
        assert!(language.check().is_ok());
        assert_eq!(
            Some(language.start_symbol()),
            language.id_for_node_kind("program", true)
        );
    }

    #[test]
    fn test_undeclared_conflict_is_reported() {
        let grammar = GrammarBuilder::new("ambiguous")
            .rule("program", sym("expr"))
            .rule(
                "expr",
                choice([seq([sym("expr"), string("+"), sym("expr")]), sym("number")]),
            )
            .rule("number", pattern(r"\d+"))
            .build();
        let err = compile(&grammar).unwrap_err();
        match err {
            GrammarError::Conflict { symbols, lookahead } => {
                assert_eq!(symbols, vec!["expr".to_string()]);
                assert_eq!(lookahead, "+");
            }
            other => panic!("expected a conflict, got {other}"),
        }
    }

    #[test]
    fn test_declared_conflict_is_accepted() {
        let grammar = GrammarBuilder::new("declared")
            .rule("program", sym("expr"))
            .rule(
                "expr",
                choice([seq([sym("expr"), string("+"), sym("expr")]), sym("number")]),
            )
            .rule("number", pattern(r"\d+"))
            .conflict(&["expr"])
            .build();
        assert!(compile(&grammar).is_ok());
    }

    #[test]
    fn test_associativity_resolves_conflicts() {
        let grammar = GrammarBuilder::new("assign")
            .rule("program", sym("expr"))
            .rule(
                "expr",
                choice([
                    prec_right(1, seq([sym("expr"), string("="), sym("expr")])),
                    sym("name"),
                ]),
            )
            .rule("name", pattern("[a-z]+"))
            .build();
        assert!(compile(&grammar).is_ok());
    }

    #[test]
    fn test_keywords_are_extracted() {
        let grammar = GrammarBuilder::new("kw")
            .rule("program", repeat(sym("statement")))
            .rule(
                "statement",
                choice([seq([string("let"), sym("identifier")]), string("+")]),
            )
            .rule("identifier", pattern("[a-z]+"))
            .word("identifier")
            .build();
        let language = compile(&grammar).unwrap();
        let lexical = language.lexical();
        let keyword = language.id_for_node_kind("let", false).unwrap();
        assert_eq!(lexical.keywords.get("let"), Some(&vec![keyword]));
        assert!(!lexical.keywords.contains_key("+"));
        assert!(lexical.is_keyword(keyword));
    }

    #[test]
    fn test_symbol_metadata() {
        let grammar = GrammarBuilder::new("meta")
            .rule("program", repeat(sym("_item")))
            .rule("_item", choice([sym("comment"), string("x")]))
            .rule("comment", seq([string("#"), pattern("[a-z]*")]))
            .build();
        let language = compile(&grammar).unwrap();
        let error = language.symbol_metadata(Symbol::ERROR).unwrap();
        assert!(error.visible && error.named);
        assert!(!language.node_kind_is_visible(Symbol::END));

        let kinds: Vec<_> = (0..language.symbol_count())
            .filter_map(|index| language.symbol_metadata(Symbol::new(index)))
            .map(|m| (m.name.as_str(), m.kind, m.visible))
            .collect();
        assert!(kinds.contains(&("program_repeat1", SymbolKind::Auxiliary, false)));
        assert!(kinds.contains(&("_item", SymbolKind::NonTerminal, false)));
        assert!(kinds.contains(&("comment", SymbolKind::NonTerminal, true)));
        assert!(kinds.contains(&("x", SymbolKind::Terminal, true)));
    }

    #[test]
    fn test_lex_modes_only_hold_valid_terminals() {
        let language = compile(&arithmetic().build()).unwrap();
        let plus = language.id_for_node_kind("+", false).unwrap();
        let number = language.id_for_node_kind("number", true).unwrap();
        // The start state expects an operand, never an operator
        let mode = &language.lexical().modes[language.lex_mode_of(0)];
        assert!(mode.contains(number));
        assert!(!mode.contains(plus));
        assert!(language.lex_mode_count() <= language.state_count());
    }

    #[test]
    fn test_validation_runs_first() {
        let grammar = GrammarBuilder::new("bad")
            .rule("program", sym("missing"))
            .build();
        assert!(matches!(compile(&grammar), Err(GrammarError::Validation(_))));
    }
}
