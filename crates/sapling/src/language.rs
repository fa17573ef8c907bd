//! The compiled form of a grammar.
//!
//! A [`Language`] is what [`compile`](crate::compile::compile) produces and what
//! a [`Parser`](crate::parser::Parser) runs: the symbol table, the flattened
//! productions, the LR(1) parse states and the lexical table consulted by the
//! context-aware lexer. It is immutable once built and cheap to clone.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;

/// Index of the first terminal in the symbol table (after `end` and `ERROR`).
pub(crate) const FIRST_TERMINAL: usize = 2;

/// A grammar symbol.
///
/// Symbol `0` is the end of input and symbol `1` is the error symbol. Terminals
/// come next, followed by the grammar's rules and compiler-generated
/// auxiliary rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub(crate) u16);

impl Symbol {
    /// The end-of-input terminal.
    pub const END: Symbol = Symbol(0);

    /// The symbol given to skipped or unrecognised input.
    pub const ERROR: Symbol = Symbol(1);

    pub(crate) fn new(index: usize) -> Self {
        Self(u16::try_from(index).unwrap_or(u16::MAX))
    }

    /// Position of this symbol in the language's symbol table.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// Index of a parse state.
pub type StateId = usize;

/// Index of a production.
pub type ProductionId = usize;

/// Index into the language's field-name table.
pub type FieldId = usize;

/// Index into the language's alias table.
pub type AliasId = usize;

/// What role a symbol plays in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// End of input.
    End,
    /// The error symbol.
    Error,
    /// A token produced by the lexer.
    Terminal,
    /// A rule defined in the grammar.
    NonTerminal,
    /// A rule generated by the compiler, such as a repetition helper.
    Auxiliary,
}

/// Per-symbol information shared by the parser and the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMetadata {
    /// Node kind reported for this symbol.
    pub name: String,
    /// What role the symbol plays.
    pub kind: SymbolKind,
    /// Whether nodes of this symbol appear in the visible tree.
    pub visible: bool,
    /// Whether nodes of this symbol are named (as opposed to literal tokens).
    pub named: bool,
    /// Whether this terminal may appear anywhere (comments and the like).
    pub extra: bool,
}

/// Associativity attached to a precedence wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    /// `prec.left`: prefer reducing.
    Left,
    /// `prec.right`: prefer shifting.
    Right,
}

/// A precedence level attached to a production step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Precedence {
    /// No precedence was declared.
    #[default]
    None,
    /// A numeric level; higher binds tighter.
    Integer(i32),
    /// A named level, ordered by the grammar's `precedences` lists.
    Name(String),
}

/// One element of a flattened production.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductionStep {
    /// The symbol expected at this position.
    pub symbol: Symbol,
    /// Precedence in effect for this step.
    pub precedence: Precedence,
    /// Associativity in effect for this step.
    pub associativity: Option<Associativity>,
    /// Field name assigned to the child at this position.
    pub field: Option<FieldId>,
    /// Alias applied to the child at this position.
    pub alias: Option<AliasId>,
}

/// A single alternative of a rule, with all choices expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// The rule this production belongs to.
    pub lhs: Symbol,
    /// The sequence of steps.
    pub steps: Vec<ProductionStep>,
    /// Dynamic precedence used to break reduce/reduce ties.
    pub dynamic_precedence: i32,
}

impl Production {
    /// Precedence of the production as a whole: that of its last step.
    #[must_use]
    pub fn precedence(&self) -> &Precedence {
        self.steps.last().map_or(&Precedence::None, |step| &step.precedence)
    }

    /// Associativity of the production as a whole: that of its last step.
    #[must_use]
    pub fn associativity(&self) -> Option<Associativity> {
        self.steps.last().and_then(|step| step.associativity)
    }
}

/// A parse table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume the lookahead and move to the given state.
    Shift(StateId),
    /// Replace the top of the stack with the production's left-hand side.
    Reduce(ProductionId),
    /// The input has been recognised.
    Accept,
}

/// A row of the parse table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParseState {
    /// Actions keyed by terminal.
    pub actions: BTreeMap<Symbol, Action>,
    /// Successor states keyed by nonterminal.
    pub gotos: BTreeMap<Symbol, StateId>,
    /// The set of terminals the lexer should look for in this state.
    pub lex_mode: usize,
}

/// The terminals the lexer may produce in a group of parse states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LexMode {
    /// Valid terminals, sorted.
    pub valid: Vec<Symbol>,
}

impl LexMode {
    /// Returns `true` if `symbol` is valid in this mode.
    #[must_use]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.valid.binary_search(&symbol).is_ok()
    }
}

/// How a terminal is recognised.
#[derive(Debug, Clone)]
pub struct TerminalPattern {
    /// Anchored regular expression matching the token.
    pub regex: Regex,
    /// The literal text, for terminals that came from a string.
    pub literal: Option<String>,
    /// Lexical precedence from a `prec` inside `token(...)`.
    pub precedence: i32,
}

/// Everything the lexer needs.
#[derive(Debug, Clone)]
pub struct LexicalTable {
    /// Patterns indexed by terminal (symbol index minus the first terminal).
    pub patterns: Vec<TerminalPattern>,
    /// Anonymous extras: skipped and folded into the next token's padding.
    pub whitespace: Vec<Regex>,
    /// Named extras: tokens that may appear between any two tokens.
    pub extras: Vec<Symbol>,
    /// The word token used for keyword extraction.
    pub word: Option<Symbol>,
    /// Keyword text to the terminals spelled that way.
    pub keywords: HashMap<String, Vec<Symbol>>,
    /// Lexing modes referenced by [`ParseState::lex_mode`].
    pub modes: Vec<LexMode>,
}

impl LexicalTable {
    /// The pattern for a terminal symbol.
    #[must_use]
    pub fn pattern(&self, symbol: Symbol) -> Option<&TerminalPattern> {
        symbol
            .index()
            .checked_sub(FIRST_TERMINAL)
            .and_then(|i| self.patterns.get(i))
    }

    /// Returns `true` if `symbol` is a keyword recognised through the word token.
    #[must_use]
    pub fn is_keyword(&self, symbol: Symbol) -> bool {
        self.word.is_some()
            && self
                .pattern(symbol)
                .and_then(|p| p.literal.as_ref())
                .and_then(|text| self.keywords.get(text))
                .is_some_and(|symbols| symbols.contains(&symbol))
    }
}

/// A named alias applied to a production step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alias {
    /// Node kind reported for aliased nodes.
    pub name: String,
    /// Whether aliased nodes are named.
    pub named: bool,
}

#[derive(Debug)]
pub(crate) struct LanguageData {
    pub name: String,
    pub symbols: Vec<SymbolMetadata>,
    pub productions: Vec<Production>,
    pub states: Vec<ParseState>,
    pub field_names: Vec<String>,
    pub aliases: Vec<Alias>,
    pub lexical: LexicalTable,
    pub start_symbol: Symbol,
}

/// A compiled grammar, ready to be handed to a parser.
///
/// `Language` is a shared handle; clones refer to the same tables.
#[derive(Debug, Clone)]
pub struct Language(pub(crate) Arc<LanguageData>);

/// Raised when a parser is given a language it cannot run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LanguageError {
    /// The language has no parse states.
    #[error("language '{0}' has an empty parse table")]
    EmptyTable(String),

    /// The start state cannot make progress on any input.
    #[error("language '{0}' has no actions in its start state")]
    DeadStart(String),
}

impl Language {
    /// The grammar's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Number of symbols, including built-ins and auxiliaries.
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.0.symbols.len()
    }

    /// Number of parse states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.0.states.len()
    }

    /// Number of flattened productions.
    #[must_use]
    pub fn production_count(&self) -> usize {
        self.0.productions.len()
    }

    /// Number of distinct field names.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.0.field_names.len()
    }

    /// Number of lexical modes.
    #[must_use]
    pub fn lex_mode_count(&self) -> usize {
        self.0.lexical.modes.len()
    }

    /// The node kind for a symbol.
    #[must_use]
    pub fn node_kind_for_id(&self, symbol: Symbol) -> Option<&str> {
        self.0.symbols.get(symbol.index()).map(|m| m.name.as_str())
    }

    /// Looks up a visible symbol by node kind.
    #[must_use]
    pub fn id_for_node_kind(&self, kind: &str, named: bool) -> Option<Symbol> {
        self.0
            .symbols
            .iter()
            .position(|m| m.visible && m.named == named && m.name == kind)
            .map(Symbol::new)
    }

    /// Returns `true` if nodes of this symbol are named.
    #[must_use]
    pub fn node_kind_is_named(&self, symbol: Symbol) -> bool {
        self.0.symbols.get(symbol.index()).is_some_and(|m| m.named)
    }

    /// Returns `true` if nodes of this symbol are visible.
    #[must_use]
    pub fn node_kind_is_visible(&self, symbol: Symbol) -> bool {
        self.0.symbols.get(symbol.index()).is_some_and(|m| m.visible)
    }

    /// Metadata for a symbol.
    #[must_use]
    pub fn symbol_metadata(&self, symbol: Symbol) -> Option<&SymbolMetadata> {
        self.0.symbols.get(symbol.index())
    }

    /// The field name with the given id.
    #[must_use]
    pub fn field_name_for_id(&self, id: FieldId) -> Option<&str> {
        self.0.field_names.get(id).map(String::as_str)
    }

    /// The id of a field name.
    #[must_use]
    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.0.field_names.iter().position(|f| f == name)
    }

    /// The grammar's start rule.
    #[must_use]
    pub fn start_symbol(&self) -> Symbol {
        self.0.start_symbol
    }

    /// The parse table entry for `symbol` in `state`.
    #[must_use]
    pub fn action(&self, state: StateId, symbol: Symbol) -> Option<Action> {
        self.0
            .states
            .get(state)
            .and_then(|s| s.actions.get(&symbol))
            .copied()
    }

    /// The successor of `state` after reducing to `symbol`.
    #[must_use]
    pub fn goto(&self, state: StateId, symbol: Symbol) -> Option<StateId> {
        self.0
            .states
            .get(state)
            .and_then(|s| s.gotos.get(&symbol))
            .copied()
    }

    /// A production by id.
    #[must_use]
    pub fn production(&self, id: ProductionId) -> Option<&Production> {
        self.0.productions.get(id)
    }

    /// The lexical table.
    #[must_use]
    pub fn lexical(&self) -> &LexicalTable {
        &self.0.lexical
    }

    pub(crate) fn lex_mode_of(&self, state: StateId) -> usize {
        self.0.states.get(state).map_or(0, |s| s.lex_mode)
    }

    pub(crate) fn alias(&self, id: AliasId) -> Option<&Alias> {
        self.0.aliases.get(id)
    }

    /// Checks that the tables can drive a parse.
    ///
    /// # Errors
    ///
    /// Returns a [`LanguageError`] when the table is empty or the start state
    /// has no actions at all.
    pub fn check(&self) -> Result<(), LanguageError> {
        let Some(start) = self.0.states.first() else {
            return Err(LanguageError::EmptyTable(self.0.name.clone()));
        };
        if start.actions.is_empty() && start.gotos.is_empty() {
            return Err(LanguageError::DeadStart(self.0.name.clone()));
        }
        Ok(())
    }

    /// Returns `true` if both handles refer to the same tables.
    #[must_use]
    pub fn ptr_eq(&self, other: &Language) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
