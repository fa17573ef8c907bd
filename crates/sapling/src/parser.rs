//! The LR driver.
//!
//! [`Parser::parse`] runs a [`Language`]'s parse table over a document,
//! asking the context-aware lexer for one token at a time. Given the previous
//! tree for the document (after [`Tree::edit`]), it pushes unchanged subtrees
//! of that tree whole instead of lexing and reducing them again.
//!
//! Parsing never fails. Input the table cannot accept is recovered from by
//! inserting zero-width MISSING tokens, or by wrapping input in `ERROR` nodes:
//!
//! 1. insert one missing token if the lookahead can then be shifted,
//! 2. skip the lookahead if the token after it can be parsed,
//! 3. pop the stack into an `ERROR` node until the lookahead can be parsed,
//! 4. skip the lookahead.
//!
//! At the end of input the parser searches for a short sequence of missing
//! tokens that completes the document, and otherwise wraps whatever it has
//! in an `ERROR` node.
//!
//! Recovery depends on exactly which tokens sit on the stack, so an old
//! subtree is only pushed whole while no recovery has happened in the current
//! parse and the token after it can follow it. Everything after the first
//! recovery is lexed again.

use crate::language::{Action, Language, LanguageError, StateId, Symbol};
use crate::lexer::Lexer;
use crate::tree::{Child, Length, Subtree, Tree};
use std::collections::{HashSet, VecDeque};

/// Default bound on the missing tokens inserted to complete a document.
const DEFAULT_MAX_MISSING: usize = 16;

/// Recoveries at a single position before the parser falls back to skipping.
const MAX_RECOVERIES_PER_POSITION: usize = 8;

/// Reductions a simulated parse may perform before it is abandoned.
const MAX_SIMULATED_REDUCTIONS: usize = 10_000;

/// Stacks explored while searching for missing tokens at the end of input.
const MAX_SEARCHED_STACKS: usize = 10_000;

/// Parses documents with a [`Language`].
///
/// ```
/// use sapling::grammar::dsl::{pattern, repeat, seq, string, sym, GrammarBuilder};
/// use sapling::{compile, Parser};
///
/// let grammar = GrammarBuilder::new("statements")
///     .rule("program", repeat(sym("statement")))
///     .rule("statement", seq([sym("name"), string(";")]))
///     .rule("name", pattern("[a-z]+"))
///     .build();
/// let language = compile(&grammar).unwrap();
///
/// let mut parser = Parser::new();
/// parser.set_language(&language).unwrap();
/// let tree = parser.parse("a; b;", None).unwrap();
/// assert_eq!(
///     tree.root_node().to_sexp(),
///     "(program (statement (name)) (statement (name)))"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Parser {
    language: Option<Language>,
    max_missing: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Creates a parser with no language.
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: None,
            max_missing: DEFAULT_MAX_MISSING,
        }
    }

    /// Binds the parser to a language.
    ///
    /// # Errors
    ///
    /// Returns a [`LanguageError`] if the language's tables cannot drive a
    /// parse. The previous language, if any, is kept.
    pub fn set_language(&mut self, language: &Language) -> Result<(), LanguageError> {
        language.check()?;
        self.language = Some(language.clone());
        Ok(())
    }

    /// The language the parser is bound to.
    #[must_use]
    pub fn language(&self) -> Option<&Language> {
        self.language.as_ref()
    }

    /// The most missing tokens inserted to complete a truncated document.
    #[must_use]
    pub fn max_missing(&self) -> usize {
        self.max_missing
    }

    /// Sets the most missing tokens inserted to complete a truncated document.
    pub fn set_max_missing(&mut self, max_missing: usize) {
        self.max_missing = max_missing;
    }

    /// Parses `text`.
    ///
    /// If `old_tree` is the tree of a previous version of the document,
    /// already adjusted with [`Tree::edit`], subtrees it shares with the new
    /// text are reused. A tree parsed with a different language is ignored.
    ///
    /// Returns `None` only when no language has been set.
    pub fn parse(&mut self, text: &str, old_tree: Option<&Tree>) -> Option<Tree> {
        let language = self.language.as_ref()?;
        let old_root = old_tree
            .filter(|tree| tree.language().ptr_eq(language))
            .map(Tree::root);
        Some(Run::new(language, text, old_root, self.max_missing).parse())
    }
}

#[derive(Debug)]
struct Entry {
    /// The state after this entry was pushed.
    state: StateId,
    subtree: Subtree,
    /// Absolute position just past the subtree.
    end: Length,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Shifted,
    Accepted,
}

/// The state of a single parse.
struct Run<'a> {
    language: &'a Language,
    text: &'a str,
    lexer: Lexer<'a>,
    old_root: Option<&'a Subtree>,
    stack: Vec<Entry>,
    /// Lookaheads to process before reading more input, last first.
    lookaheads: Vec<Subtree>,
    /// Pieces of a reused subtree that could not be pushed whole, last first.
    pending: Vec<Subtree>,
    max_missing: usize,
    /// Position of the last recovery and how many happened there.
    recoveries: (usize, usize),
    /// Set by the first recovery; old subtrees are no longer reused after it.
    recovered: bool,
    lexed: usize,
    reused: usize,
}

impl<'a> Run<'a> {
    fn new(
        language: &'a Language,
        text: &'a str,
        old_root: Option<&'a Subtree>,
        max_missing: usize,
    ) -> Self {
        Self {
            language,
            text,
            lexer: Lexer::new(language, text),
            old_root,
            stack: Vec::new(),
            lookaheads: Vec::new(),
            pending: Vec::new(),
            max_missing,
            recoveries: (usize::MAX, 0),
            recovered: false,
            lexed: 0,
            reused: 0,
        }
    }

    fn state(&self) -> StateId {
        self.stack.last().map_or(0, |entry| entry.state)
    }

    fn position(&self) -> Length {
        self.stack.last().map_or(Length::ZERO, |entry| entry.end)
    }

    fn parse(mut self) -> Tree {
        loop {
            let state = self.state();
            let lookahead = match self.lookaheads.pop() {
                Some(lookahead) => lookahead,
                None => self.next_lookahead(state),
            };
            let action = if lookahead.symbol() == Symbol::ERROR {
                None
            } else {
                self.language.action(state, lookahead.first_leaf())
            };

            match action {
                Some(Action::Shift(next)) if lookahead.is_leaf() => {
                    tracing::trace!(state, next, symbol = ?lookahead.symbol(), "shift");
                    self.push(next, lookahead);
                }
                Some(Action::Shift(_)) => match self.language.goto(state, lookahead.symbol()) {
                    Some(next) => {
                        tracing::trace!(
                            state,
                            next,
                            symbol = ?lookahead.symbol(),
                            bytes = lookahead.total_size().bytes,
                            "reuse"
                        );
                        self.reused += 1;
                        self.push(next, lookahead);
                    }
                    None => self.break_down(&lookahead),
                },
                Some(Action::Reduce(production)) => {
                    if let Some(tree) = self.reduce(production, lookahead) {
                        return tree;
                    }
                }
                Some(Action::Accept) if lookahead.is_leaf() => return self.accept(lookahead),
                Some(Action::Accept) => self.break_down(&lookahead),
                None if !lookahead.is_leaf() => self.break_down(&lookahead),
                None if self.is_extra(&lookahead) => self.push_extra(lookahead),
                None => {
                    if let Some(tree) = self.recover(lookahead) {
                        return tree;
                    }
                }
            }
        }
    }

    fn is_extra(&self, subtree: &Subtree) -> bool {
        subtree.is_extra()
            || self
                .language
                .symbol_metadata(subtree.symbol())
                .is_some_and(|metadata| metadata.extra)
    }

    fn push(&mut self, state: StateId, subtree: Subtree) {
        let end = self.position() + subtree.total_size();
        self.stack.push(Entry {
            state,
            subtree,
            end,
        });
    }

    /// Pushes an extra without changing state. Adjacent `ERROR` nodes merge.
    fn push_extra(&mut self, subtree: Subtree) {
        let mut subtree = subtree.into_extra();
        if subtree.symbol() == Symbol::ERROR && self.top_is_error() {
            if let Some(top) = self.stack.pop() {
                let mut children = error_children(&top.subtree);
                children.extend(error_children(&subtree));
                subtree = Subtree::error(children);
            }
        }
        self.push(self.state(), subtree);
    }

    fn top_is_error(&self) -> bool {
        self.stack.last().is_some_and(|entry| {
            entry.subtree.is_extra()
                && entry.subtree.symbol() == Symbol::ERROR
                && entry.subtree.unexpected_char().is_none()
        })
    }

    /// Reduces by a production and queues the lookahead again. A table with
    /// no successor for the reduced symbol sends the popped entries into an
    /// `ERROR` node and recovers on the lookahead instead.
    fn reduce(&mut self, production_id: usize, lookahead: Subtree) -> Option<Tree> {
        let Some(production) = self.language.production(production_id) else {
            tracing::warn!(production = production_id, "reduce by unknown production");
            return self.recover(lookahead);
        };
        let lookahead_end = self.position() + lookahead.total_size();

        let mut trailing = Vec::new();
        while self.stack.last().is_some_and(|entry| entry.subtree.is_extra()) {
            trailing.extend(self.stack.pop());
        }

        let mut children = Vec::with_capacity(production.steps.len());
        let mut remaining = production.steps.len();
        while remaining > 0 {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            if entry.subtree.is_extra() {
                children.push(Child::plain(entry.subtree));
                continue;
            }
            remaining -= 1;
            let step = &production.steps[remaining];
            children.push(Child {
                field: step.field,
                alias: step.alias,
                subtree: entry.subtree,
            });
        }
        children.reverse();

        let base = self.state();
        let Some(next) = self.language.goto(base, production.lhs) else {
            tracing::warn!(state = base, symbol = ?production.lhs, "missing goto after reduce");
            let popped: Vec<Subtree> = children
                .iter()
                .map(|child| &child.subtree)
                .chain(trailing.iter().rev().map(|entry| &entry.subtree))
                .flat_map(error_children)
                .collect();
            if !popped.is_empty() {
                self.push_extra(Subtree::error(popped));
            }
            return self.recover(lookahead);
        };
        let node = Subtree::node(production.lhs, children, Some(production_id));
        let node_end = self.position() + node.total_size();
        let node = node.with_lookahead_bytes(lookahead_end.bytes.saturating_sub(node_end.bytes));
        tracing::trace!(
            state = base,
            next,
            symbol = ?production.lhs,
            production = production_id,
            "reduce"
        );

        self.push(next, node);
        for entry in trailing.into_iter().rev() {
            self.stack.push(Entry {
                state: next,
                ..entry
            });
        }
        self.lookaheads.push(lookahead);
        None
    }

    /// Builds the tree once the table accepts: the start rule's node becomes
    /// the root, gathering the extras around it and the end of input.
    fn accept(&mut self, end: Subtree) -> Tree {
        let start = self.language.start_symbol();
        let mut children = Vec::new();
        let mut production = None;
        for entry in std::mem::take(&mut self.stack) {
            if production.is_none() && !entry.subtree.is_extra() && entry.subtree.symbol() == start
            {
                production = entry.subtree.production();
                children.extend(entry.subtree.children().iter().cloned());
            } else {
                children.push(Child::plain(entry.subtree));
            }
        }
        children.push(Child::plain(end));
        self.finish(Subtree::node(start, children, production))
    }

    /// Gives up on the input: everything parsed so far becomes one `ERROR` node.
    fn abandon(&mut self, end: Subtree) -> Tree {
        let subtrees: Vec<Subtree> = self.stack.drain(..).map(|entry| entry.subtree).collect();
        let mut children = Vec::new();
        if !subtrees.is_empty() {
            children.push(Child::plain(Subtree::error(subtrees)));
        }
        children.push(Child::plain(end));
        tracing::debug!("could not complete the document; wrapped it in an error");
        self.finish(Subtree::node(self.language.start_symbol(), children, None))
    }

    fn finish(&self, root: Subtree) -> Tree {
        tracing::debug!(
            language = self.language.name(),
            bytes = self.text.len(),
            lexed = self.lexed,
            reused = self.reused,
            has_error = root.has_error(),
            "parsed"
        );
        Tree::new(root, self.language.clone())
    }

    fn break_down(&mut self, subtree: &Subtree) {
        self.pending
            .extend(subtree.children().iter().rev().map(|child| child.subtree.clone()));
    }

    /// The next lookahead: a reusable piece of the old tree if there is one,
    /// otherwise a freshly lexed token.
    fn next_lookahead(&mut self, state: StateId) -> Subtree {
        if self.recovered {
            return self.lex(self.position(), state);
        }
        let mode = self.language.lex_mode_of(state);
        let mut candidate = self.pending.pop().or_else(|| self.find_reusable(mode));
        while let Some(subtree) = candidate {
            if subtree.total_size().bytes > 0 || subtree.is_leaf() {
                if self.can_reuse(&subtree, mode) && self.can_follow(&subtree, state) {
                    return subtree;
                }
                if subtree.is_leaf() {
                    self.pending.clear();
                    break;
                }
                self.break_down(&subtree);
            }
            candidate = self.pending.pop();
        }
        self.lex(self.position(), state)
    }

    fn lex(&mut self, position: Length, state: StateId) -> Subtree {
        let mode = self.language.lex_mode_of(state);
        let token = self.lexer.lex(position, mode);
        self.lexed += 1;
        match token.unexpected {
            Some(character) => Subtree::unexpected(character, token.padding, token.size, mode),
            None => Subtree::leaf(token.symbol, token.padding, token.size, 1, mode),
        }
    }

    fn can_reuse(&self, subtree: &Subtree, mode: usize) -> bool {
        let end = self.position().bytes + subtree.total_size().bytes;
        let symbol = subtree.symbol();
        !subtree.has_changes()
            && !subtree.has_error()
            && subtree.size().bytes > 0
            && symbol != Symbol::END
            && symbol != self.language.start_symbol()
            && end <= self.text.len()
            && (subtree.lex_mode() == mode || (subtree.is_leaf() && subtree.is_extra()))
    }

    /// Whether the first token after `subtree` can be parsed once the subtree
    /// is pushed. A fresh parse reaching that token in this context would
    /// otherwise stop before reducing the subtree's own tokens.
    fn can_follow(&mut self, subtree: &Subtree, state: StateId) -> bool {
        if subtree.is_leaf() {
            return true;
        }
        let Some(next) = self.language.goto(state, subtree.symbol()) else {
            return true;
        };
        let mut states = self.state_stack();
        states.push(next);
        let mut position = self.position() + subtree.total_size();
        loop {
            let token = self.lex(position, next);
            if token.symbol() == Symbol::ERROR {
                return false;
            }
            if token.symbol() == Symbol::END
                || token.total_size().bytes == 0
                || !self.is_extra(&token)
            {
                return self.simulate(&mut states, token.symbol()).is_some();
            }
            position = position + token.total_size();
        }
    }

    /// The largest reusable subtree of the old tree starting at the current
    /// position.
    fn find_reusable(&self, mode: usize) -> Option<Subtree> {
        let position = self.position().bytes;
        let mut subtree = self.old_root?;
        let mut start = 0;
        'descend: loop {
            let mut child_start = start;
            for child in subtree.children() {
                let size = child.subtree.total_size().bytes;
                let child_end = child_start + size;
                if child_start > position {
                    return None;
                }
                if size > 0 && child_start == position && self.can_reuse(&child.subtree, mode) {
                    return Some(child.subtree.clone());
                }
                if size > 0 && position < child_end {
                    subtree = &child.subtree;
                    start = child_start;
                    continue 'descend;
                }
                child_start = child_end;
            }
            return None;
        }
    }

    /// States of the non-extra stack entries, above the start state.
    fn state_stack(&self) -> Vec<StateId> {
        std::iter::once(0)
            .chain(
                self.stack
                    .iter()
                    .filter(|entry| !entry.subtree.is_extra())
                    .map(|entry| entry.state),
            )
            .collect()
    }

    /// Terminals with an action in `state`, other than the end of input.
    fn valid_terminals(&self, state: StateId) -> Vec<Symbol> {
        let lexical = self.language.lexical();
        lexical
            .modes
            .get(self.language.lex_mode_of(state))
            .map(|mode| {
                mode.valid
                    .iter()
                    .copied()
                    .filter(|&symbol| !lexical.extras.contains(&symbol))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Runs the table on a copy of the state stack until `symbol` is shifted
    /// or accepted.
    fn simulate(&self, states: &mut Vec<StateId>, symbol: Symbol) -> Option<Outcome> {
        for _ in 0..MAX_SIMULATED_REDUCTIONS {
            let state = *states.last()?;
            match self.language.action(state, symbol)? {
                Action::Shift(next) => {
                    states.push(next);
                    return Some(Outcome::Shifted);
                }
                Action::Accept => return Some(Outcome::Accepted),
                Action::Reduce(id) => {
                    let production = self.language.production(id)?;
                    let depth = production.steps.len();
                    if depth >= states.len() {
                        return None;
                    }
                    states.truncate(states.len() - depth);
                    let base = *states.last()?;
                    states.push(self.language.goto(base, production.lhs)?);
                }
            }
        }
        None
    }

    /// Handles a leaf the current state has no action for. Returns the
    /// finished tree if recovery ended the parse.
    fn recover(&mut self, lookahead: Subtree) -> Option<Tree> {
        if !self.recovered {
            self.recovered = true;
            self.pending.clear();
        }
        let position = self.position().bytes;
        if self.recoveries.0 == position {
            self.recoveries.1 += 1;
        } else {
            self.recoveries = (position, 1);
        }
        let exhausted = self.recoveries.1 > MAX_RECOVERIES_PER_POSITION;
        let state = self.state();
        let mode = self.language.lex_mode_of(state);

        if lookahead.symbol() == Symbol::END {
            if !exhausted {
                if let Some(symbols) = self.complete_with_missing() {
                    tracing::trace!(state, missing = ?symbols, "completing document");
                    self.lookaheads.push(lookahead);
                    self.lookaheads.extend(
                        symbols
                            .into_iter()
                            .rev()
                            .map(|symbol| Subtree::missing(symbol, mode)),
                    );
                    return None;
                }
            }
            return Some(self.abandon(lookahead));
        }

        if !exhausted && lookahead.symbol() != Symbol::ERROR {
            if let Some(symbol) = self.missing_before(lookahead.symbol()) {
                tracing::trace!(state, missing = ?symbol, "inserting missing token");
                self.lookaheads.push(lookahead);
                self.lookaheads.push(Subtree::missing(symbol, mode));
                return None;
            }
        }

        if !exhausted
            && !self.next_token_fits(&lookahead, state)
            && lookahead.symbol() != Symbol::ERROR
            && self.pop_until_valid(lookahead.symbol())
        {
            self.lookaheads.push(lookahead);
            return None;
        }

        tracing::trace!(state, symbol = ?lookahead.symbol(), "skipping token");
        self.push_extra(Subtree::error(vec![lookahead]));
        None
    }

    /// A terminal that, inserted before `symbol`, lets `symbol` be parsed.
    fn missing_before(&self, symbol: Symbol) -> Option<Symbol> {
        let states = self.state_stack();
        self.valid_terminals(self.state()).into_iter().find(|&candidate| {
            let mut states = states.clone();
            self.simulate(&mut states, candidate) == Some(Outcome::Shifted)
                && self.simulate(&mut states, symbol).is_some()
        })
    }

    /// Whether the token after `lookahead` could be parsed if `lookahead`
    /// were skipped.
    fn next_token_fits(&mut self, lookahead: &Subtree, state: StateId) -> bool {
        let after = self.position() + lookahead.total_size();
        let next = self.lex(after, state);
        if next.symbol() == Symbol::ERROR {
            return false;
        }
        if self.is_extra(&next) {
            return true;
        }
        let mut states = self.state_stack();
        self.simulate(&mut states, next.symbol()).is_some()
    }

    /// Pops the fewest stack entries that expose a state able to parse
    /// `symbol`, and pushes them back as one `ERROR` node.
    fn pop_until_valid(&mut self, symbol: Symbol) -> bool {
        let states = self.state_stack();
        let Some(depth) = (1..states.len()).find(|&depth| {
            let mut states = states[..states.len() - depth].to_vec();
            self.simulate(&mut states, symbol).is_some()
        }) else {
            return false;
        };

        let mut popped = Vec::new();
        let mut remaining = depth;
        while remaining > 0 {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            if !entry.subtree.is_extra() {
                remaining -= 1;
            }
            popped.push(entry.subtree);
        }
        popped.reverse();
        tracing::trace!(depth, revealed = self.state(), "popped stack into error");

        let children = popped.iter().flat_map(error_children).collect();
        self.push_extra(Subtree::error(children));
        true
    }

    /// The shortest sequence of terminals, up to the configured bound, after
    /// which the end of input is accepted.
    fn complete_with_missing(&self) -> Option<Vec<Symbol>> {
        let start = self.state_stack();
        let mut queue = VecDeque::from([(start.clone(), Vec::new())]);
        let mut visited = HashSet::from([start]);

        while let Some((states, inserted)) = queue.pop_front() {
            let mut at_end = states.clone();
            if self.simulate(&mut at_end, Symbol::END) == Some(Outcome::Accepted) {
                return Some(inserted);
            }
            if inserted.len() >= self.max_missing {
                continue;
            }
            let top = states.last().copied().unwrap_or(0);
            for candidate in self.valid_terminals(top) {
                let mut next = states.clone();
                if self.simulate(&mut next, candidate) == Some(Outcome::Shifted)
                    && visited.len() < MAX_SEARCHED_STACKS
                    && visited.insert(next.clone())
                {
                    let mut inserted = inserted.clone();
                    inserted.push(candidate);
                    queue.push_back((next, inserted));
                }
            }
        }
        None
    }
}

/// The children an `ERROR` node contributes when merged into another, or
/// the subtree itself.
fn error_children(subtree: &Subtree) -> Vec<Subtree> {
    if subtree.symbol() == Symbol::ERROR && subtree.is_extra() && subtree.unexpected_char().is_none()
    {
        subtree.children().iter().map(|child| child.subtree.clone()).collect()
    } else {
        vec![subtree.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::grammar::dsl::{
        choice, field, pattern, prec_left, prec_right, repeat, seq, string, sym, token,
        GrammarBuilder,
    };
    use crate::tree::{InputEdit, Node};
    use std::sync::Arc;

    fn parser_for(builder: GrammarBuilder) -> Parser {
        let language = compile(&builder.build()).unwrap();
        let mut parser = Parser::new();
        parser.set_language(&language).unwrap();
        parser
    }

    fn statement(root: Node<'_>, index: usize) -> Node<'_> {
        root.named_child(index).unwrap()
    }

    fn sexp(parser: &mut Parser, text: &str) -> String {
        parser.parse(text, None).unwrap().root_node().to_sexp()
    }

    fn binary(level: i32, left_assoc: bool, operator: &str) -> crate::Rule {
        let body = seq([
            field("left", sym("_expr")),
            string(operator),
            field("right", sym("_expr")),
        ]);
        if left_assoc {
            prec_left(level, body)
        } else {
            prec_right(level, body)
        }
    }

    fn arithmetic() -> Parser {
        parser_for(
            GrammarBuilder::new("arith")
                .rule("program", sym("_expr"))
                .rule(
                    "_expr",
                    choice([sym("sum"), sym("product"), sym("assignment"), sym("number")]),
                )
                .rule("sum", binary(1, true, "+"))
                .rule("product", binary(2, true, "*"))
                .rule("assignment", binary(0, false, "="))
                .rule("number", pattern(r"\d+")),
        )
    }

    fn statements() -> Parser {
        parser_for(
            GrammarBuilder::new("statements")
                .rule("program", repeat(sym("statement")))
                .rule(
                    "statement",
                    seq([
                        field("name", sym("name")),
                        string("="),
                        field("value", sym("name")),
                        string(";"),
                    ]),
                )
                .rule("name", pattern("[a-z]+"))
                .rule("comment", token(seq([string("#"), pattern(".*")])))
                .extras([pattern(r"\s"), sym("comment")]),
        )
    }

    #[test]
    fn test_parse_without_language() {
        assert!(Parser::new().parse("1", None).is_none());
    }

    #[test]
    fn test_precedence_shapes_the_tree() {
        let mut parser = arithmetic();
        assert_eq!(
            sexp(&mut parser, "1 + 2 * 3"),
            "(program (sum left: (number) right: (product left: (number) right: (number))))"
        );
        assert_eq!(
            sexp(&mut parser, "1 * 2 + 3"),
            "(program (sum left: (product left: (number) right: (number)) right: (number)))"
        );
    }

    #[test]
    fn test_associativity_shapes_the_tree() {
        let mut parser = arithmetic();
        assert_eq!(
            sexp(&mut parser, "1 + 2 + 3"),
            "(program (sum left: (sum left: (number) right: (number)) right: (number)))"
        );
        assert_eq!(
            sexp(&mut parser, "1 = 2 = 3"),
            "(program (assignment left: (number) right: (assignment left: (number) right: (number))))"
        );
    }

    #[test]
    fn test_declared_conflicts_shift() {
        let mut parser = parser_for(
            GrammarBuilder::new("declared")
                .rule("program", sym("_expr"))
                .rule("_expr", choice([sym("sum"), sym("number")]))
                .rule("sum", seq([sym("_expr"), string("+"), sym("_expr")]))
                .rule("number", pattern(r"\d+"))
                .conflict(&["sum"]),
        );
        assert_eq!(
            sexp(&mut parser, "1 + 2 + 3"),
            "(program (sum (number) (sum (number) (number))))"
        );
    }

    #[test]
    fn test_positions() {
        let mut parser = statements();
        let text = "a = b;\n  c = d;\n";
        let tree = parser.parse(text, None).unwrap();
        let root = tree.root_node();
        assert_eq!(root.start_byte(), 0);
        assert_eq!(root.end_byte(), text.len());

        let second = root.named_child(1).unwrap();
        assert_eq!(second.kind(), "statement");
        assert_eq!(second.start_position(), crate::Point::new(1, 2));
        assert_eq!(second.end_position(), crate::Point::new(1, 8));
        assert_eq!(second.utf8_text(text.as_bytes()).unwrap(), "c = d;");

        let value = second.child_by_field_name("value").unwrap();
        assert_eq!(value.utf8_text(text.as_bytes()).unwrap(), "d");
        assert_eq!(second.field_name_for_child(0), Some("name"));
        assert_eq!(second.child_count(), 4);
        assert_eq!(second.named_child_count(), 2);

        let found = root.descendant_for_byte_range(13, 13).unwrap();
        assert_eq!(found.kind(), "name");
        assert_eq!(found.start_byte(), 13);
    }

    #[test]
    fn test_empty_document() {
        let mut parser = statements();
        let tree = parser.parse("  \n", None).unwrap();
        assert_eq!(tree.root_node().to_sexp(), "(program)");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_comments_are_extras() {
        let mut parser = statements();
        assert_eq!(
            sexp(&mut parser, "# start\na = b; # one\nc = d;"),
            "(program (comment) (statement name: (name) value: (name)) (comment) \
             (statement name: (name) value: (name)))"
        );
    }

    #[test]
    fn test_missing_token_is_inserted() {
        let mut parser = statements();
        let tree = parser.parse("a = b c = d;", None).unwrap();
        assert!(tree.root_node().has_error());
        assert_eq!(
            tree.root_node().to_sexp(),
            "(program (statement name: (name) value: (name) (MISSING \";\")) \
             (statement name: (name) value: (name)))"
        );
    }

    #[test]
    fn test_truncated_document_is_completed() {
        let mut parser = statements();
        let tree = parser.parse("a = b", None).unwrap();
        let root = tree.root_node();
        assert_eq!(
            root.to_sexp(),
            "(program (statement name: (name) value: (name) (MISSING \";\")))"
        );
        let statement = root.named_child(0).unwrap();
        let missing = statement.child(3).unwrap();
        assert!(missing.is_missing());
        assert_eq!(missing.byte_range(), 5..5);
    }

    #[test]
    fn test_unexpected_characters_are_skipped() {
        let mut parser = statements();
        let tree = parser.parse("a = b; @ c = d;", None).unwrap();
        let root = tree.root_node();
        assert_eq!(
            root.to_sexp(),
            "(program (statement name: (name) value: (name)) (ERROR (UNEXPECTED '@')) \
             (statement name: (name) value: (name)))"
        );
        let error = root.child(1).unwrap();
        assert!(error.is_error());
        assert_eq!(error.byte_range(), 7..8);
    }

    #[test]
    fn test_unexpected_tokens_are_skipped() {
        let mut parser = statements();
        let tree = parser.parse("a = b; ; c = d;", None).unwrap();
        assert_eq!(
            tree.root_node().to_sexp(),
            "(program (statement name: (name) value: (name)) (ERROR) \
             (statement name: (name) value: (name)))"
        );
    }

    #[test]
    fn test_trees_span_invalid_input() {
        let mut parser = arithmetic();
        for text in ["+", "1 +", "* 2 3 =", "1 2 3 4", ")"] {
            let tree = parser.parse(text, None).unwrap();
            let root = tree.root_node();
            assert!(root.has_error(), "{text}: {}", root.to_sexp());
            assert!(root.end_byte() <= text.len());
        }
    }

    #[test]
    fn test_reparse_reuses_unchanged_statements() {
        let mut parser = statements();
        let text = "a = b;\nc = d;\ne = f;";
        let mut old = parser.parse(text, None).unwrap();
        let pristine = old.clone();

        old.edit(&InputEdit::replace(text, 11, 12, "dd"));
        let new_text = "a = b;\nc = dd;\ne = f;";
        let new = parser.parse(new_text, Some(&old)).unwrap();
        let fresh = parser.parse(new_text, None).unwrap();
        assert_eq!(new.root_node().to_sexp(), fresh.root_node().to_sexp());
        assert_eq!(new.root_node().end_byte(), new_text.len());

        let (new_root, old_root) = (new.root_node(), old.root_node());
        assert_eq!(statement(new_root, 0).id(), statement(old_root, 0).id());
        assert_ne!(statement(new_root, 1).id(), statement(old_root, 1).id());
        assert_eq!(statement(new_root, 2).id(), statement(old_root, 2).id());
        assert_eq!(statement(new_root, 2).start_byte(), 15);
        assert_eq!(
            statement(new_root, 1).utf8_text(new_text.as_bytes()).unwrap(),
            "c = dd;"
        );

        // The edit left the unedited copy alone
        assert!(!pristine.root_node().has_changes());
        assert_eq!(statement(pristine.root_node(), 2).start_byte(), 14);

        let ranges = new.changed_ranges(&old);
        assert!(ranges.iter().any(|r| r.start <= 11 && r.end >= 13), "{ranges:?}");
        assert!(ranges.iter().all(|r| r.start >= 6), "{ranges:?}");
    }

    #[test]
    fn test_reparse_matches_fresh_parse_around_new_errors() {
        let mut parser = statements();
        let text = "a = b;\nc = d;\ne = f;";
        let cases = [
            (14, 15, "="),
            (12, 13, ""),
            (13, 13, ";"),
            (7, 7, "@"),
            (5, 6, ""),
            (4, 5, "= ="),
        ];
        for (start, end, replacement) in cases {
            let mut old = parser.parse(text, None).unwrap();
            old.edit(&InputEdit::replace(text, start, end, replacement));
            let new_text = format!("{}{replacement}{}", &text[..start], &text[end..]);

            let new = parser.parse(&new_text, Some(&old)).unwrap();
            let fresh = parser.parse(&new_text, None).unwrap();
            assert!(fresh.root_node().has_error(), "{new_text:?}");
            assert_eq!(
                new.root_node().to_sexp(),
                fresh.root_node().to_sexp(),
                "{new_text:?}"
            );
            assert_eq!(new.root_node().end_byte(), new_text.len());
        }
    }

    #[test]
    fn test_statements_before_an_error_are_still_reused() {
        let mut parser = statements();
        let text = "a = b;\nc = d;\ne = f;";
        let mut old = parser.parse(text, None).unwrap();
        old.edit(&InputEdit::replace(text, 18, 19, "@"));
        let new_text = "a = b;\nc = d;\ne = @;";

        let new = parser.parse(new_text, Some(&old)).unwrap();
        assert!(new.root_node().has_error());
        assert_eq!(
            new.root_node().to_sexp(),
            parser.parse(new_text, None).unwrap().root_node().to_sexp()
        );
        assert_eq!(
            statement(new.root_node(), 0).id(),
            statement(old.root_node(), 0).id()
        );
    }

    #[test]
    fn test_reduce_without_goto_recovers() {
        let mut language = compile(
            &GrammarBuilder::new("statements")
                .rule("program", repeat(sym("statement")))
                .rule("statement", seq([sym("name"), string(";")]))
                .rule("name", pattern("[a-z]+"))
                .build(),
        )
        .unwrap();
        let statement = language.id_for_node_kind("statement", true).unwrap();
        let data = Arc::get_mut(&mut language.0).unwrap();
        for state in &mut data.states {
            state.gotos.remove(&statement);
        }

        let mut parser = Parser::new();
        parser.set_language(&language).unwrap();
        let text = "a; b;";
        let tree = parser.parse(text, None).unwrap();
        let root = tree.root_node();
        assert!(root.has_error(), "{}", root.to_sexp());
        assert_eq!(root.start_byte(), 0);
        assert_eq!(root.end_byte(), text.len());
    }

    #[test]
    fn test_edited_tree_marks_changes() {
        let mut parser = statements();
        let text = "a = b;\nc = d;";
        let mut tree = parser.parse(text, None).unwrap();
        tree.edit(&InputEdit::replace(text, 11, 12, "xyz"));
        let root = tree.root_node();
        assert!(root.has_changes());
        assert!(!root.named_child(0).unwrap().has_changes());
        let second = root.named_child(1).unwrap();
        assert!(second.has_changes());
        assert_eq!(second.end_byte(), 15);
    }

    #[test]
    fn test_trees_of_other_languages_are_not_reused() {
        let other = arithmetic().parse("1", None).unwrap();
        let mut parser = statements();
        let tree = parser.parse("a = b;", Some(&other)).unwrap();
        assert_eq!(
            tree.root_node().to_sexp(),
            "(program (statement name: (name) value: (name)))"
        );
    }
}
