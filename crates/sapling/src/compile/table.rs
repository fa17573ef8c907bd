//! Canonical LR(1) parse table construction.
//!
//! Item sets are built from FIRST and nullable sets computed to a fixed point.
//! Conflicts are settled the way `tree-sitter generate` settles them:
//! precedence first, then associativity, then the grammar's declared
//! `conflicts`. Anything left over is reported as a [`GrammarError::Conflict`].

use crate::grammar::GrammarError;
use crate::language::{
    Action, Associativity, ParseState, Precedence, Production, ProductionStep, Symbol,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Refuse grammars whose automaton grows past this many states.
const MAX_STATES: usize = 100_000;

/// A set of terminals, as a bitset over symbol indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(super) struct TokenSet(Vec<u64>);

impl TokenSet {
    pub(super) fn new(size: usize) -> Self {
        Self(vec![0; size.div_ceil(64)])
    }

    pub(super) fn insert(&mut self, index: usize) -> bool {
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        let added = self.0[word] & bit == 0;
        self.0[word] |= bit;
        added
    }

    pub(super) fn contains(&self, index: usize) -> bool {
        self.0
            .get(index / 64)
            .is_some_and(|word| word & (1u64 << (index % 64)) != 0)
    }

    /// Adds every member of `other`; returns `true` if anything was new.
    pub(super) fn union(&mut self, other: &TokenSet) -> bool {
        let mut changed = false;
        for (mine, theirs) in self.0.iter_mut().zip(&other.0) {
            let merged = *mine | theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(w, &word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| w * 64 + bit)
        })
    }
}

/// Everything the table builder needs to know about the grammar.
pub(super) struct TableInput<'a> {
    pub productions: &'a [Production],
    /// Symbols below this index are terminals (including `end` and `ERROR`).
    pub terminal_end: usize,
    pub symbol_count: usize,
    pub start: Symbol,
    /// Symbol names, for error messages.
    pub names: &'a [String],
    /// Maps an auxiliary symbol to the rule it was generated for.
    pub parents: &'a HashMap<Symbol, Symbol>,
    /// Declared conflict groups, as nonterminal symbols.
    pub conflicts: &'a [Vec<Symbol>],
    /// Named precedence orderings, highest first.
    pub precedence_orders: &'a [Vec<String>],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct Item {
    production: usize,
    step: usize,
}

type Kernel = Vec<(Item, TokenSet)>;

struct Builder<'a> {
    input: &'a TableInput<'a>,
    /// The grammar's productions plus the augmented start production, last.
    productions: Vec<Production>,
    by_lhs: Vec<Vec<usize>>,
    first: Vec<TokenSet>,
    nullable: Vec<bool>,
}

/// Builds the parse states. State 0 is the start state.
pub(super) fn build(input: &TableInput<'_>) -> Result<Vec<ParseState>, GrammarError> {
    let mut productions = input.productions.to_vec();
    let augmented = productions.len();
    productions.push(Production {
        lhs: Symbol::new(input.symbol_count),
        steps: vec![ProductionStep {
            symbol: input.start,
            precedence: Precedence::None,
            associativity: None,
            field: None,
            alias: None,
        }],
        dynamic_precedence: 0,
    });

    let nonterminals = input.symbol_count + 1 - input.terminal_end;
    let mut by_lhs = vec![Vec::new(); nonterminals];
    for (id, production) in productions.iter().enumerate() {
        by_lhs[production.lhs.index() - input.terminal_end].push(id);
    }

    let mut builder = Builder {
        input,
        productions,
        by_lhs,
        first: vec![TokenSet::new(input.terminal_end); nonterminals],
        nullable: vec![false; nonterminals],
    };
    builder.compute_first_sets();
    builder.build_states(augmented)
}

impl Builder<'_> {
    fn is_terminal(&self, symbol: Symbol) -> bool {
        symbol.index() < self.input.terminal_end
    }

    fn nt(&self, symbol: Symbol) -> usize {
        symbol.index() - self.input.terminal_end
    }

    fn compute_first_sets(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for production in &self.productions {
                let lhs = production.lhs.index() - self.input.terminal_end;
                let mut all_nullable = true;
                for step in &production.steps {
                    if step.symbol.index() < self.input.terminal_end {
                        changed |= self.first[lhs].insert(step.symbol.index());
                        all_nullable = false;
                        break;
                    }
                    let rhs = step.symbol.index() - self.input.terminal_end;
                    if rhs != lhs {
                        let other = self.first[rhs].clone();
                        changed |= self.first[lhs].union(&other);
                    }
                    if !self.nullable[rhs] {
                        all_nullable = false;
                        break;
                    }
                }
                if all_nullable && !self.nullable[lhs] {
                    self.nullable[lhs] = true;
                    changed = true;
                }
            }
        }
    }

    /// FIRST of the steps following `item`'s next symbol, then `lookahead`
    /// if all of them can be empty.
    fn follow_first(&self, item: Item, lookahead: &TokenSet) -> TokenSet {
        let mut result = TokenSet::new(self.input.terminal_end);
        for step in &self.productions[item.production].steps[item.step + 1..] {
            if self.is_terminal(step.symbol) {
                result.insert(step.symbol.index());
                return result;
            }
            let nt = self.nt(step.symbol);
            result.union(&self.first[nt]);
            if !self.nullable[nt] {
                return result;
            }
        }
        result.union(lookahead);
        result
    }

    fn closure(&self, kernel: &Kernel) -> BTreeMap<Item, TokenSet> {
        let mut items: BTreeMap<Item, TokenSet> = kernel.iter().cloned().collect();
        let mut pending: Vec<Item> = kernel.iter().map(|(item, _)| *item).collect();

        while let Some(item) = pending.pop() {
            let Some(step) = self.productions[item.production].steps.get(item.step) else {
                continue;
            };
            if self.is_terminal(step.symbol) {
                continue;
            }
            let lookahead = self.follow_first(item, &items[&item]);
            for &production in &self.by_lhs[self.nt(step.symbol)] {
                let next = Item { production, step: 0 };
                let entry = items
                    .entry(next)
                    .or_insert_with(|| TokenSet::new(self.input.terminal_end));
                let is_new = entry.iter().next().is_none();
                if entry.union(&lookahead) || is_new {
                    pending.push(next);
                }
            }
        }
        items
    }

    fn build_states(&self, augmented: usize) -> Result<Vec<ParseState>, GrammarError> {
        let mut start_lookahead = TokenSet::new(self.input.terminal_end);
        start_lookahead.insert(Symbol::END.index());
        let start: Kernel = vec![(
            Item {
                production: augmented,
                step: 0,
            },
            start_lookahead,
        )];

        let mut ids: HashMap<Kernel, usize> = HashMap::new();
        let mut kernels = vec![start.clone()];
        ids.insert(start, 0);
        let mut states = Vec::new();

        while states.len() < kernels.len() {
            if kernels.len() > MAX_STATES {
                return Err(GrammarError::Unsupported(format!(
                    "parse table exceeds {MAX_STATES} states"
                )));
            }
            let items = self.closure(&kernels[states.len()]);

            let mut successors: BTreeMap<Symbol, BTreeMap<Item, TokenSet>> = BTreeMap::new();
            for (item, lookahead) in &items {
                if let Some(step) = self.productions[item.production].steps.get(item.step) {
                    let next = Item {
                        production: item.production,
                        step: item.step + 1,
                    };
                    successors
                        .entry(step.symbol)
                        .or_default()
                        .entry(next)
                        .or_insert_with(|| TokenSet::new(self.input.terminal_end))
                        .union(lookahead);
                }
            }

            let mut state = ParseState::default();
            let mut shifts = BTreeMap::new();
            for (symbol, kernel) in successors {
                let kernel: Kernel = kernel.into_iter().collect();
                let target = if let Some(&id) = ids.get(&kernel) {
                    id
                } else {
                    let id = kernels.len();
                    ids.insert(kernel.clone(), id);
                    kernels.push(kernel);
                    id
                };
                if self.is_terminal(symbol) {
                    shifts.insert(symbol, target);
                } else {
                    state.gotos.insert(symbol, target);
                }
            }

            self.resolve_actions(&items, &shifts, augmented, &mut state)?;
            states.push(state);
        }

        tracing::debug!(states = states.len(), "built LR(1) automaton");
        Ok(states)
    }

    fn resolve_actions(
        &self,
        items: &BTreeMap<Item, TokenSet>,
        shifts: &BTreeMap<Symbol, usize>,
        augmented: usize,
        state: &mut ParseState,
    ) -> Result<(), GrammarError> {
        let mut reductions: BTreeMap<Symbol, Vec<usize>> = BTreeMap::new();
        for (item, lookahead) in items {
            if item.step < self.productions[item.production].steps.len() {
                continue;
            }
            for terminal in lookahead.iter() {
                reductions
                    .entry(Symbol::new(terminal))
                    .or_default()
                    .push(item.production);
            }
        }

        for (&symbol, &target) in shifts {
            state.actions.insert(symbol, Action::Shift(target));
        }

        for (lookahead, candidates) in reductions {
            if candidates.contains(&augmented) {
                state.actions.insert(lookahead, Action::Accept);
                continue;
            }
            let reduce = self.choose_reduction(&candidates, lookahead)?;
            let action = match shifts.get(&lookahead) {
                Some(&target) => {
                    if self.prefer_shift(items, reduce, lookahead)? {
                        Action::Shift(target)
                    } else {
                        Action::Reduce(reduce)
                    }
                }
                None => Action::Reduce(reduce),
            };
            state.actions.insert(lookahead, action);
        }
        Ok(())
    }

    fn choose_reduction(
        &self,
        candidates: &[usize],
        lookahead: Symbol,
    ) -> Result<usize, GrammarError> {
        let mut ranked = candidates.to_vec();
        ranked.sort_by(|&a, &b| {
            let (pa, pb) = (&self.productions[a], &self.productions[b]);
            self.compare(pb.precedence(), pa.precedence())
                .then(pb.dynamic_precedence.cmp(&pa.dynamic_precedence))
                .then(a.cmp(&b))
        });
        let best = ranked[0];
        let tied: Vec<usize> = ranked
            .iter()
            .copied()
            .filter(|&other| {
                let (pa, pb) = (&self.productions[best], &self.productions[other]);
                self.compare(pa.precedence(), pb.precedence()) == Ordering::Equal
                    && pa.dynamic_precedence == pb.dynamic_precedence
            })
            .collect();
        if tied.len() > 1 {
            let symbols = tied
                .iter()
                .map(|&p| self.parent(self.productions[p].lhs))
                .collect();
            self.require_declared(symbols, lookahead)?;
            tracing::debug!(
                lookahead = self.name(lookahead),
                production = best,
                "resolved declared reduce/reduce conflict"
            );
        }
        Ok(best)
    }

    /// Decides a shift/reduce conflict on `lookahead`.
    ///
    /// The shifting side is every item past its first step whose next symbol
    /// can begin with `lookahead`; each contributes the precedence of the step
    /// it has just passed.
    fn prefer_shift(
        &self,
        items: &BTreeMap<Item, TokenSet>,
        reduce: usize,
        lookahead: Symbol,
    ) -> Result<bool, GrammarError> {
        let mut in_progress = Vec::new();
        let mut direct = Vec::new();
        for item in items.keys().copied() {
            let Some(step) = self.productions[item.production].steps.get(item.step) else {
                continue;
            };
            let starts_with = if self.is_terminal(step.symbol) {
                step.symbol == lookahead
            } else {
                self.first[self.nt(step.symbol)].contains(lookahead.index())
            };
            if !starts_with {
                continue;
            }
            if item.step > 0 {
                in_progress.push(item);
            } else if step.symbol == lookahead {
                direct.push(item);
            }
        }

        let production = &self.productions[reduce];
        let reduce_precedence = production.precedence();
        let mut shift_higher = false;
        let mut shift_lower = false;
        for item in &in_progress {
            let previous = &self.productions[item.production].steps[item.step - 1].precedence;
            match self.compare(previous, reduce_precedence) {
                Ordering::Greater => shift_higher = true,
                Ordering::Less => shift_lower = true,
                Ordering::Equal => {}
            }
        }

        match (shift_higher, shift_lower) {
            (true, false) => return Ok(true),
            (false, true) => return Ok(false),
            (false, false) => match production.associativity() {
                Some(Associativity::Left) => return Ok(false),
                Some(Associativity::Right) => return Ok(true),
                None => {}
            },
            (true, true) => {}
        }

        let mut symbols = vec![self.parent(production.lhs)];
        let involved = if in_progress.is_empty() { &direct } else { &in_progress };
        symbols.extend(
            involved
                .iter()
                .map(|item| self.parent(self.productions[item.production].lhs)),
        );
        self.require_declared(symbols, lookahead)?;
        tracing::debug!(
            lookahead = self.name(lookahead),
            production = reduce,
            "resolved declared shift/reduce conflict by shifting"
        );
        Ok(true)
    }

    fn require_declared(
        &self,
        mut symbols: Vec<Symbol>,
        lookahead: Symbol,
    ) -> Result<(), GrammarError> {
        symbols.sort();
        symbols.dedup();
        let declared = self
            .input
            .conflicts
            .iter()
            .any(|group| symbols.iter().all(|symbol| group.contains(symbol)));
        if declared {
            Ok(())
        } else {
            Err(GrammarError::Conflict {
                symbols: symbols.iter().map(|&s| self.name(s).to_string()).collect(),
                lookahead: self.name(lookahead).to_string(),
            })
        }
    }

    fn parent(&self, symbol: Symbol) -> Symbol {
        self.input.parents.get(&symbol).copied().unwrap_or(symbol)
    }

    fn name(&self, symbol: Symbol) -> &str {
        self.input
            .names
            .get(symbol.index())
            .map_or("<start>", String::as_str)
    }

    /// Orders two precedences; `Greater` means `a` binds tighter.
    fn compare(&self, a: &Precedence, b: &Precedence) -> Ordering {
        match (a, b) {
            (Precedence::Name(a), Precedence::Name(b)) => {
                for order in self.input.precedence_orders {
                    let ia = order.iter().position(|n| n == a);
                    let ib = order.iter().position(|n| n == b);
                    if let (Some(ia), Some(ib)) = (ia, ib) {
                        // Earlier entries are higher
                        return ib.cmp(&ia);
                    }
                }
                Ordering::Equal
            }
            (Precedence::Name(_), _) | (_, Precedence::Name(_)) => Ordering::Equal,
            _ => level(a).cmp(&level(b)),
        }
    }
}

fn level(precedence: &Precedence) -> i32 {
    match precedence {
        Precedence::Integer(level) => *level,
        _ => 0,
    }
}
