//! Expands syntactic rules into flat productions.
//!
//! Choices multiply out into separate productions, repetitions become
//! left-recursive auxiliary rules, and precedence, field and alias wrappers
//! are pushed down onto the individual steps they cover.

use super::intern::{Ir, Meta, SyntaxVariable};
use crate::grammar::GrammarError;
use crate::language::{
    Alias, AliasId, Associativity, FieldId, Precedence, Production, ProductionStep, Symbol,
    FIRST_TERMINAL,
};

/// Beyond this many alternatives for a single rule, expansion is refused.
const MAX_ALTERNATIVES: usize = 4096;

/// A nonterminal after flattening: either a grammar rule or an auxiliary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FlatVariable {
    pub name: String,
    pub visible: bool,
    /// The grammar rule an auxiliary was generated for.
    pub parent: Option<usize>,
}

#[derive(Debug, Clone)]
pub(super) struct FlatGrammar {
    pub variables: Vec<FlatVariable>,
    pub productions: Vec<Production>,
    pub field_names: Vec<String>,
    pub aliases: Vec<Alias>,
}

#[derive(Debug, Clone, Default)]
struct Context {
    precedence: Precedence,
    associativity: Option<Associativity>,
    field: Option<FieldId>,
    alias: Option<AliasId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Alternative {
    steps: Vec<ProductionStep>,
    dynamic_precedence: i32,
}

struct Flattener {
    nonterminal_base: usize,
    variables: Vec<FlatVariable>,
    alternatives: Vec<Vec<Alternative>>,
    repeats: Vec<(Ir, usize)>,
    repeat_counts: Vec<usize>,
    field_names: Vec<String>,
    aliases: Vec<Alias>,
}

/// Flattens every syntactic rule. Nonterminal `i` becomes the symbol
/// `FIRST_TERMINAL + terminal_count + i`; auxiliaries are numbered after the
/// grammar's own rules.
pub(super) fn flatten(
    syntax: &[SyntaxVariable],
    terminal_count: usize,
) -> Result<FlatGrammar, GrammarError> {
    let mut flattener = Flattener {
        nonterminal_base: FIRST_TERMINAL + terminal_count,
        variables: syntax
            .iter()
            .map(|var| FlatVariable {
                name: var.name.clone(),
                visible: var.visible,
                parent: None,
            })
            .collect(),
        alternatives: vec![Vec::new(); syntax.len()],
        repeats: Vec::new(),
        repeat_counts: vec![0; syntax.len()],
        field_names: Vec::new(),
        aliases: Vec::new(),
    };

    for (index, var) in syntax.iter().enumerate() {
        let alternatives = flattener.expand(&var.rule, &Context::default(), index)?;
        flattener.alternatives[index] = alternatives;
    }

    let mut productions = Vec::new();
    for (index, alternatives) in flattener.alternatives.iter().enumerate() {
        let lhs = Symbol::new(flattener.nonterminal_base + index);
        let mut seen: Vec<&Alternative> = Vec::new();
        for alternative in alternatives {
            let is_self_unit = alternative.steps.len() == 1 && alternative.steps[0].symbol == lhs;
            if is_self_unit || seen.contains(&alternative) {
                continue;
            }
            seen.push(alternative);
            productions.push(Production {
                lhs,
                steps: alternative.steps.clone(),
                dynamic_precedence: alternative.dynamic_precedence,
            });
        }
    }

    Ok(FlatGrammar {
        variables: flattener.variables,
        productions,
        field_names: flattener.field_names,
        aliases: flattener.aliases,
    })
}

impl Flattener {
    fn expand(
        &mut self,
        ir: &Ir,
        context: &Context,
        owner: usize,
    ) -> Result<Vec<Alternative>, GrammarError> {
        Ok(match ir {
            Ir::Blank => vec![Alternative::default()],
            Ir::Terminal(index) => vec![self.single(FIRST_TERMINAL + index, context)],
            Ir::NonTerminal(index) => vec![self.single(self.nonterminal_base + index, context)],
            Ir::Seq(members) => {
                let mut result = vec![Alternative::default()];
                for member in members {
                    let tails = self.expand(member, context, owner)?;
                    if result.len() * tails.len() > MAX_ALTERNATIVES {
                        return Err(GrammarError::Unsupported(format!(
                            "rule '{}' expands to too many alternatives",
                            self.variables[owner].name
                        )));
                    }
                    result = result
                        .iter()
                        .flat_map(|head| tails.iter().map(move |tail| concat(head, tail)))
                        .collect();
                }
                result
            }
            Ir::Choice(members) => {
                let mut result = Vec::new();
                for member in members {
                    result.extend(self.expand(member, context, owner)?);
                }
                result
            }
            Ir::Repeat1(inner) => {
                let aux = self.repeat_variable(inner, owner)?;
                vec![self.single(self.nonterminal_base + aux, context)]
            }
            Ir::Meta(meta, inner) => {
                let inner_context = self.apply(context, meta);
                let mut result = self.expand(inner, &inner_context, owner)?;
                if let Some(dynamic) = meta.dynamic_precedence {
                    for alternative in &mut result {
                        if dynamic.abs() > alternative.dynamic_precedence.abs() {
                            alternative.dynamic_precedence = dynamic;
                        }
                    }
                }
                result
            }
        })
    }

    fn single(&self, symbol: usize, context: &Context) -> Alternative {
        Alternative {
            steps: vec![ProductionStep {
                symbol: Symbol::new(symbol),
                precedence: context.precedence.clone(),
                associativity: context.associativity,
                field: context.field,
                alias: context.alias,
            }],
            dynamic_precedence: 0,
        }
    }

    fn apply(&mut self, context: &Context, meta: &Meta) -> Context {
        let mut next = context.clone();
        if let Some(precedence) = &meta.precedence {
            next.precedence = precedence.clone();
        }
        if meta.associativity.is_some() {
            next.associativity = meta.associativity;
        }
        if let Some(field) = &meta.field {
            next.field = Some(intern_name(&mut self.field_names, field));
        }
        if let Some(alias) = &meta.alias {
            let id = match self.aliases.iter().position(|a| a == alias) {
                Some(id) => id,
                None => {
                    self.aliases.push(alias.clone());
                    self.aliases.len() - 1
                }
            };
            next.alias = Some(id);
        }
        next
    }

    /// Returns the auxiliary for `inner+`, creating `A -> A inner | inner`.
    fn repeat_variable(&mut self, inner: &Ir, owner: usize) -> Result<usize, GrammarError> {
        if let Some((_, index)) = self.repeats.iter().find(|(ir, _)| ir == inner) {
            return Ok(*index);
        }

        let parent = self.variables[owner].parent.unwrap_or(owner);
        self.repeat_counts[parent] += 1;
        let index = self.variables.len();
        let name = format!(
            "{}_repeat{}",
            self.variables[parent].name, self.repeat_counts[parent]
        );
        self.variables.push(FlatVariable {
            name,
            visible: false,
            parent: Some(parent),
        });
        self.alternatives.push(Vec::new());
        self.repeats.push((inner.clone(), index));

        let body = self.expand(inner, &Context::default(), index)?;
        let recursive = self.single(self.nonterminal_base + index, &Context::default());
        let mut alternatives: Vec<Alternative> =
            body.iter().map(|tail| concat(&recursive, tail)).collect();
        alternatives.extend(body);
        self.alternatives[index] = alternatives;
        Ok(index)
    }
}

fn concat(head: &Alternative, tail: &Alternative) -> Alternative {
    let mut steps = head.steps.clone();
    steps.extend(tail.steps.iter().cloned());
    let dynamic_precedence = if tail.dynamic_precedence.abs() > head.dynamic_precedence.abs() {
        tail.dynamic_precedence
    } else {
        head.dynamic_precedence
    };
    Alternative {
        steps,
        dynamic_precedence,
    }
}

fn intern_name(names: &mut Vec<String>, name: &str) -> usize {
    if let Some(id) = names.iter().position(|n| n == name) {
        id
    } else {
        names.push(name.to_string());
        names.len() - 1
    }
}
