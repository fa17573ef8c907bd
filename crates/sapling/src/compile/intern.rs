//! Splits a grammar into lexical and syntactic variables.
//!
//! Named rules whose whole body is a token become named terminals; string and
//! pattern literals found inside syntactic rules become anonymous terminals.
//! Syntactic rules are rewritten into [`Ir`], where every leaf is an index into
//! one of the two variable lists.

use crate::grammar::{Grammar, GrammarError, Rule, RuleType, RuleValue};
use crate::language::{Alias, Associativity, Precedence};
use std::collections::HashMap;

/// A terminal: everything the lexer needs to recognise one token kind.
#[derive(Debug, Clone)]
pub(super) struct LexicalVariable {
    pub name: String,
    pub named: bool,
    pub visible: bool,
    pub rule: Rule,
    pub literal: Option<String>,
}

/// A grammar rule that becomes a nonterminal.
#[derive(Debug, Clone)]
pub(super) struct SyntaxVariable {
    pub name: String,
    pub visible: bool,
    pub rule: Ir,
}

/// Annotations carried from `PREC*`, `FIELD` and `ALIAS` wrappers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Meta {
    pub precedence: Option<Precedence>,
    pub associativity: Option<Associativity>,
    pub dynamic_precedence: Option<i32>,
    pub field: Option<String>,
    pub alias: Option<Alias>,
}

/// A syntactic rule with symbol references resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Ir {
    Blank,
    Terminal(usize),
    NonTerminal(usize),
    Seq(Vec<Ir>),
    Choice(Vec<Ir>),
    /// One or more repetitions; zero-or-more is a choice with blank.
    Repeat1(Box<Ir>),
    Meta(Box<Meta>, Box<Ir>),
}

#[derive(Debug, Clone)]
pub(super) struct InternedGrammar {
    pub lexical: Vec<LexicalVariable>,
    pub syntax: Vec<SyntaxVariable>,
    /// Anonymous extras, skipped as whitespace.
    pub whitespace: Vec<Rule>,
    /// Named extras, by lexical index.
    pub extra_terminals: Vec<usize>,
    pub word: Option<usize>,
    /// Declared conflicts, by syntactic index.
    pub conflicts: Vec<Vec<usize>>,
    /// Named precedence orderings, highest first.
    pub precedence_orders: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
enum Variable {
    Lexical(usize),
    Syntax(usize),
}

struct Interner<'a> {
    variables: HashMap<&'a str, Variable>,
    lexical: Vec<LexicalVariable>,
    token_counts: HashMap<String, usize>,
}

fn is_token_rule(rule: &Rule) -> bool {
    matches!(
        rule.rule_type,
        RuleType::String | RuleType::Pattern | RuleType::Token | RuleType::ImmediateToken
    )
}

/// The literal text of a token that is nothing but a string.
fn literal_of(rule: &Rule) -> Option<&str> {
    match rule.rule_type {
        RuleType::String => rule.string_value(),
        RuleType::Token
        | RuleType::ImmediateToken
        | RuleType::Prec
        | RuleType::PrecLeft
        | RuleType::PrecRight => rule.content.as_deref().and_then(literal_of),
        _ => None,
    }
}

pub(super) fn intern(grammar: &Grammar) -> Result<InternedGrammar, GrammarError> {
    if !grammar.externals.is_empty() {
        return Err(GrammarError::Unsupported(
            "external scanners are not supported".to_string(),
        ));
    }

    let mut interner = Interner {
        variables: HashMap::new(),
        lexical: Vec::new(),
        token_counts: HashMap::new(),
    };

    let mut syntax_rules = Vec::new();
    for (name, rule) in &grammar.rules {
        if is_token_rule(rule) {
            let index = interner.lexical.len();
            interner.lexical.push(LexicalVariable {
                name: name.clone(),
                named: true,
                visible: !name.starts_with('_'),
                rule: rule.clone(),
                literal: literal_of(rule).map(str::to_string),
            });
            interner.variables.insert(name, Variable::Lexical(index));
        } else {
            interner
                .variables
                .insert(name, Variable::Syntax(syntax_rules.len()));
            syntax_rules.push((name, rule));
        }
    }

    if let Some(start) = grammar.start_rule() {
        if matches!(interner.variables.get(start), Some(Variable::Lexical(_))) {
            return Err(GrammarError::Unsupported(format!(
                "start rule '{start}' must not be a single token"
            )));
        }
    } else {
        return Err(GrammarError::EmptyGrammar(grammar.name.clone()));
    }

    let mut syntax = Vec::with_capacity(syntax_rules.len());
    for (name, rule) in syntax_rules {
        let ir = interner.convert(rule, name)?;
        syntax.push(SyntaxVariable {
            name: name.clone(),
            visible: !name.starts_with('_')
                && !grammar.inline.contains(name)
                && !grammar.supertypes.contains(name),
            rule: ir,
        });
    }

    let mut whitespace = Vec::new();
    let mut extra_terminals = Vec::new();
    for extra in &grammar.extras {
        match extra.rule_type {
            RuleType::Symbol => match interner.lookup(extra.name.as_deref(), "extras")? {
                Variable::Lexical(index) => extra_terminals.push(index),
                Variable::Syntax(_) => {
                    return Err(GrammarError::Unsupported(format!(
                        "non-terminal extra '{}'",
                        extra.name.as_deref().unwrap_or_default()
                    )))
                }
            },
            _ if is_token_rule(extra) => whitespace.push(extra.clone()),
            _ => {
                return Err(GrammarError::Unsupported(format!(
                    "{} rule in extras",
                    extra.type_name()
                )))
            }
        }
    }

    let word = match grammar.word.as_deref() {
        Some(name) => match interner.lookup(Some(name), "word")? {
            Variable::Lexical(index) => Some(index),
            Variable::Syntax(_) => {
                return Err(GrammarError::Unsupported(format!(
                    "word rule '{name}' is not a token"
                )))
            }
        },
        None => None,
    };

    let mut conflicts = Vec::new();
    for group in &grammar.conflicts {
        let mut members = Vec::new();
        for name in group {
            if let Variable::Syntax(index) = interner.lookup(Some(name), "conflicts")? {
                members.push(index);
            }
        }
        conflicts.push(members);
    }

    let precedence_orders = grammar
        .precedences
        .iter()
        .map(|list| {
            list.iter()
                .filter_map(|entry| entry.string_value().or(entry.symbol_name()))
                .map(str::to_string)
                .collect()
        })
        .collect();

    Ok(InternedGrammar {
        lexical: interner.lexical,
        syntax,
        whitespace,
        extra_terminals,
        word,
        conflicts,
        precedence_orders,
    })
}

impl Interner<'_> {
    fn lookup(&self, name: Option<&str>, context: &str) -> Result<Variable, GrammarError> {
        let name = name.unwrap_or_default();
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| GrammarError::UndefinedSymbol {
                name: name.to_string(),
                context: context.to_string(),
            })
    }

    fn convert(&mut self, rule: &Rule, owner: &str) -> Result<Ir, GrammarError> {
        Ok(match rule.rule_type {
            RuleType::Blank => Ir::Blank,
            RuleType::String | RuleType::Pattern | RuleType::Token | RuleType::ImmediateToken => {
                Ir::Terminal(self.intern_token(rule, owner))
            }
            RuleType::Symbol => match self.lookup(rule.name.as_deref(), &format!("rule '{owner}'"))? {
                Variable::Lexical(index) => Ir::Terminal(index),
                Variable::Syntax(index) => Ir::NonTerminal(index),
            },
            RuleType::Seq => Ir::Seq(self.convert_all(&rule.members, owner)?),
            RuleType::Choice if rule.members.is_empty() => Ir::Blank,
            RuleType::Choice => Ir::Choice(self.convert_all(&rule.members, owner)?),
            RuleType::Repeat => Ir::Choice(vec![
                Ir::Repeat1(Box::new(self.convert_content(rule, owner)?)),
                Ir::Blank,
            ]),
            RuleType::Repeat1 => Ir::Repeat1(Box::new(self.convert_content(rule, owner)?)),
            RuleType::Reserved => self.convert_content(rule, owner)?,
            RuleType::Prec
            | RuleType::PrecLeft
            | RuleType::PrecRight
            | RuleType::PrecDynamic
            | RuleType::Field
            | RuleType::Alias => {
                let meta = meta_of(rule);
                Ir::Meta(Box::new(meta), Box::new(self.convert_content(rule, owner)?))
            }
        })
    }

    fn convert_all(&mut self, rules: &[Rule], owner: &str) -> Result<Vec<Ir>, GrammarError> {
        rules.iter().map(|r| self.convert(r, owner)).collect()
    }

    fn convert_content(&mut self, rule: &Rule, owner: &str) -> Result<Ir, GrammarError> {
        match rule.content.as_deref() {
            Some(content) => self.convert(content, owner),
            None => Err(GrammarError::Unsupported(format!(
                "{} rule without content in '{owner}'",
                rule.type_name()
            ))),
        }
    }

    /// Finds or creates the anonymous terminal for a token found inline.
    fn intern_token(&mut self, rule: &Rule, owner: &str) -> usize {
        let literal = literal_of(rule);
        let existing = self.lexical.iter().position(|var| {
            !var.named
                && match literal {
                    Some(text) => var.literal.as_deref() == Some(text),
                    None => var.literal.is_none() && var.rule == *rule,
                }
        });
        if let Some(index) = existing {
            return index;
        }

        let variable = if let Some(text) = literal {
            LexicalVariable {
                name: text.to_string(),
                named: false,
                visible: true,
                rule: rule.clone(),
                literal: Some(text.to_string()),
            }
        } else {
            let count = self.token_counts.entry(owner.to_string()).or_insert(0);
            *count += 1;
            LexicalVariable {
                name: format!("{owner}_token{count}"),
                named: false,
                visible: false,
                rule: rule.clone(),
                literal: None,
            }
        };
        self.lexical.push(variable);
        self.lexical.len() - 1
    }
}

fn meta_of(rule: &Rule) -> Meta {
    let precedence = match rule.value.as_ref() {
        Some(RuleValue::Integer(level)) => Some(Precedence::Integer(*level)),
        Some(RuleValue::String(name)) => Some(Precedence::Name(name.clone())),
        None => None,
    };
    match rule.rule_type {
        RuleType::Prec => Meta {
            precedence,
            ..Meta::default()
        },
        RuleType::PrecLeft => Meta {
            precedence,
            associativity: Some(Associativity::Left),
            ..Meta::default()
        },
        RuleType::PrecRight => Meta {
            precedence,
            associativity: Some(Associativity::Right),
            ..Meta::default()
        },
        RuleType::PrecDynamic => Meta {
            dynamic_precedence: rule.precedence(),
            ..Meta::default()
        },
        RuleType::Field => Meta {
            field: rule.name.clone(),
            ..Meta::default()
        },
        RuleType::Alias => Meta {
            alias: rule.label().map(|name| Alias {
                name: name.to_string(),
                named: rule.named.unwrap_or(false),
            }),
            ..Meta::default()
        },
        _ => Meta::default(),
    }
}
