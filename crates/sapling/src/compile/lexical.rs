//! Turns token rules into anchored regular expressions.

use super::intern::LexicalVariable;
use crate::grammar::{GrammarError, Rule, RuleType};
use crate::language::TerminalPattern;
use regex::Regex;

/// Builds the pattern for every terminal, in lexical order.
pub(super) fn build_patterns(
    variables: &[LexicalVariable],
) -> Result<Vec<TerminalPattern>, GrammarError> {
    variables
        .iter()
        .map(|var| {
            Ok(TerminalPattern {
                regex: anchored(&var.name, &regex_source(&var.rule)?)?,
                literal: var.literal.clone(),
                precedence: lexical_precedence(&var.rule),
            })
        })
        .collect()
}

/// Builds the matchers for anonymous extras.
pub(super) fn build_whitespace(rules: &[Rule]) -> Result<Vec<Regex>, GrammarError> {
    rules
        .iter()
        .map(|rule| anchored("extras", &regex_source(rule)?))
        .collect()
}

fn anchored(name: &str, source: &str) -> Result<Regex, GrammarError> {
    Regex::new(&format!(r"\A(?:{source})")).map_err(|source| GrammarError::InvalidPattern {
        terminal: name.to_string(),
        source,
    })
}

/// The regex source for a token rule.
pub(super) fn regex_source(rule: &Rule) -> Result<String, GrammarError> {
    let content = || {
        rule.content
            .as_deref()
            .ok_or_else(|| GrammarError::Unsupported(format!("{} without content", rule.type_name())))
    };
    Ok(match rule.rule_type {
        RuleType::Blank => String::new(),
        RuleType::String => regex::escape(rule.string_value().unwrap_or_default()),
        RuleType::Pattern => {
            let source = js_to_rust(rule.pattern_value().unwrap_or_default());
            let flags: String = rule
                .flags
                .as_deref()
                .unwrap_or_default()
                .chars()
                .filter(|f| matches!(f, 'i' | 's' | 'm'))
                .collect();
            if flags.is_empty() {
                format!("(?:{source})")
            } else {
                format!("(?{flags}:{source})")
            }
        }
        RuleType::Seq => rule
            .members
            .iter()
            .map(|m| regex_source(m).map(|s| format!("(?:{s})")))
            .collect::<Result<String, _>>()?,
        RuleType::Choice => {
            let alternatives = rule
                .members
                .iter()
                .map(regex_source)
                .collect::<Result<Vec<_>, _>>()?;
            format!("(?:{})", alternatives.join("|"))
        }
        RuleType::Repeat => format!("(?:{})*", regex_source(content()?)?),
        RuleType::Repeat1 => format!("(?:{})+", regex_source(content()?)?),
        RuleType::Token
        | RuleType::ImmediateToken
        | RuleType::Prec
        | RuleType::PrecLeft
        | RuleType::PrecRight
        | RuleType::PrecDynamic
        | RuleType::Field
        | RuleType::Alias
        | RuleType::Reserved => regex_source(content()?)?,
        RuleType::Symbol => {
            return Err(GrammarError::Unsupported(format!(
                "symbol '{}' inside a token",
                rule.name.as_deref().unwrap_or_default()
            )))
        }
    })
}

/// Precedence declared directly inside `token(...)`.
fn lexical_precedence(rule: &Rule) -> i32 {
    match rule.rule_type {
        RuleType::Token | RuleType::ImmediateToken => {
            rule.content.as_deref().map_or(0, lexical_precedence)
        }
        RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight => {
            rule.precedence().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Rewrites JavaScript regex syntax into the `regex` crate's dialect.
///
/// Handles `\uXXXX` and `\u{...}` escapes, `\d` (ASCII in JavaScript),
/// redundant `\/`, literal braces, and characters inside classes that the
/// `regex` crate treats as set operators.
pub(super) fn js_to_rust(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 8);
    let mut in_class = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            let next = chars[i + 1];
            match next {
                'u' => {
                    if let Some((hex, consumed)) = unicode_escape(&chars[i + 2..]) {
                        out.push_str(&format!("\\x{{{hex}}}"));
                        i += 2 + consumed;
                    } else {
                        out.push('u');
                        i += 2;
                    }
                    continue;
                }
                'd' => out.push_str(if in_class { "0-9" } else { "[0-9]" }),
                '/' => out.push('/'),
                _ => {
                    out.push('\\');
                    out.push(next);
                }
            }
            i += 2;
            continue;
        }

        match c {
            '[' if in_class => out.push_str("\\["),
            '[' => {
                in_class = true;
                out.push('[');
                if chars.get(i + 1) == Some(&'^') {
                    out.push('^');
                    i += 1;
                }
                // A leading `]` is literal in JavaScript
                if chars.get(i + 1) == Some(&']') {
                    out.push_str("\\]");
                    i += 1;
                }
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '{' if !in_class => match repetition_len(&chars[i..]) {
                Some(len) => {
                    out.extend(&chars[i..i + len]);
                    i += len;
                    continue;
                }
                None => out.push_str("\\{"),
            },
            '}' if !in_class => out.push_str("\\}"),
            _ => out.push(c),
        }
        i += 1;
    }

    out
}

/// Parses the part after `\u`: either four hex digits or `{hex+}`.
fn unicode_escape(rest: &[char]) -> Option<(String, usize)> {
    if rest.first() == Some(&'{') {
        let close = rest.iter().position(|&c| c == '}')?;
        let hex: String = rest[1..close].iter().collect();
        if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some((hex, close + 1));
        }
        return None;
    }
    if rest.len() >= 4 && rest[..4].iter().all(char::is_ascii_hexdigit) {
        return Some((rest[..4].iter().collect(), 4));
    }
    None
}

/// Length of a `{n}`, `{n,}` or `{n,m}` quantifier at the start of `rest`.
fn repetition_len(rest: &[char]) -> Option<usize> {
    let close = rest.iter().position(|&c| c == '}')?;
    let body: String = rest[1..close].iter().collect();
    let mut parts = body.splitn(2, ',');
    let min = parts.next()?;
    let valid_min = !min.is_empty() && min.chars().all(|c| c.is_ascii_digit());
    let valid_max = parts
        .next()
        .is_none_or(|max| max.chars().all(|c| c.is_ascii_digit()));
    (valid_min && valid_max).then_some(close + 1)
}
