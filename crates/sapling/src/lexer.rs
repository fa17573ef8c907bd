//! The context-aware lexer.
//!
//! The parser asks for one token at a time, passing the lexical mode of its
//! current state. Only terminals valid in that mode (plus named extras such
//! as comments) compete, which is what lets a keyword like `date` be a type
//! in one place and an identifier in another.

use crate::language::{Language, LexMode, Symbol};
use crate::tree::Length;
use std::cmp::Reverse;

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub symbol: Symbol,
    /// Whitespace skipped before the token.
    pub padding: Length,
    pub size: Length,
    /// Set when no terminal matched; the token is an `ERROR` leaf.
    pub unexpected: Option<char>,
}

pub(crate) struct Lexer<'a> {
    language: &'a Language,
    text: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(language: &'a Language, text: &'a str) -> Self {
        Self { language, text }
    }

    /// Reads the token starting at `position` (after any whitespace) in the
    /// given lexical mode.
    pub fn lex(&self, position: Length, mode: usize) -> Token {
        let start = self.skip_whitespace(position.bytes);
        let padding = Length::of(self.text.get(position.bytes..start).unwrap_or_default());
        let rest = self.text.get(start..).unwrap_or_default();

        if rest.is_empty() {
            return Token {
                symbol: Symbol::END,
                padding,
                size: Length::ZERO,
                unexpected: None,
            };
        }

        let empty = LexMode { valid: Vec::new() };
        let mode = self.language.lexical().modes.get(mode).unwrap_or(&empty);
        let (symbol, len) = match self.lex_in_mode(rest, mode) {
            Some(found) => found,
            None => match self.lex_any(rest) {
                Some(found) => {
                    tracing::trace!(offset = start, symbol = ?found.0, "token not valid here");
                    found
                }
                None => {
                    let character = rest.chars().next().unwrap_or('\0');
                    tracing::trace!(offset = start, ?character, "unexpected character");
                    return Token {
                        symbol: Symbol::ERROR,
                        padding,
                        size: Length::of(&rest[..character.len_utf8()]),
                        unexpected: Some(character),
                    };
                }
            },
        };
        Token {
            symbol,
            padding,
            size: Length::of(&rest[..len]),
            unexpected: None,
        }
    }

    fn skip_whitespace(&self, mut offset: usize) -> usize {
        let whitespace = &self.language.lexical().whitespace;
        loop {
            let rest = self.text.get(offset..).unwrap_or_default();
            let skipped = whitespace
                .iter()
                .filter_map(|regex| regex.find(rest))
                .map(|m| m.end())
                .max()
                .unwrap_or(0);
            if skipped == 0 {
                return offset;
            }
            offset += skipped;
        }
    }

    /// The best token among those valid in `mode`.
    fn lex_in_mode(&self, rest: &str, mode: &LexMode) -> Option<(Symbol, usize)> {
        let lexical = self.language.lexical();
        let keyword_valid = mode.valid.iter().any(|&s| lexical.is_keyword(s));
        let mut candidates: Vec<Symbol> = mode
            .valid
            .iter()
            .copied()
            .filter(|&s| !lexical.is_keyword(s))
            .collect();
        for &extra in &lexical.extras {
            if !candidates.contains(&extra) {
                candidates.push(extra);
            }
        }
        if let Some(word) = lexical.word {
            if keyword_valid && !candidates.contains(&word) {
                candidates.push(word);
            }
        }

        loop {
            let (symbol, len) = self.longest_match(rest, &candidates)?;
            if Some(symbol) != lexical.word {
                return Some((symbol, len));
            }
            if let Some(keyword) = lexical
                .keywords
                .get(&rest[..len])
                .and_then(|symbols| symbols.iter().find(|&&s| mode.contains(s)))
            {
                return Some((*keyword, len));
            }
            if mode.contains(symbol) {
                return Some((symbol, len));
            }
            // The word token was only a carrier for keywords
            candidates.retain(|&s| s != symbol);
        }
    }

    /// The best token among all terminals, ignoring the parse state.
    fn lex_any(&self, rest: &str) -> Option<(Symbol, usize)> {
        let lexical = self.language.lexical();
        let all: Vec<Symbol> = (0..lexical.patterns.len())
            .map(|i| Symbol::new(crate::language::FIRST_TERMINAL + i))
            .filter(|&s| !lexical.is_keyword(s))
            .collect();
        let (symbol, len) = self.longest_match(rest, &all)?;
        if Some(symbol) == lexical.word {
            if let Some(&keyword) = lexical
                .keywords
                .get(&rest[..len])
                .and_then(|symbols| symbols.first())
            {
                return Some((keyword, len));
            }
        }
        Some((symbol, len))
    }

    /// Ranks matches by lexical precedence, then length, then literal over
    /// pattern, then declaration order.
    fn longest_match(&self, rest: &str, candidates: &[Symbol]) -> Option<(Symbol, usize)> {
        let lexical = self.language.lexical();
        candidates
            .iter()
            .filter_map(|&symbol| {
                let pattern = lexical.pattern(symbol)?;
                let len = pattern.regex.find(rest)?.end();
                (len > 0).then_some((symbol, len, pattern.precedence, pattern.literal.is_some()))
            })
            .max_by_key(|&(symbol, len, precedence, literal)| {
                (precedence, len, literal, Reverse(symbol))
            })
            .map(|(symbol, len, _, _)| (symbol, len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::grammar::dsl::{choice, pattern, repeat, seq, string, sym, token, GrammarBuilder};

    fn keywords() -> Language {
        let grammar = GrammarBuilder::new("kw")
            .rule("program", repeat(sym("_statement")))
            .rule(
                "_statement",
                choice([sym("declaration"), sym("comment")]),
            )
            .rule(
                "declaration",
                seq([
                    choice([string("int"), string("date")]),
                    sym("identifier"),
                    string(";"),
                ]),
            )
            .rule("identifier", pattern("[a-z_]+"))
            .rule("comment", token(seq([string("//"), pattern(".*")])))
            .word("identifier")
            .build();
        compile(&grammar).unwrap()
    }

    fn kind(language: &Language, token: Token) -> &str {
        language.node_kind_for_id(token.symbol).unwrap()
    }

    fn mode_after(language: &Language, kinds: &[(&str, bool)]) -> usize {
        let mut state = 0;
        for &(kind, named) in kinds {
            let symbol = language.id_for_node_kind(kind, named).unwrap();
            match language.action(state, symbol) {
                Some(crate::language::Action::Shift(next)) => state = next,
                other => panic!("no shift on {kind}: {other:?}"),
            }
        }
        language.lex_mode_of(state)
    }

    #[test]
    fn test_keywords_depend_on_the_state() {
        let language = keywords();
        let lexer = Lexer::new(&language, "date date;");

        let first = lexer.lex(Length::ZERO, mode_after(&language, &[]));
        assert_eq!(kind(&language, first), "date");
        assert_eq!(first.size.bytes, 4);

        let mode = mode_after(&language, &[("date", false)]);
        let second = lexer.lex(Length::of("date"), mode);
        assert_eq!(kind(&language, second), "identifier");
        assert_eq!(second.padding, Length::of(" "));
    }

    #[test]
    fn test_padding_and_end() {
        let language = keywords();
        let lexer = Lexer::new(&language, "int x;\n\n");
        let end = lexer.lex(Length::of("int x;"), 0);
        assert_eq!(end.symbol, Symbol::END);
        assert_eq!(end.padding, Length::of("\n\n"));
        assert_eq!(end.size, Length::ZERO);
    }

    #[test]
    fn test_token_rules_match_as_one_terminal() {
        let language = keywords();
        let lexer = Lexer::new(&language, "  // note\nint");
        let token = lexer.lex(Length::ZERO, 0);
        assert_eq!(kind(&language, token), "comment");
        assert_eq!(token.size, Length::of("// note"));
    }

    #[test]
    fn test_invalid_tokens_fall_back_to_any_terminal() {
        let language = keywords();
        let lexer = Lexer::new(&language, ";");
        let token = lexer.lex(Length::ZERO, mode_after(&language, &[]));
        assert_eq!(kind(&language, token), ";");
        assert!(token.unexpected.is_none());
    }

    #[test]
    fn test_unknown_characters_become_errors() {
        let language = keywords();
        let lexer = Lexer::new(&language, " @x");
        let token = lexer.lex(Length::ZERO, 0);
        assert_eq!(token.symbol, Symbol::ERROR);
        assert_eq!(token.unexpected, Some('@'));
        assert_eq!(token.size.bytes, 1);
        assert_eq!(token.padding.bytes, 1);
    }
}
