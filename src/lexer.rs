//! Token stream for annotation text.
//!
//! Annotation bodies are not a clean grammar, so the lexer only separates the
//! handful of characters the extractor cares about (quotes, brackets, `=`,
//! `,`, `@`) from everything else. Every token keeps its byte span so callers
//! can slice raw text back out of the original body.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while1},
    character::complete::{anychar, char},
    combinator::{map, recognize, value},
    multi::many0_count,
    sequence::{delimited, pair},
    IResult,
};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    At,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Eq,
    /// Double-quoted literal, already unescaped
    Str(String),
    /// Identifier, number or dotted name such as `Pet.class`
    Word(String),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn is_open(&self) -> bool {
        matches!(self.kind, TokenKind::LParen | TokenKind::LBrace)
    }

    pub fn is_close(&self) -> bool {
        matches!(self.kind, TokenKind::RParen | TokenKind::RBrace)
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    delimited(
        char('"'),
        recognize(many0_count(alt((
            is_not("\\\""),
            recognize(pair(char('\\'), anychar)),
        )))),
        char('"'),
    )(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '$'))(input)
}

fn token_kind(input: &str) -> IResult<&str, TokenKind> {
    alt((
        map(string_literal, |s| TokenKind::Str(unescape(s))),
        map(word, |w: &str| TokenKind::Word(w.to_string())),
        value(TokenKind::At, char('@')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBrace, char('{')),
        value(TokenKind::RBrace, char('}')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Eq, char('=')),
        map(anychar, TokenKind::Punct),
    ))(input)
}

/// Splits `source` into tokens, skipping whitespace.
///
/// An unterminated string literal does not fail the lexer: its opening quote
/// falls through as a `Punct('"')` token and lexing resumes after it.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = source;

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let start = source.len() - rest.len();
        match token_kind(rest) {
            Ok((remaining, kind)) => {
                let end = source.len() - remaining.len();
                tokens.push(Token { kind, span: start..end });
                rest = remaining;
            }
            // anychar only fails on empty input, which was checked above
            Err(_) => break,
        }
    }

    tokens
}

/// Index of the bracket closing the group opened at `open`, counting `(` and
/// `{` as one nesting level each.
pub fn matching_close(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        if token.is_open() {
            depth += 1;
        } else if token.is_close() {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Splits a token slice on commas that are not nested inside brackets.
pub fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (idx, token) in tokens.iter().enumerate() {
        if token.is_open() {
            depth += 1;
        } else if token.is_close() {
            depth = depth.saturating_sub(1);
        } else if token.kind == TokenKind::Comma && depth == 0 {
            parts.push(&tokens[start..idx]);
            start = idx + 1;
        }
    }
    parts.push(&tokens[start..]);
    parts.retain(|part| !part.is_empty());
    parts
}

/// Splits plain text on commas outside double quotes, trimming whitespace and
/// surrounding quotes from each element.
pub fn split_quoted_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
