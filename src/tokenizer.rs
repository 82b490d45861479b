use once_cell::sync::Lazy;
use regex::Regex;

use crate::lexer::{matching_close, tokenize, TokenKind};
use crate::parser::ParserError;

/// `/*api ... */` followed by the declaration text up to the next `{` (or `;`)
static BLOCK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)/\*api\b(.*?)\*/([^{;]*)").unwrap()
});

/// Java annotations written outside the comment, e.g. `@Deprecated` or `@Produces("x")`
static JAVA_ANNOTATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@[\w.]+(?:\s*\([^()]*\))?").unwrap()
});

const VISIBILITY: &[&str] = &["public", "protected", "private"];
const IGNORED_MODIFIERS: &[&str] = &["static", "final", "synchronized"];
const TYPE_KEYWORDS: &[&str] = &["class", "interface", "enum"];

/// One annotation comment plus the declaration that follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationBlock {
    /// Comment body with the leading `*` decoration of each line removed
    pub text: String,
    pub signature: String,
    /// 1-based line of the opening `/*api`
    pub line: usize,
}

impl AnnotationBlock {
    pub fn parse_signature(&self) -> Result<Signature, ParserError> {
        Signature::parse(&self.signature)
    }

    pub fn tag_calls(&self) -> Vec<TagCall<'_>> {
        tag_calls(&self.text)
    }
}

/// Finds every annotation block in `source`, in source order.
pub fn scan_blocks(source: &str) -> Vec<AnnotationBlock> {
    BLOCK_REGEX
        .captures_iter(source)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            Some(AnnotationBlock {
                text: strip_decoration(captures.get(1)?.as_str()),
                signature: captures.get(2)?.as_str().trim().to_string(),
                line: source[..whole.start()].matches('\n').count() + 1,
            })
        })
        .collect()
}

/// True when some block in `source` carries a class-level `@Api` tag.
pub fn contains_resource(source: &str) -> bool {
    scan_blocks(source)
        .iter()
        .any(|block| block.tag_calls().iter().any(|call| call.name == "Api"))
}

fn strip_decoration(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            let line = line.trim_start();
            line.strip_prefix('*').unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One `@Name` or `@Name(...)` occurrence inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCall<'a> {
    /// Simple name, with any package qualifier dropped
    pub name: &'a str,
    /// Text between the parentheses, `None` for bare markers such as `@GET`
    pub args: Option<&'a str>,
    /// False when the closing parenthesis was never found; `args` then runs
    /// to the end of the text
    pub complete: bool,
}

/// Splits annotation text into its tag calls. Tags nested inside another
/// tag's arguments are not reported separately.
pub fn tag_calls(text: &str) -> Vec<TagCall<'_>> {
    let tokens = tokenize(text);
    let mut calls = Vec::new();
    let mut idx = 0;

    while idx < tokens.len() {
        let name = match (&tokens[idx].kind, tokens.get(idx + 1)) {
            (TokenKind::At, Some(next)) => match &next.kind {
                TokenKind::Word(_) => &text[next.span.clone()],
                _ => {
                    idx += 1;
                    continue;
                }
            },
            _ => {
                idx += 1;
                continue;
            }
        };
        let name = name.rsplit('.').next().unwrap_or(name);
        let open = idx + 2;

        match tokens.get(open) {
            Some(token) if token.kind == TokenKind::LParen => {
                let args_start = token.span.end;
                match matching_close(&tokens, open) {
                    Some(close) => {
                        calls.push(TagCall {
                            name,
                            args: Some(&text[args_start..tokens[close].span.start]),
                            complete: true,
                        });
                        idx = close + 1;
                    }
                    None => {
                        calls.push(TagCall {
                            name,
                            args: Some(&text[args_start..]),
                            complete: false,
                        });
                        idx = tokens.len();
                    }
                }
            }
            _ => {
                calls.push(TagCall { name, args: None, complete: true });
                idx = open;
            }
        }
    }

    calls
}

/// The declaration following an annotation block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Class {
        name: String,
    },
    Method {
        visibility: String,
        return_type: String,
        name: String,
    },
}

impl Signature {
    pub fn parse(text: &str) -> Result<Self, ParserError> {
        let cleaned = JAVA_ANNOTATION_REGEX.replace_all(text, " ");
        let head = cleaned.split('(').next().unwrap_or_default();
        let words = split_words(head);

        if let Some(pos) = words.iter().position(|w| TYPE_KEYWORDS.contains(&w.as_str())) {
            return match words.get(pos + 1) {
                Some(name) => Ok(Self::Class { name: name.clone() }),
                None => Err(ParserError::MalformedSignature(text.trim().to_string())),
            };
        }

        let words: Vec<String> = words
            .into_iter()
            .filter(|w| !IGNORED_MODIFIERS.contains(&w.as_str()))
            .collect();

        match words.as_slice() {
            [visibility, return_type, name]
                if VISIBILITY.contains(&visibility.as_str()) && is_identifier(name) =>
            {
                Ok(Self::Method {
                    visibility: visibility.clone(),
                    return_type: return_type.clone(),
                    name: name.clone(),
                })
            }
            _ => Err(ParserError::MalformedSignature(text.trim().to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Class { name } | Self::Method { name, .. } => name,
        }
    }
}

/// Whitespace split that keeps generic arguments such as `Map<String, Pet>`
/// in one word.
fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in text.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() => {}
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
