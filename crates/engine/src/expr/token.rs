//! Tokenizer for the arithmetic grammar.

use tally_types::ExpressionError;

/// Reserved prefix marking a field-reference token.
const FIELD_PREFIX: &str = "intake.";

/// One lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Decimal number literal; leading-dot form (`.5`) is allowed.
    Number(f64),
    /// Field reference, stored without its `intake.` prefix.
    Field(String),
    Plus,
    Minus,
    Star,
    Slash,
    OpenParen,
    CloseParen,
}

impl TokenKind {
    /// Short rendering used in parser error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(value) => value.to_string(),
            TokenKind::Field(name) => format!("{FIELD_PREFIX}{name}"),
            TokenKind::Plus => "+".into(),
            TokenKind::Minus => "-".into(),
            TokenKind::Star => "*".into(),
            TokenKind::Slash => "/".into(),
            TokenKind::OpenParen => "(".into(),
            TokenKind::CloseParen => ")".into(),
        }
    }
}

/// A token plus the byte position where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits expression text into tokens.
///
/// Whitespace is skipped; any character outside the grammar fails
/// immediately with its byte position.
pub fn tokenize(text: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut index = 0usize;

    while index < bytes.len() {
        let byte = bytes[index];
        let position = index;

        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => {
                index += 1;
            }
            b'+' => {
                tokens.push(Token {
                    kind: TokenKind::Plus,
                    position,
                });
                index += 1;
            }
            b'-' => {
                tokens.push(Token {
                    kind: TokenKind::Minus,
                    position,
                });
                index += 1;
            }
            b'*' => {
                tokens.push(Token {
                    kind: TokenKind::Star,
                    position,
                });
                index += 1;
            }
            b'/' => {
                tokens.push(Token {
                    kind: TokenKind::Slash,
                    position,
                });
                index += 1;
            }
            b'(' => {
                tokens.push(Token {
                    kind: TokenKind::OpenParen,
                    position,
                });
                index += 1;
            }
            b')' => {
                tokens.push(Token {
                    kind: TokenKind::CloseParen,
                    position,
                });
                index += 1;
            }
            b'0'..=b'9' | b'.' => {
                let end = scan_while(bytes, index, |b| b.is_ascii_digit() || b == b'.');
                let literal = &text[index..end];
                let value: f64 = literal.parse().map_err(|_| ExpressionError::UnexpectedToken {
                    token: literal.to_string(),
                    position,
                })?;
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    position,
                });
                index = end;
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let end = scan_while(bytes, index, |b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.');
                let word = &text[index..end];
                let field = word.strip_prefix(FIELD_PREFIX).ok_or_else(|| ExpressionError::UnexpectedToken {
                    token: word.to_string(),
                    position,
                })?;
                if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(ExpressionError::UnexpectedToken {
                        token: word.to_string(),
                        position,
                    });
                }
                tokens.push(Token {
                    kind: TokenKind::Field(field.to_string()),
                    position,
                });
                index = end;
            }
            _ => {
                // Report the full character, not the leading byte.
                let character = text[index..].chars().next().unwrap_or('?');
                return Err(ExpressionError::UnexpectedCharacter { character, position });
            }
        }
    }

    Ok(tokens)
}

fn scan_while(bytes: &[u8], start: usize, accept: impl Fn(u8) -> bool) -> usize {
    let mut end = start;
    while end < bytes.len() && accept(bytes[end]) {
        end += 1;
    }
    end
}
