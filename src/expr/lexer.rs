//! Tokenizer for expression source text.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

/// Token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Punctuators, longest first so greedy matching works.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "+=", "-=", "(", ")",
    "[", "]", "{", "}", ",", ".", ":", "?", "+", "-", "*", "/", "%", "!", "<", ">", "=",
];

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = if c.is_ascii_digit() || (c == b'.' && next_is_digit(bytes, pos)) {
            let (n, end) = read_number(src, pos)?;
            pos = end;
            Token::Number(n)
        } else if c == b'"' || c == b'\'' {
            let (s, end) = read_string(src, pos)?;
            pos = end;
            Token::Str(s)
        } else if is_ident_start(c) {
            let end = src[pos..]
                .find(|ch: char| !is_ident_continue(ch))
                .map_or(src.len(), |i| pos + i);
            let ident = src[pos..end].to_owned();
            pos = end;
            Token::Ident(ident)
        } else {
            let rest = &src[pos..];
            let punct = PUNCTUATORS
                .iter()
                .copied()
                .find(|p| rest.starts_with(p))
                .ok_or_else(|| {
                    let ch = rest.chars().next().unwrap_or(' ');
                    ExprError::syntax(pos, format!("unexpected character `{ch}`"))
                })?;
            // `a?.5:1` is a ternary, not optional chaining
            let punct = if punct == "?." && next_is_digit(bytes, pos + 1) { "?" } else { punct };
            pos += punct.len();
            Token::Punct(punct)
        };

        tokens.push(Spanned { token, pos: start });
    }

    tokens.push(Spanned { token: Token::Eof, pos: src.len() });
    Ok(tokens)
}

#[inline]
fn next_is_digit(bytes: &[u8], pos: usize) -> bool {
    bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)
}

#[inline]
const fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn read_number(src: &str, start: usize) -> Result<(f64, usize), ExprError> {
    let bytes = src.as_bytes();
    let mut end = start;
    let mut seen_dot = false;
    let mut seen_exp = false;

    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if !seen_exp => {
                seen_exp = true;
                if matches!(bytes.get(end + 1), Some(b'+' | b'-')) {
                    end += 1;
                }
            }
            _ => break,
        }
        end += 1;
    }

    src[start..end]
        .parse()
        .map(|n| (n, end))
        .map_err(|_| ExprError::syntax(start, format!("invalid number `{}`", &src[start..end])))
}

/// Read a quoted string starting at `start` (the quote), handling JSON-style escapes.
fn read_string(src: &str, start: usize) -> Result<(String, usize), ExprError> {
    let quote = src.as_bytes()[start] as char;
    let mut out = String::new();
    let mut chars = src[start + 1..].char_indices();

    while let Some((i, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((out, start + 1 + i + 1)),
            '\\' => {
                let (_, esc) = chars
                    .next()
                    .ok_or_else(|| ExprError::syntax(start, "unterminated string"))?;
                match esc {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    '0' => out.push('\0'),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| ExprError::syntax(start, format!("invalid escape `\\u{hex}`")))?;
                        out.push(code);
                    }
                    other => out.push(other),
                }
            }
            c => out.push(c),
        }
    }

    Err(ExprError::syntax(start, "unterminated string"))
}

// ============================================================================
// Tests
// ============================================================================
