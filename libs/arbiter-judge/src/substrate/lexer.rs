//! Substrate tokenizer
//!
//! Handles identifiers, integer/float literals, double-quoted strings,
//! single-quoted characters and operators. Positions are kept per token so
//! syntax faults can point at a line.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Char(char),
    Sym(&'static str),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "'{}'", name),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{}", x),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Char(c) => write!(f, "{:?}", c),
            Token::Sym(s) => write!(f, "'{}'", s),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

// longest first
const SYMBOLS: &[&str] = &[
    "**=", "//=", "<<=", ">>=", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "**", "//", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=",
    "!", "~", "&", "|", "^", "(", ")", "[", "]", "{", "}", ",", ";", ":", "?",
];

pub fn tokenize(text: &str) -> Result<Vec<Spanned>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, end) = read_quoted(&chars, i, line)?;
            let token = if c == '\'' {
                let mut it = text.chars();
                match (it.next(), it.next()) {
                    (Some(ch), None) => Token::Char(ch),
                    _ => return Err(format!("line {}: malformed character literal", line)),
                }
            } else {
                Token::Str(text)
            };
            tokens.push(Spanned { token, line });
            i = end;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut is_float = false;
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    is_float = true;
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let token = if is_float {
                let value = text
                    .parse()
                    .map_err(|_| format!("line {}: bad number {}", line, text))?;
                Token::Float(value)
            } else {
                Token::Int(
                    text.parse()
                        .map_err(|_| {
                            format!("line {}: integer literal {} out of range", line, text)
                        })?,
                )
            };
            tokens.push(Spanned { token, line });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Spanned {
                token: Token::Ident(chars[start..i].iter().collect()),
                line,
            });
            continue;
        }

        let sym = SYMBOLS.iter().find(|s| {
            let len = s.len();
            i + len <= chars.len() && chars[i..i + len].iter().copied().eq(s.chars())
        });
        match sym {
            Some(s) => {
                tokens.push(Spanned {
                    token: Token::Sym(s),
                    line,
                });
                i += s.len();
            }
            None => return Err(format!("line {}: unexpected character '{}'", line, c)),
        }
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line,
    });
    Ok(tokens)
}

fn read_quoted(chars: &[char], start: usize, line: usize) -> Result<(String, usize), String> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
                i += 2;
            }
            '\n' => break,
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(format!("line {}: unterminated literal", line))
}

/// Render a string so [`tokenize`] reads it back unchanged
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Character literal counterpart of [`quote`]
pub fn quote_char(c: char) -> String {
    match c {
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\0' => "'\\0'".to_string(),
        c => format!("'{}'", c),
    }
}
