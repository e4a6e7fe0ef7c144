//! Source scanner shared by the extractor and the normalizer
//!
//! Knows just enough about each source language to tell code apart from
//! string literals, character literals and comments, and to split code into
//! coarse tokens. It never rejects input: anything it does not recognise
//! becomes a one-character punctuation token and is left for the substrate
//! to judge.

use arbiter_common::types::Language;

/// Comment and literal conventions of a source language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// `//` and `/* */` comments, `'c'` character literals
    CFamily,
    /// `#` comments, `'..'` strings, triple-quoted strings
    Python,
}

impl From<Language> for Style {
    fn from(language: Language) -> Self {
        match language {
            Language::Python => Style::Python,
            Language::Java | Language::Cpp => Style::CFamily,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    /// Decoded string literal contents
    Str(String),
    /// Decoded C-family character literal
    Char(String),
    Punct(String),
}

impl Tok {
    pub fn punct(p: &str) -> Tok {
        Tok::Punct(p.to_string())
    }

    pub fn ident(name: &str) -> Tok {
        Tok::Ident(name.to_string())
    }

    pub fn is_punct(&self, p: &str) -> bool {
        matches!(self, Tok::Punct(q) if q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, Tok::Ident(n) if n == name)
    }

    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Tok::Ident(n) => Some(n),
            _ => None,
        }
    }

    /// Tokens that can end an operand (so a following `[` or `(` is a postfix)
    pub fn ends_operand(&self) -> bool {
        match self {
            Tok::Ident(_) | Tok::Int(_) | Tok::Float(_) | Tok::Str(_) | Tok::Char(_) => true,
            Tok::Punct(p) => p == ")" || p == "]",
        }
    }
}

const C_PUNCT: &[&str] = &[
    "<<=", "->", "::", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "<<",
];

const PY_PUNCT: &[&str] = &[
    "**=", "//=", "<<=", ">>=", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "**", "//", "<<", ">>", "->",
];

/// If a literal or comment starts at `i`, return the index just past it.
///
/// Unterminated literals run to the end of input.
pub fn skip_literal_or_comment(chars: &[char], i: usize, style: Style) -> Option<usize> {
    let c = *chars.get(i)?;
    let next = chars.get(i + 1).copied();
    match (style, c) {
        (Style::CFamily, '/') if next == Some('/') => Some(line_end(chars, i)),
        (Style::CFamily, '/') if next == Some('*') => {
            let mut j = i + 2;
            while j + 1 < chars.len() && !(chars[j] == '*' && chars[j + 1] == '/') {
                j += 1;
            }
            Some((j + 2).min(chars.len()))
        }
        (Style::Python, '#') => Some(line_end(chars, i)),
        (Style::Python, '"') | (Style::Python, '\'') if is_triple(chars, i, c) => {
            let mut j = i + 3;
            while j < chars.len() && !is_triple(chars, j, c) {
                if chars[j] == '\\' {
                    j += 1;
                }
                j += 1;
            }
            Some((j + 3).min(chars.len()))
        }
        (_, '"') | (_, '\'') => Some(quoted_end(chars, i, c)),
        _ => None,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_triple(chars: &[char], i: usize, quote: char) -> bool {
    chars.get(i..i + 3).is_some_and(|run| run.iter().all(|&c| c == quote))
}

fn line_end(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn quoted_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\n' => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// Remove comments, keeping line structure intact
pub fn strip_comments(text: &str, style: Style) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if let Some(end) = skip_literal_or_comment(&chars, i, style) {
            let is_comment = match style {
                Style::CFamily => chars[i] == '/',
                Style::Python => chars[i] == '#',
            };
            if is_comment {
                // keep newlines swallowed by block comments
                out.extend(chars[i..end].iter().filter(|c| **c == '\n'));
            } else {
                out.extend(&chars[i..end]);
            }
            i = end;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Split code into tokens. Comments are dropped.
pub fn tokenize(text: &str, style: Style) -> Vec<Tok> {
    let chars: Vec<char> = text.chars().collect();
    let table = match style {
        Style::CFamily => C_PUNCT,
        Style::Python => PY_PUNCT,
    };
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || (style == Style::Python && c == '\\') {
            i += 1;
            continue;
        }

        if let Some(end) = skip_literal_or_comment(&chars, i, style) {
            match c {
                '"' | '\'' => {
                    let triple = style == Style::Python && is_triple(&chars, i, c);
                    let (open, close) = if triple { (3, 3) } else { (1, 1) };
                    let closed = end >= i + open + close && ends_with_quote(&chars, end, c, close);
                    let close_at = if closed { end - close } else { end };
                    let body = decode_escapes(&chars[i + open..close_at.max(i + open)]);
                    if c == '\'' && style == Style::CFamily {
                        toks.push(Tok::Char(body));
                    } else {
                        toks.push(Tok::Str(body));
                    }
                }
                _ => {} // comment
            }
            i = end;
            continue;
        }

        let leading_dot = c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit());
        if c.is_ascii_digit() || leading_dot {
            let (tok, end) = scan_number(&chars, i);
            toks.push(tok);
            i = end;
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            toks.push(Tok::Ident(chars[start..i].iter().collect()));
            continue;
        }

        let mut matched = false;
        for p in table {
            let len = p.chars().count();
            if i + len <= chars.len() && chars[i..i + len].iter().copied().eq(p.chars()) {
                toks.push(Tok::punct(p));
                i += len;
                matched = true;
                break;
            }
        }
        if !matched {
            toks.push(Tok::Punct(c.to_string()));
            i += 1;
        }
    }

    toks
}

fn ends_with_quote(chars: &[char], end: usize, quote: char, count: usize) -> bool {
    (1..=count).all(|k| end >= k && chars[end - k] == quote)
}

fn decode_escapes(raw: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == '\\' && i + 1 < raw.len() {
            let decoded = match raw[i + 1] {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            };
            out.push(decoded);
            i += 2;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    out
}

fn scan_number(chars: &[char], start: usize) -> (Tok, usize) {
    let mut i = start;

    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x') | Some('X')) {
        i += 2;
        let digits_start = i;
        while i < chars.len() && (chars[i].is_ascii_hexdigit() || chars[i] == '_') {
            i += 1;
        }
        let digits: String = chars[digits_start..i].iter().filter(|c| **c != '_').collect();
        i = skip_int_suffix(chars, i);
        return match i64::from_str_radix(&digits, 16) {
            Ok(v) => (Tok::Int(v), i),
            Err(_) => (Tok::Punct(chars[start..i].iter().collect()), i),
        };
    }

    let mut is_float = false;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    let fraction = chars
        .get(i + 1)
        .map_or(true, |c| c.is_ascii_digit() || !c.is_alphabetic());
    if i < chars.len() && chars[i] == '.' && fraction {
        is_float = true;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
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

    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    if i < chars.len() && matches!(chars[i], 'f' | 'F' | 'd' | 'D') {
        is_float = true;
        i += 1;
    } else {
        i = skip_int_suffix(chars, i);
    }

    if is_float {
        match text.parse::<f64>() {
            Ok(v) => (Tok::Float(v), i),
            Err(_) => (Tok::Punct(text), i),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => (Tok::Int(v), i),
            Err(_) => (Tok::Punct(text), i),
        }
    }
}

fn skip_int_suffix(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && matches!(chars[i], 'l' | 'L' | 'u' | 'U') {
        i += 1;
    }
    i
}

/// Index of the token closing the bracket opened at `open`, if balanced
pub fn matching_close(toks: &[Tok], open: usize) -> Option<usize> {
    let (o, c) = match &toks[open] {
        Tok::Punct(p) if p == "(" => ("(", ")"),
        Tok::Punct(p) if p == "[" => ("[", "]"),
        Tok::Punct(p) if p == "{" => ("{", "}"),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, tok) in toks.iter().enumerate().skip(open) {
        if tok.is_punct(o) {
            depth += 1;
        } else if tok.is_punct(c) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Index of the token opening the bracket closed at `close`, if balanced
pub fn matching_open(toks: &[Tok], close: usize) -> Option<usize> {
    let (o, c) = match &toks[close] {
        Tok::Punct(p) if p == ")" => ("(", ")"),
        Tok::Punct(p) if p == "]" => ("[", "]"),
        Tok::Punct(p) if p == "}" => ("{", "}"),
        _ => return None,
    };
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        if toks[i].is_punct(c) {
            depth += 1;
        } else if toks[i].is_punct(o) {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split a token slice on top-level commas
pub fn split_top_level<'a>(toks: &'a [Tok], sep: &str) -> Vec<&'a [Tok]> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, tok) in toks.iter().enumerate() {
        match tok {
            Tok::Punct(p) if p == "(" || p == "[" || p == "{" => depth += 1,
            Tok::Punct(p) if p == ")" || p == "]" || p == "}" => depth -= 1,
            Tok::Punct(p) if p == sep && depth == 0 => {
                parts.push(&toks[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < toks.len() || !parts.is_empty() {
        parts.push(&toks[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_c_family() {
        let toks = tokenize("if (m.count(x) >= 1) { s += \"a\\\"b\"; } // done", Style::CFamily);
        assert!(toks.contains(&Tok::punct(">=")));
        assert!(toks.contains(&Tok::Str("a\"b".into())));
        assert!(!toks.iter().any(|t| t.is_ident("done")));
    }

    #[test]
    fn test_tokenize_char_literal() {
        let toks = tokenize("c == 'a'", Style::CFamily);
        assert_eq!(toks[2], Tok::Char("a".into()));
    }

    #[test]
    fn test_tokenize_python_strings_and_comments() {
        let toks = tokenize("x = 'it' + \"s\"  # note", Style::Python);
        assert_eq!(
            toks,
            vec![
                Tok::ident("x"),
                Tok::punct("="),
                Tok::Str("it".into()),
                Tok::punct("+"),
                Tok::Str("s".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        let toks = tokenize("10L 2.5 1e3 0x1F 1_000 3f", Style::CFamily);
        assert_eq!(
            toks,
            vec![
                Tok::Int(10),
                Tok::Float(2.5),
                Tok::Float(1000.0),
                Tok::Int(31),
                Tok::Int(1000),
                Tok::Float(3.0),
            ]
        );
    }

    #[test]
    fn test_generic_closers_stay_separate() {
        let toks = tokenize("vector<vector<int>> g;", Style::CFamily);
        let closers = toks.iter().filter(|t| t.is_punct(">")).count();
        assert_eq!(closers, 2);
    }

    #[test]
    fn test_strip_comments_keeps_strings() {
        let text = "a = \"//not\"; /* x\ny */ b = 1; // tail";
        let stripped = strip_comments(text, Style::CFamily);
        assert!(stripped.contains("\"//not\""));
        assert!(!stripped.contains("tail"));
        assert_eq!(stripped.matches('\n').count(), 1);
    }

    #[test]
    fn test_matching_brackets() {
        let toks = tokenize("f(a[(1)], b)", Style::CFamily);
        assert_eq!(matching_close(&toks, 1), Some(toks.len() - 1));
        assert_eq!(matching_open(&toks, toks.len() - 1), Some(1));
    }

    #[test]
    fn test_split_top_level() {
        let toks = tokenize("a, f(b, c), [d, e]", Style::Python);
        let parts = split_top_level(&toks, ",");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 6);
    }
}
