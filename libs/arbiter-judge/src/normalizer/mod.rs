//! Syntax Normalizer - rewrites an extracted method into substrate source
//!
//! **Responsibility:**
//! Turn the body of a Java, C++ or Python method into the brace-structured
//! language the substrate compiles. Container types are erased, accessors
//! and library calls are mapped onto substrate builtins, and literals are
//! unified.
//!
//! **Conservative by construction:**
//! Anything a rewrite table does not know is copied through unchanged and
//! noted in [`NormalizedFunction::untranslated`]. The substrate then rejects
//! it, so an unknown idiom fails loudly instead of passing silently.

mod curly;
mod python;

use crate::extractor::ExtractedMethod;
use crate::scan::Tok;
use crate::substrate::lexer;
use crate::substrate::Dialect;
use arbiter_common::types::Language;

/// Language-agnostic form of a submission, built once per run
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFunction {
    pub name: String,
    /// Other spellings the body may use to recurse (`twoSum` / `two_sum`)
    pub aliases: Vec<String>,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub dialect: Dialect,
    /// Substrate source text of the body
    pub text: String,
    /// Source constructs copied through without a rewrite
    pub untranslated: Vec<String>,
}

pub fn normalize(method: &ExtractedMethod) -> NormalizedFunction {
    let (toks, untranslated) = match method.language {
        Language::Java | Language::Cpp => curly::rewrite(method),
        Language::Python => python::rewrite(method),
    };

    let mut untranslated_dedup: Vec<String> = Vec::new();
    for item in untranslated {
        if !untranslated_dedup.contains(&item) {
            untranslated_dedup.push(item);
        }
    }

    let rename = |name: &str| match method.language {
        Language::Python => python::safe_name(name),
        Language::Java | Language::Cpp => reserved_safe(name),
    };
    let mut aliases = Vec::new();
    for name in crate::extractor::entry_point_candidates(&method.name) {
        if name != method.name {
            aliases.push(name);
        }
    }

    NormalizedFunction {
        name: rename(&method.name),
        aliases,
        params: method.params.iter().map(|p| rename(&p.name)).collect(),
        return_type: method.return_type.clone(),
        dialect: Dialect::for_language(method.language),
        text: render(&toks),
        untranslated: untranslated_dedup,
    }
}

// ── Shared token helpers ──────────────────────────────

/// Substrate keywords a source identifier may collide with
const RESERVED: &[&str] = &["let", "of"];

/// Rename source identifiers that are substrate keywords
pub(crate) fn reserved_safe(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

pub(crate) fn p(sym: &str) -> Tok {
    Tok::punct(sym)
}

pub(crate) fn id(name: &str) -> Tok {
    Tok::ident(name)
}

/// `name(arg0, arg1, ...)`
pub(crate) fn call(name: &str, args: Vec<Vec<Tok>>) -> Vec<Tok> {
    let mut out = vec![id(name), p("(")];
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            out.push(p(","));
        }
        out.extend(arg);
    }
    out.push(p(")"));
    out
}

/// `[a, b, ...]`
pub(crate) fn list(items: Vec<Vec<Tok>>) -> Vec<Tok> {
    let mut out = vec![p("[")];
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(p(","));
        }
        out.extend(item);
    }
    out.push(p("]"));
    out
}

/// `(toks)`
pub(crate) fn group(toks: Vec<Tok>) -> Vec<Tok> {
    let mut out = Vec::with_capacity(toks.len() + 2);
    out.push(p("("));
    out.extend(toks);
    out.push(p(")"));
    out
}

pub(crate) fn int(n: i64) -> Vec<Tok> {
    if n < 0 {
        // keep literals non-negative so `x - -1` never lexes as `--`
        group(vec![p("-"), Tok::Int(n.unsigned_abs().min(i64::MAX as u64) as i64)])
    } else {
        vec![Tok::Int(n)]
    }
}

/// Words that end an operand in the rewritten stream without being one
const NON_OPERAND_WORDS: &[&str] = &["return", "let", "if", "else", "while", "for", "of"];

/// Whether the last emitted token ends an operand, making a following
/// `(` a call and a following `[` an index
pub(crate) fn ends_operand(out: &[Tok]) -> bool {
    match out.last() {
        Some(Tok::Ident(w)) => !NON_OPERAND_WORDS.contains(&w.as_str()),
        Some(t) => t.ends_operand(),
        None => false,
    }
}

/// Start of the postfix expression that ends `out` (the receiver of a
/// method call being rewritten)
pub(crate) fn receiver_start(out: &[Tok]) -> usize {
    let mut i = out.len();
    while i > 0 {
        let last = &out[i - 1];
        if last.is_punct(")") || last.is_punct("]") {
            match crate::scan::matching_open(&out[..i], i - 1) {
                Some(open) => i = open,
                None => break,
            }
            if ends_operand(&out[..i]) {
                continue;
            }
            break;
        }
        if ends_operand(&out[..i]) {
            i -= 1;
        }
        break;
    }
    i
}

/// Detach the receiver from the end of `out`
pub(crate) fn take_receiver(out: &mut Vec<Tok>) -> Vec<Tok> {
    let start = receiver_start(out);
    out.split_off(start)
}

/// Render rewritten tokens as substrate source, one statement per line
pub(crate) fn render(toks: &[Tok]) -> String {
    let mut text = String::new();
    let mut indent = 0usize;
    let mut parens = 0usize;
    // open braces; `true` for blocks, `false` for map literals
    let mut braces: Vec<bool> = Vec::new();
    let mut line_start = true;
    let mut prev: Option<&Tok> = None;

    for tok in toks {
        let opens_block = tok.is_punct("{") && parens == 0 && starts_block(prev);
        let closes_block = tok.is_punct("}") && braces.last().copied().unwrap_or(false);
        if closes_block {
            indent = indent.saturating_sub(1);
            if !line_start {
                text.push('\n');
                line_start = true;
            }
        }
        if line_start {
            text.push_str(&"  ".repeat(indent));
        } else if needs_space(prev, tok) {
            text.push(' ');
        }
        line_start = false;

        match tok {
            Tok::Ident(name) => text.push_str(name),
            Tok::Int(n) => text.push_str(&n.to_string()),
            Tok::Float(f) => text.push_str(&format_float_literal(*f)),
            Tok::Str(s) => text.push_str(&lexer::quote(s)),
            Tok::Char(c) => {
                let mut chars = c.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => text.push_str(&lexer::quote_char(ch)),
                    _ => text.push_str(&lexer::quote(c)),
                }
            }
            Tok::Punct(s) => text.push_str(s),
        }

        match tok {
            Tok::Punct(s) if s == "(" || s == "[" => parens += 1,
            Tok::Punct(s) if s == ")" || s == "]" => parens = parens.saturating_sub(1),
            Tok::Punct(s) if s == "{" => {
                braces.push(opens_block);
                if !opens_block {
                    parens += 1;
                }
            }
            Tok::Punct(s) if s == "}" => {
                if !braces.pop().unwrap_or(true) {
                    parens = parens.saturating_sub(1);
                }
            }
            _ => {}
        }
        if opens_block {
            indent += 1;
            text.push('\n');
            line_start = true;
        } else if (tok.is_punct(";") || closes_block) && parens == 0 {
            text.push('\n');
            line_start = true;
        }
        prev = Some(tok);
    }
    text.trim_end().to_string()
}

/// A `{` after these opens a block rather than a map literal
fn starts_block(prev: Option<&Tok>) -> bool {
    match prev {
        None => true,
        Some(Tok::Punct(s)) => s == ")" || s == ";" || s == "{" || s == "}",
        Some(t) => t.is_ident("else"),
    }
}

fn needs_space(prev: Option<&Tok>, tok: &Tok) -> bool {
    let Some(prev) = prev else {
        return false;
    };
    if matches!(tok, Tok::Punct(s) if [",", ";", ")", "]", "}", ":"].contains(&s.as_str())) {
        return false;
    }
    if matches!(prev, Tok::Punct(s) if s == "(" || s == "[" || s == "{" || s == "!" || s == "~") {
        return false;
    }
    if (tok.is_punct("++") || tok.is_punct("--")) && prev.ends_operand() {
        return matches!(prev, Tok::Ident(w) if NON_OPERAND_WORDS.contains(&w.as_str()));
    }
    if (tok.is_punct("(") || tok.is_punct("[")) && prev.ends_operand() {
        return matches!(prev, Tok::Ident(w) if NON_OPERAND_WORDS.contains(&w.as_str()));
    }
    true
}

fn format_float_literal(f: f64) -> String {
    if f.is_finite() {
        format!("{:?}", f)
    } else {
        // unreachable from source literals; keep the text lexable
        "0.0".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractedMethod, Param};

    fn method(language: Language, params: &[&str], body: &str) -> ExtractedMethod {
        ExtractedMethod {
            name: "solve".into(),
            language,
            params: params
                .iter()
                .map(|n| Param {
                    name: n.to_string(),
                    type_hint: None,
                })
                .collect(),
            return_type: None,
            body: body.into(),
        }
    }

    #[test]
    fn test_receiver_start() {
        let toks = crate::scan::tokenize("x = a[i](b).c", crate::scan::Style::CFamily);
        // up to the `.`
        let out = &toks[..toks.len() - 2];
        assert_eq!(receiver_start(out), 2);
        let toks = crate::scan::tokenize("return (a + b)", crate::scan::Style::CFamily);
        assert_eq!(receiver_start(&toks), 1);
    }

    #[test]
    fn test_render_layout() {
        let toks = crate::scan::tokenize(
            "if (a) { x = f(1, [2]); } return -x;",
            crate::scan::Style::CFamily,
        );
        assert_eq!(render(&toks), "if (a) {\n  x = f(1, [2]);\n}\nreturn - x;");
    }

    #[test]
    fn test_render_map_literal_inline() {
        let toks = crate::scan::tokenize(
            "let m = {}; let n = {1: 2}; i++;",
            crate::scan::Style::CFamily,
        );
        assert_eq!(render(&toks), "let m = {};\nlet n = {1: 2};\ni++;");
    }

    #[test]
    fn test_negative_int_is_grouped() {
        assert_eq!(render(&int(-5)), "(- 5)");
    }

    #[test]
    fn test_reserved_names_renamed() {
        let m = method(Language::Python, &["of"], "let = of\nreturn let");
        let normalized = normalize(&m);
        assert_eq!(normalized.params, vec!["of_".to_string()]);
        assert!(normalized.text.contains("let_ = of_"));
    }

    #[test]
    fn test_dialect_follows_language() {
        assert_eq!(normalize(&method(Language::Cpp, &[], "return 1;")).dialect, Dialect::CFamily);
        assert_eq!(normalize(&method(Language::Python, &[], "return 1")).dialect, Dialect::Python);
    }
}
