/// Source Extractor - isolates the solution method from its boilerplate
///
/// **Responsibility:**
/// Given the submitted text, find the one method the problem expects and
/// return its body plus the declared parameter names, in order.
///
/// **Rules:**
/// - Java/C++: the entry point must be *declared* (name, balanced parameter
///   list, optional qualifiers, then `{`). Calls with the same name are skipped.
/// - Java/C++ bodies are cut with a delimiter-depth scan that ignores braces
///   inside strings, character literals and comments.
/// - Python: the body is every line indented deeper than the `def` line.
/// - Empty source, empty body, or a body that is only `pass`/comments is
///   reported as "no solution provided".
use crate::scan::{self, Style, Tok};
use arbiter_common::types::{Fault, Language};

pub const NO_SOLUTION: &str = "no solution provided";

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    /// Declared type text (`int[]`, `Map<String,Integer>`, `List[int]`) when present
    pub type_hint: Option<String>,
}

/// Method isolated from the submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMethod {
    pub name: String,
    pub language: Language,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub body: String,
}

impl ExtractedMethod {
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }
}

/// Names the entry point may be spelled with (`twoSum` and `two_sum`)
pub fn entry_point_candidates(entry_point: &str) -> Vec<String> {
    let mut names = vec![entry_point.to_string()];
    let snake = to_snake_case(entry_point);
    if snake != entry_point {
        names.push(snake);
    }
    names
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Extract the entry point method from a submission.
///
/// `max_source_bytes` guards against pathological submissions before any scanning.
pub fn extract(
    source: &str,
    language: Language,
    entry_point: &str,
    max_source_bytes: usize,
) -> Result<ExtractedMethod, Fault> {
    if source.trim().is_empty() {
        return Err(Fault::Extraction(NO_SOLUTION.to_string()));
    }
    if source.len() > max_source_bytes {
        return Err(Fault::Extraction(format!(
            "source exceeds maximum size of {} bytes",
            max_source_bytes
        )));
    }

    let candidates = entry_point_candidates(entry_point);
    let extracted = match language {
        Language::Java | Language::Cpp => extract_braced(source, language, &candidates)?,
        Language::Python => extract_python(source, &candidates)?,
    };

    if body_is_empty(&extracted.body, language) {
        return Err(Fault::Extraction(NO_SOLUTION.to_string()));
    }
    Ok(extracted)
}

fn body_is_empty(body: &str, language: Language) -> bool {
    let stripped = scan::strip_comments(body, Style::from(language));
    let meaningful: Vec<&str> = stripped
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    match language {
        Language::Python => meaningful.iter().all(|l| *l == "pass" || *l == "..."),
        Language::Java | Language::Cpp => meaningful.is_empty(),
    }
}

// ── Java / C++ ────────────────────────────────────────────

const QUALIFIERS: &[&str] = &["const", "noexcept", "override", "final", "volatile", "&", "&&"];

fn extract_braced(
    source: &str,
    language: Language,
    candidates: &[String],
) -> Result<ExtractedMethod, Fault> {
    let chars: Vec<char> = source.chars().collect();
    let style = Style::from(language);
    let mut i = 0;

    while i < chars.len() {
        if let Some(end) = scan::skip_literal_or_comment(&chars, i, style) {
            i = end;
            continue;
        }
        if !is_ident_start(chars[i]) || (i > 0 && is_ident_char(chars[i - 1])) {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        let word: String = chars[start..i].iter().collect();
        if !candidates.contains(&word) {
            continue;
        }
        if let Some(method) = try_declaration(&chars, start, i, &word, language, style)? {
            return Ok(method);
        }
    }

    Err(Fault::Extraction(format!(
        "no declaration of method '{}' found",
        candidates[0]
    )))
}

/// `name_start..name_end` covers the candidate name. Returns `None` when this
/// occurrence is not a declaration (a call, a field, a comment mention).
fn try_declaration(
    chars: &[char],
    name_start: usize,
    name_end: usize,
    name: &str,
    language: Language,
    style: Style,
) -> Result<Option<ExtractedMethod>, Fault> {
    let mut j = skip_ws(chars, name_end);
    if chars.get(j) != Some(&'(') {
        return Ok(None);
    }
    let Some(params_close) = balanced_close(chars, j, '(', ')', style) else {
        return Ok(None);
    };
    let params_text: String = chars[j + 1..params_close].iter().collect();
    j = skip_ws(chars, params_close + 1);

    // qualifiers and throws clauses between `)` and `{`
    loop {
        let rest: String = chars[j..chars.len().min(j + 16)].iter().collect();
        if let Some(q) = QUALIFIERS.iter().find(|q| {
            rest.starts_with(**q)
                && !rest[q.len()..].starts_with(|c: char| is_ident_char(c))
        }) {
            j = skip_ws(chars, j + q.len());
            continue;
        }
        if rest.starts_with("throws") {
            j += "throws".len();
            while j < chars.len() && chars[j] != '{' && chars[j] != ';' {
                j += 1;
            }
            continue;
        }
        break;
    }

    if chars.get(j) != Some(&'{') {
        return Ok(None);
    }

    // something must precede the name for it to be a declaration (return type)
    let before: String = chars[..name_start].iter().collect();
    let return_type = declared_return_type(&before);
    if return_type.is_none() {
        return Ok(None);
    }

    let body_close = balanced_close(chars, j, '{', '}', style).ok_or_else(|| {
        Fault::Extraction(format!("unbalanced braces in body of '{}'", name))
    })?;
    let body: String = chars[j + 1..body_close].iter().collect();

    Ok(Some(ExtractedMethod {
        name: name.to_string(),
        language,
        params: parse_params(&params_text, language),
        return_type,
        body,
    }))
}

/// The type tokens in front of a declared method name, after modifiers
fn declared_return_type(before: &str) -> Option<String> {
    let line_start = before
        .rfind(|c| c == ';' || c == '{' || c == '}' || c == ')')
        .map(|p| p + 1)
        .unwrap_or(0);
    let head = before[line_start..].trim();
    if head.is_empty() || head.ends_with('.') || head.ends_with('=') {
        return None;
    }
    const MODIFIERS: &[&str] = &[
        "public", "private", "protected", "static", "final", "virtual", "inline", "synchronized",
        "abstract", "constexpr", "explicit",
    ];
    const NOT_TYPES: &[&str] = &["return", "new", "else", "throw", "case"];
    let mut ty: Vec<&str> = head
        .split_whitespace()
        .filter(|w| !MODIFIERS.contains(w) && !w.starts_with('@'))
        // access specifier labels (`public:`) but not scope qualifiers
        .filter(|w| !(w.ends_with(':') && !w.ends_with("::")))
        .collect();
    if ty.last().is_some_and(|w| NOT_TYPES.contains(w)) {
        return None;
    }
    // out-of-class definition: `int Solution::f(`
    if ty.last().is_some_and(|w| w.ends_with("::")) {
        ty.pop();
    }
    if ty.is_empty() {
        None
    } else {
        Some(ty.join(" "))
    }
}

fn balanced_close(
    chars: &[char],
    open_at: usize,
    open: char,
    close: char,
    style: Style,
) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open_at;
    while i < chars.len() {
        if let Some(end) = scan::skip_literal_or_comment(chars, i, style) {
            i = end;
            continue;
        }
        if chars[i] == open {
            depth += 1;
        } else if chars[i] == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split a parameter list into names and type hints
fn parse_params(text: &str, language: Language) -> Vec<Param> {
    let toks = angle_to_parens(&scan::tokenize(text, Style::from(language)), language);

    scan::split_top_level(&toks, ",")
        .into_iter()
        .filter(|part| !part.is_empty())
        .filter_map(|part| param_from_tokens(part, language))
        .collect()
}

/// Treat `<`/`>` as brackets so `Map<K, V>` stays one parameter
fn angle_to_parens(toks: &[Tok], language: Language) -> Vec<Tok> {
    if language == Language::Python {
        return toks.to_vec();
    }
    toks.iter()
        .map(|t| match t {
            Tok::Punct(p) if p == "<" => Tok::punct("("),
            Tok::Punct(p) if p == ">" => Tok::punct(")"),
            other => other.clone(),
        })
        .collect()
}

fn param_from_tokens(toks: &[Tok], language: Language) -> Option<Param> {
    match language {
        Language::Python => {
            // name[: annotation][= default]
            let name = toks.first()?.as_ident()?.to_string();
            if name == "self" || name == "cls" {
                return None;
            }
            let name = name.trim_start_matches('*').to_string();
            let colon = toks.iter().position(|t| t.is_punct(":"));
            let eq = toks.iter().position(|t| t.is_punct("=")).unwrap_or(toks.len());
            let type_hint = colon.map(|c| render_type(&toks[c + 1..eq.max(c + 1)], false));
            Some(Param { name, type_hint })
        }
        Language::Java | Language::Cpp => {
            // strip trailing `= default` (C++) and array suffix brackets
            let eq = toks.iter().position(|t| t.is_punct("=")).unwrap_or(toks.len());
            let mut decl: Vec<&Tok> = toks[..eq].iter().collect();
            let mut array_suffix = String::new();
            while decl.len() >= 2
                && decl[decl.len() - 1].is_punct("]")
                && decl[decl.len() - 2].is_punct("[")
            {
                decl.truncate(decl.len() - 2);
                array_suffix.push_str("[]");
            }
            let name_pos = decl.iter().rposition(|t| t.as_ident().is_some())?;
            let name = decl[name_pos].as_ident()?.to_string();
            let type_toks: Vec<Tok> = decl[..name_pos]
                .iter()
                .filter(|t| {
                    !(t.is_ident("final")
                        || t.is_ident("const")
                        || t.is_punct("&")
                        || t.is_punct("*")
                        || t.is_punct("&&"))
                })
                .map(|t| (*t).clone())
                .collect();
            let mut type_hint = render_type(&type_toks, true);
            type_hint.push_str(&array_suffix);
            Some(Param {
                name,
                type_hint: (!type_hint.is_empty()).then_some(type_hint),
            })
        }
    }
}

/// `generic` maps the bracket stand-ins from `angle_to_parens` back to `<>`
fn render_type(toks: &[Tok], generic: bool) -> String {
    let mut out = String::new();
    for tok in toks {
        match tok {
            Tok::Punct(p) if generic && p == "(" => out.push('<'),
            Tok::Punct(p) if generic && p == ")" => out.push('>'),
            Tok::Ident(n) => {
                if out.chars().last().is_some_and(is_ident_char) {
                    out.push(' ');
                }
                out.push_str(n);
            }
            Tok::Punct(p) => out.push_str(p),
            Tok::Int(i) => out.push_str(&i.to_string()),
            _ => {}
        }
    }
    out
}

// ── Python ────────────────────────────────────────────────

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn extract_python(source: &str, candidates: &[String]) -> Result<ExtractedMethod, Fault> {
    let code = scan::strip_comments(source, Style::Python);
    let lines: Vec<&str> = code.lines().collect();

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim_start();
        let Some(rest) = trimmed.strip_prefix("def ") else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(name) = candidates.iter().find(|c| {
            rest.starts_with(c.as_str()) && rest[c.len()..].trim_start().starts_with('(')
        }) else {
            continue;
        };

        let def_indent = indent_of(line);

        // header may span lines: join until the colon closing the signature
        let mut header = String::new();
        let mut header_end = idx;
        for (k, l) in lines.iter().enumerate().skip(idx) {
            header.push_str(l.trim());
            header.push(' ');
            header_end = k;
            if header_complete(&header) {
                break;
            }
        }
        let chars: Vec<char> = header.chars().collect();
        let open = header.find('(').map(|b| header[..b].chars().count()).ok_or_else(|| {
            Fault::Extraction(format!("malformed signature for '{}'", name))
        })?;
        let close = balanced_close(&chars, open, '(', ')', Style::Python).ok_or_else(|| {
            Fault::Extraction(format!("unbalanced parentheses in signature of '{}'", name))
        })?;
        let params_text: String = chars[open + 1..close].iter().collect();
        let after: String = chars[close + 1..].iter().collect();
        let after = after.trim();
        let (return_type, inline) = match after.find(':') {
            Some(colon) => {
                let ret = after[..colon].trim().strip_prefix("->").map(|r| r.trim().to_string());
                (ret, after[colon + 1..].trim().to_string())
            }
            None => {
                return Err(Fault::Extraction(format!(
                    "signature of '{}' is missing ':'",
                    name
                )))
            }
        };

        let body = if !inline.is_empty() {
            inline
        } else {
            let mut body_lines: Vec<&str> = Vec::new();
            for l in lines.iter().skip(header_end + 1) {
                if l.trim().is_empty() {
                    body_lines.push("");
                    continue;
                }
                if indent_of(l) <= def_indent {
                    break;
                }
                body_lines.push(l);
            }
            while body_lines.last().is_some_and(|l| l.is_empty()) {
                body_lines.pop();
            }
            dedent(&body_lines)
        };

        return Ok(ExtractedMethod {
            name: name.clone(),
            language: Language::Python,
            params: parse_params(&params_text, Language::Python),
            return_type,
            body,
        });
    }

    Err(Fault::Extraction(format!(
        "no definition of function '{}' found",
        candidates[0]
    )))
}

fn header_complete(header: &str) -> bool {
    let mut depth = 0i32;
    let mut closed = false;
    for c in header.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth == 0 {
                    closed = true;
                }
            }
            ':' if depth == 0 && closed => return true,
            _ => {}
        }
    }
    false
}

fn dedent(lines: &[&str]) -> String {
    let min = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                let expanded = l.replace('\t', "    ");
                expanded.chars().skip(min).collect()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 64 * 1024;

    #[test]
    fn test_java_method_with_nested_braces() {
        let source = r#"
import java.util.*;

class Solution {
    public int[] twoSum(int[] nums, int target) {
        Map<Integer, Integer> seen = new HashMap<>();
        for (int i = 0; i < nums.length; i++) {
            if (seen.containsKey(target - nums[i])) {
                return new int[]{seen.get(target - nums[i]), i};
            }
            seen.put(nums[i], i);
        }
        return new int[]{};
    }
}
"#;
        let m = extract(source, Language::Java, "twoSum", LIMIT).unwrap();
        assert_eq!(m.param_names(), vec!["nums", "target"]);
        assert_eq!(m.params[0].type_hint.as_deref(), Some("int[]"));
        assert_eq!(m.return_type.as_deref(), Some("int[]"));
        assert!(m.body.contains("seen.put(nums[i], i);"));
        assert!(m.body.trim_end().ends_with("return new int[]{};"));
    }

    #[test]
    fn test_braces_inside_strings_and_comments_ignored() {
        let source = r#"
class Solution {
    public String wrap(String s) {
        // a stray } in a comment
        String open = "{";
        char close = '}';
        return open + s + close;
    }
}
"#;
        let m = extract(source, Language::Java, "wrap", LIMIT).unwrap();
        assert!(m.body.contains("return open + s + close;"));
    }

    #[test]
    fn test_call_is_not_a_declaration() {
        let source = r#"
class Solution {
    public int helper(int n) { return solve(n - 1); }
    public int solve(int n) {
        return n;
    }
}
"#;
        let m = extract(source, Language::Java, "solve", LIMIT).unwrap();
        assert_eq!(m.body.trim(), "return n;");
    }

    #[test]
    fn test_cpp_generic_parameters() {
        let source = r#"
#include <vector>
using namespace std;
class Solution {
public:
    vector<int> twoSum(vector<int>& nums, int target) const {
        unordered_map<int, int> seen;
        return {};
    }
};
"#;
        let m = extract(source, Language::Cpp, "twoSum", LIMIT).unwrap();
        assert_eq!(m.param_names(), vec!["nums", "target"]);
        assert_eq!(m.params[0].type_hint.as_deref(), Some("vector<int>"));
        assert_eq!(m.return_type.as_deref(), Some("vector<int>"));
    }

    #[test]
    fn test_cpp_map_parameter_keeps_generic_commas() {
        let source = "int count(map<string, int> m, int k) { return m.size() + k; }";
        let m = extract(source, Language::Cpp, "count", LIMIT).unwrap();
        assert_eq!(m.param_names(), vec!["m", "k"]);
    }

    #[test]
    fn test_python_method() {
        let source = r#"
class Solution:
    def twoSum(self, nums: List[int], target: int) -> List[int]:
        seen = {}
        for i, n in enumerate(nums):
            if target - n in seen:
                return [seen[target - n], i]

            seen[n] = i
        return []

    def other(self):
        return 1
"#;
        let m = extract(source, Language::Python, "twoSum", LIMIT).unwrap();
        assert_eq!(m.param_names(), vec!["nums", "target"]);
        assert_eq!(m.params[0].type_hint.as_deref(), Some("List[int]"));
        assert_eq!(m.return_type.as_deref(), Some("List[int]"));
        assert!(m.body.starts_with("seen = {}"));
        assert!(m.body.contains("\n    if target - n in seen:"));
        assert!(!m.body.contains("other"));
    }

    #[test]
    fn test_python_snake_case_entry_point() {
        let source = "def two_sum(nums, target):\n    return [0, 1]\n";
        let m = extract(source, Language::Python, "twoSum", LIMIT).unwrap();
        assert_eq!(m.name, "two_sum");
    }

    #[test]
    fn test_python_multiline_signature_and_inline_body() {
        let source = "def add(a,\n        b=0):\n    return a + b\n";
        let m = extract(source, Language::Python, "add", LIMIT).unwrap();
        assert_eq!(m.param_names(), vec!["a", "b"]);
        assert_eq!(m.body, "return a + b");

        let inline = "def add(a, b): return a + b";
        let m = extract(inline, Language::Python, "add", LIMIT).unwrap();
        assert_eq!(m.body, "return a + b");
    }

    #[test]
    fn test_empty_source_is_no_solution() {
        for language in Language::ALL {
            assert_eq!(
                extract("   \n", language, "twoSum", LIMIT),
                Err(Fault::Extraction(NO_SOLUTION.to_string()))
            );
        }
    }

    #[test]
    fn test_template_body_is_no_solution() {
        let java =
            "class Solution {\n    public int f(int x) {\n        // your code here\n    }\n}";
        assert_eq!(
            extract(java, Language::Java, "f", LIMIT),
            Err(Fault::Extraction(NO_SOLUTION.to_string()))
        );
        let python = "class Solution:\n    def f(self, x):\n        pass\n";
        assert_eq!(
            extract(python, Language::Python, "f", LIMIT),
            Err(Fault::Extraction(NO_SOLUTION.to_string()))
        );
    }

    #[test]
    fn test_missing_method() {
        let source = "class Solution { int g() { return 1; } }";
        let result = extract(source, Language::Java, "f", LIMIT);
        assert!(matches!(result, Err(Fault::Extraction(msg)) if msg.contains("'f'")));
    }

    #[test]
    fn test_unbalanced_body() {
        let result = extract("int f(int x) { if (x) { return 1; }", Language::Cpp, "f", LIMIT);
        assert!(matches!(result, Err(Fault::Extraction(msg)) if msg.contains("unbalanced")));
    }

    #[test]
    fn test_oversized_source() {
        let source = format!("def f(x):\n    return x\n{}", "#".repeat(100));
        let result = extract(&source, Language::Python, "f", 32);
        assert!(matches!(result, Err(Fault::Extraction(msg)) if msg.contains("maximum size")));
    }
}
