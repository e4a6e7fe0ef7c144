//! Python rewrite tables
//!
//! The body is first cut into logical lines (bracket continuations and
//! trailing backslashes joined), then the indentation stack is turned into
//! braces. Expressions are rewritten by precedence level for the keyword
//! operators (`if`/`else`, `or`, `and`, `not`, `in`) and token by token
//! below that.
//!
//! Comprehensions are hoisted into loops that run just before the statement
//! using them. Where that would change evaluation order (inside `while` or
//! `elif` conditions, or the lazy side of `and`/`or`/ternaries) they are
//! left untranslated.

use super::{call, group, id, int, list, p, take_receiver};
use crate::extractor::ExtractedMethod;
use crate::scan::{self, matching_close, split_top_level, Style, Tok};

/// Python names that collide with substrate keywords
const RESERVED: &[&str] = &["let", "of", "null", "true", "false"];

pub(super) fn safe_name(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// Functions whose name and argument order are the same in the substrate
const SAME_NAME: &[&str] = &[
    "len", "abs", "min", "max", "sum", "range", "zip", "str", "int", "float", "ord", "chr", "print",
    "pow", "reversed", "any", "all",
];

struct Line {
    indent: usize,
    toks: Vec<Tok>,
}

/// Split dedented source into logical lines
fn logical_lines(body: &str) -> Vec<Line> {
    let chars: Vec<char> = body.chars().collect();
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut indent: Option<usize> = None;
    let mut depth = 0i32;
    let mut column = 0usize;
    let mut i = 0;

    let mut flush = |current: &mut String, indent: &mut Option<usize>| {
        let toks = scan::tokenize(current, Style::Python);
        if !toks.is_empty() {
            lines.push(Line {
                indent: indent.unwrap_or(0),
                toks,
            });
        }
        current.clear();
        *indent = None;
    };

    while i < chars.len() {
        let c = chars[i];
        if indent.is_none() {
            if c == ' ' || c == '\t' {
                column += if c == '\t' { 4 } else { 1 };
                i += 1;
                continue;
            }
            if c == '\n' {
                column = 0;
                i += 1;
                continue;
            }
            indent = Some(column);
        }
        if let Some(end) = scan::skip_literal_or_comment(&chars, i, Style::Python) {
            if c == '#' {
                i = end;
                continue;
            }
            current.extend(&chars[i..end]);
            i = end;
            continue;
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '\\' if chars.get(i + 1) == Some(&'\n') => {
                current.push(' ');
                i += 2;
                continue;
            }
            '\n' if depth <= 0 => {
                flush(&mut current, &mut indent);
                depth = 0;
                column = 0;
                i += 1;
                continue;
            }
            '\n' => {
                current.push(' ');
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    flush(&mut current, &mut indent);
    lines
}

/// Position of the first top-level identifier `word` at or after `from`
fn find_word(toks: &[Tok], word: &str, from: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in toks.iter().enumerate() {
        match tok {
            Tok::Punct(s) if s == "(" || s == "[" || s == "{" => depth += 1,
            Tok::Punct(s) if s == ")" || s == "]" || s == "}" => depth -= 1,
            Tok::Ident(w) if w == word && depth == 0 && i >= from => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_word<'a>(toks: &'a [Tok], word: &str) -> Vec<&'a [Tok]> {
    let mut parts = Vec::new();
    let mut start = 0;
    while let Some(k) = find_word(toks, word, start) {
        parts.push(&toks[start..k]);
        start = k + 1;
    }
    parts.push(&toks[start..]);
    parts
}

/// Index of the first top-level `sym` punctuation
fn find_punct(toks: &[Tok], sym: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, tok) in toks.iter().enumerate() {
        match tok {
            Tok::Punct(s) if s == "(" || s == "[" || s == "{" => depth += 1,
            Tok::Punct(s) if s == ")" || s == "]" || s == "}" => depth -= 1,
            Tok::Punct(s) if s == sym && depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn has_top_level_comma(toks: &[Tok]) -> bool {
    find_punct(toks, ",").is_some()
}

const AUGMENTED: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "**=", "&=", "|=", "^=", "<<=", ">>=",
];

pub(super) fn rewrite(method: &ExtractedMethod) -> (Vec<Tok>, Vec<String>) {
    let mut rewriter = Rewriter {
        untranslated: Vec::new(),
        hoisted: Vec::new(),
        hoist_ok: false,
        temps: 0,
    };
    let out = rewriter.body(&logical_lines(&method.body));
    (out, rewriter.untranslated)
}

struct Rewriter {
    untranslated: Vec<String>,
    /// Statements that must run before the one being rewritten
    hoisted: Vec<Tok>,
    /// Whether a comprehension met now may be hoisted
    hoist_ok: bool,
    temps: usize,
}

impl Rewriter {
    fn note(&mut self, what: impl Into<String>) {
        self.untranslated.push(what.into());
    }

    fn temp(&mut self) -> String {
        let name = format!("_comp{}", self.temps);
        self.temps += 1;
        name
    }

    /// Run `f` with hoisting set to `allowed`, collecting what it hoists
    fn scoped<T>(&mut self, allowed: bool, f: impl FnOnce(&mut Self) -> T) -> (Vec<Tok>, T) {
        let saved = std::mem::take(&mut self.hoisted);
        let saved_ok = std::mem::replace(&mut self.hoist_ok, allowed);
        let value = f(self);
        self.hoist_ok = saved_ok;
        (std::mem::replace(&mut self.hoisted, saved), value)
    }

    /// Evaluate `f` where hoisting is not allowed, keeping the enclosing hoists
    fn lazily<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved_ok = std::mem::replace(&mut self.hoist_ok, false);
        let value = f(self);
        self.hoist_ok = saved_ok;
        value
    }

    // ── Blocks ─────────────────────────────────────────────

    fn body(&mut self, lines: &[Line]) -> Vec<Tok> {
        let mut out = Vec::new();
        // indentation of each open suite
        let mut suites: Vec<usize> = vec![lines.first().map_or(0, |l| l.indent)];
        let mut header_open = false;

        for line in lines {
            if header_open {
                header_open = false;
                let top = suites.last().copied().unwrap_or(0);
                if line.indent > top {
                    suites.push(line.indent);
                } else {
                    // header with an empty suite
                    out.push(p("}"));
                }
            }
            while suites.len() > 1 && line.indent < suites.last().copied().unwrap_or(0) {
                suites.pop();
                out.push(p("}"));
            }
            header_open = self.line(&line.toks, &mut out);
        }
        if header_open {
            out.push(p("}"));
        }
        for _ in 1..suites.len() {
            out.push(p("}"));
        }
        out
    }

    /// Rewrite one logical line; returns whether it opened a suite on the next line
    fn line(&mut self, toks: &[Tok], out: &mut Vec<Tok>) -> bool {
        let Some(keyword) = toks.first().and_then(Tok::as_ident) else {
            self.simple_line(toks, out);
            return false;
        };
        let compound = matches!(
            keyword,
            "if"
                | "elif"
                | "else"
                | "while"
                | "for"
                | "try"
                | "except"
                | "finally"
                | "with"
                | "def"
                | "class"
        );
        if !compound {
            self.simple_line(toks, out);
            return false;
        }
        let Some(colon) = find_punct(toks, ":") else {
            self.note(format!("'{}' header", keyword));
            out.extend(toks.iter().cloned());
            out.push(p(";"));
            return false;
        };
        let head = &toks[1..colon];
        let suite = &toks[colon + 1..];

        let mut header = Vec::new();
        match keyword {
            "if" => {
                let (hoisted, cond) = self.scoped(true, |r| r.test(head));
                out.extend(hoisted);
                header.push(id("if"));
                header.extend(group(cond));
            }
            "elif" => {
                let cond = self.lazily(|r| r.test(head));
                header.extend([id("else"), id("if")]);
                header.extend(group(cond));
            }
            "else" => header.push(id("else")),
            "while" => {
                let cond = self.lazily(|r| r.test(head));
                header.push(id("while"));
                header.extend(group(cond));
            }
            "for" => {
                let Some(k) = find_word(head, "in", 0) else {
                    self.note("'for' header");
                    header.extend(toks[..colon].iter().cloned());
                    return self.open_suite(header, suite, out);
                };
                let target = self.target(&head[..k]);
                let (hoisted, iterable) = self.scoped(true, |r| r.expr(&head[k + 1..]));
                out.extend(hoisted);
                let mut inner = target;
                inner.push(id("of"));
                inner.extend(iterable);
                header.push(id("for"));
                header.extend(group(inner));
            }
            "try" | "finally" => {
                self.note(format!("'{}' statement", keyword));
            }
            "except" => {
                // handlers never run; an exception in the try suite faults
                self.note("'except' clause");
                header.extend([id("if"), p("("), id("false"), p(")")]);
            }
            _ => {
                self.note(format!("'{}' statement", keyword));
                header.extend(toks[..colon].iter().cloned());
            }
        }
        self.open_suite(header, suite, out)
    }

    fn open_suite(&mut self, header: Vec<Tok>, suite: &[Tok], out: &mut Vec<Tok>) -> bool {
        out.extend(header);
        out.push(p("{"));
        if suite.is_empty() {
            return true;
        }
        self.simple_line(suite, out);
        out.push(p("}"));
        false
    }

    // ── Simple statements ──────────────────────────────────

    fn simple_line(&mut self, toks: &[Tok], out: &mut Vec<Tok>) {
        for stmt in split_top_level(toks, ";") {
            if stmt.is_empty() {
                continue;
            }
            let (hoisted, rewritten) = self.scoped(true, |r| r.simple(stmt));
            out.extend(hoisted);
            out.extend(rewritten);
        }
    }

    fn simple(&mut self, stmt: &[Tok]) -> Vec<Tok> {
        let mut out = Vec::new();
        let first = stmt.first().and_then(Tok::as_ident).unwrap_or("");
        match first {
            "pass" => {
                out.push(p(";"));
                return out;
            }
            "break" | "continue" => {
                out.extend([id(first), p(";")]);
                return out;
            }
            "return" => {
                out.push(id("return"));
                if stmt.len() > 1 {
                    out.extend(self.expr(&stmt[1..]));
                }
                out.push(p(";"));
                return out;
            }
            "del" => {
                for target in split_top_level(&stmt[1..], ",") {
                    match self.del_target(target) {
                        Some(removal) => out.extend(removal),
                        None => {
                            self.note("'del' statement");
                            out.extend(target.iter().cloned());
                        }
                    }
                    out.push(p(";"));
                }
                return out;
            }
            "raise" => {
                let what = stmt[1..].iter().find_map(Tok::as_ident).unwrap_or("exception");
                out.extend(call("fail", vec![vec![Tok::Str(what.to_string())]]));
                out.push(p(";"));
                return out;
            }
            "assert" => {
                let cond = match find_punct(stmt, ",") {
                    Some(k) => &stmt[1..k],
                    None => &stmt[1..],
                };
                let cond = self.test(cond);
                out.extend([id("if"), p("("), p("!")]);
                out.extend(group(cond));
                out.extend([p(")"), p("{")]);
                out.extend(call("fail", vec![vec![Tok::Str("AssertionError".into())]]));
                out.extend([p(";"), p("}")]);
                return out;
            }
            "global" | "nonlocal" | "import" | "from" => {
                self.note(format!("'{}' statement", first));
                out.push(p(";"));
                return out;
            }
            _ => {}
        }

        if let Some(k) = stmt.iter().position(|t| AUGMENTED.iter().any(|op| t.is_punct(op))) {
            let target = self.target(&stmt[..k]);
            let value = self.expr(&stmt[k + 1..]);
            out.extend(target);
            out.push(stmt[k].clone());
            out.extend(value);
            out.push(p(";"));
            return out;
        }

        let parts = split_top_level(stmt, "=");
        if parts.len() == 1 {
            // bare annotation `x: int` declares nothing
            if matches!(stmt.first(), Some(Tok::Ident(_)))
                && stmt.get(1).is_some_and(|t| t.is_punct(":"))
            {
                out.push(p(";"));
                return out;
            }
            out.extend(self.expr(stmt));
            out.push(p(";"));
            return out;
        }

        let value = self.expr(parts[parts.len() - 1]);
        let targets: Vec<Vec<Tok>> = parts[..parts.len() - 1]
            .iter()
            .map(|t| {
                // `x: int = 0`
                let t = match find_punct(t, ":") {
                    Some(k) if k > 0 => &t[..k],
                    _ => t,
                };
                self.target(t)
            })
            .collect();
        let last = targets.len() - 1;
        out.extend(targets[last].clone());
        out.push(p("="));
        out.extend(value);
        out.push(p(";"));
        // `a = b = v` binds every target to the same value
        for target in targets[..last].iter().rev() {
            out.extend(target.clone());
            out.push(p("="));
            out.extend(targets[last].clone());
            out.push(p(";"));
        }
        out
    }

    /// `del d[k]` and `del a[i]`
    fn del_target(&mut self, target: &[Tok]) -> Option<Vec<Tok>> {
        if !target.last()?.is_punct("]") {
            return None;
        }
        let open = scan::matching_open(target, target.len() - 1)?;
        if open == 0 || find_punct(&target[open + 1..target.len() - 1], ":").is_some() {
            return None;
        }
        let container = self.expr(&target[..open]);
        let key = self.expr(&target[open + 1..target.len() - 1]);
        Some(call("remove", vec![container, key]))
    }

    /// Assignment and loop targets; tuples become list patterns
    fn target(&mut self, toks: &[Tok]) -> Vec<Tok> {
        let parts: Vec<&[Tok]> =
            split_top_level(toks, ",").into_iter().filter(|t| !t.is_empty()).collect();
        if parts.len() > 1 || has_top_level_comma(toks) {
            let items = parts.into_iter().map(|t| self.target(t)).collect();
            return list(items);
        }
        let Some(part) = parts.first() else {
            return Vec::new();
        };
        let bracketed = part.len() >= 2
            && (part[0].is_punct("(") || part[0].is_punct("["))
            && matching_close(part, 0) == Some(part.len() - 1);
        if bracketed {
            let inner = &part[1..part.len() - 1];
            let items = split_top_level(inner, ",")
                .into_iter()
                .filter(|t| !t.is_empty())
                .map(|t| self.target(t))
                .collect();
            return list(items);
        }
        // a starred target has no counterpart
        if part.first().is_some_and(|t| t.is_punct("*")) {
            self.note("starred assignment");
        }
        self.expr(part)
    }

    // ── Expressions by precedence ──────────────────────────

    /// Expression list; a top-level comma makes a tuple
    fn expr(&mut self, toks: &[Tok]) -> Vec<Tok> {
        if has_top_level_comma(toks) {
            let items = split_top_level(toks, ",")
                .into_iter()
                .filter(|t| !t.is_empty())
                .map(|t| self.test(t))
                .collect();
            return list(items);
        }
        self.test(toks)
    }

    /// Conditional expression
    fn test(&mut self, toks: &[Tok]) -> Vec<Tok> {
        if toks.first().is_some_and(|t| t.is_ident("lambda")) {
            self.note("lambda expression");
            return toks.to_vec();
        }
        if let Some(q) = find_word(toks, "if", 1) {
            if let Some(e) = find_word(toks, "else", q + 1) {
                let cond = self.or_test(&toks[q + 1..e]);
                let (then, otherwise) =
                    self.lazily(|r| (r.or_test(&toks[..q]), r.test(&toks[e + 1..])));
                let mut inner = cond;
                inner.push(p("?"));
                inner.extend(then);
                inner.push(p(":"));
                inner.extend(otherwise);
                return group(inner);
            }
        }
        self.or_test(toks)
    }

    fn or_test(&mut self, toks: &[Tok]) -> Vec<Tok> {
        self.boolean_chain(toks, "or", "||", Self::and_test)
    }

    fn and_test(&mut self, toks: &[Tok]) -> Vec<Tok> {
        self.boolean_chain(toks, "and", "&&", Self::not_test)
    }

    fn boolean_chain(
        &mut self,
        toks: &[Tok],
        word: &str,
        op: &str,
        operand: fn(&mut Self, &[Tok]) -> Vec<Tok>,
    ) -> Vec<Tok> {
        let parts = split_word(toks, word);
        let mut out = operand(self, parts[0]);
        for part in &parts[1..] {
            out.push(p(op));
            let rhs = self.lazily(|r| operand(r, part));
            out.extend(rhs);
        }
        out
    }

    fn not_test(&mut self, toks: &[Tok]) -> Vec<Tok> {
        if toks.first().is_some_and(|t| t.is_ident("not")) {
            let mut out = vec![p("!")];
            out.extend(group(self.not_test(&toks[1..])));
            return out;
        }
        self.comparison(toks)
    }

    /// `in` and `not in` become membership calls
    fn comparison(&mut self, toks: &[Tok]) -> Vec<Tok> {
        let Some(k) = find_word(toks, "in", 1) else {
            return self.atoms(toks);
        };
        let negated = toks[k - 1].is_ident("not");
        let left_end = if negated { k - 1 } else { k };
        let needle = self.atoms(&toks[..left_end]);
        let haystack = self.comparison(&toks[k + 1..]);
        let membership = call("has", vec![haystack, needle]);
        if negated {
            let mut out = vec![p("!")];
            out.extend(membership);
            out
        } else {
            membership
        }
    }

    // ── Atoms ──────────────────────────────────────────────

    fn atoms(&mut self, toks: &[Tok]) -> Vec<Tok> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < toks.len() {
            i = self.atom(toks, i, &mut out);
        }
        out
    }

    fn atom(&mut self, toks: &[Tok], i: usize, out: &mut Vec<Tok>) -> usize {
        match &toks[i] {
            Tok::Ident(_) => self.name(toks, i, out),
            Tok::Punct(s) if s == "." => self.attribute(toks, i, out),
            Tok::Punct(s) if s == "(" => {
                let Some(close) = matching_close(toks, i) else {
                    out.push(toks[i].clone());
                    return i + 1;
                };
                let inner = &toks[i + 1..close];
                if super::ends_operand(out) {
                    // call on an expression result
                    let args = self.arguments(inner);
                    out.extend(group(join_args(args)));
                } else if find_word(inner, "for", 1).is_some() {
                    out.extend(self.comprehension(inner, Collect::List));
                } else if inner.is_empty() {
                    out.extend(list(Vec::new()));
                } else if has_top_level_comma(inner) {
                    out.extend(self.expr(inner));
                } else {
                    out.extend(group(self.test(inner)));
                }
                close + 1
            }
            Tok::Punct(s) if s == "[" => {
                let Some(close) = matching_close(toks, i) else {
                    out.push(toks[i].clone());
                    return i + 1;
                };
                let inner = &toks[i + 1..close];
                if super::ends_operand(out) {
                    self.subscript(inner, out);
                } else if find_word(inner, "for", 1).is_some() {
                    out.extend(self.comprehension(inner, Collect::List));
                } else {
                    let items = split_top_level(inner, ",")
                        .into_iter()
                        .filter(|t| !t.is_empty())
                        .map(|t| self.test(t))
                        .collect();
                    out.extend(list(items));
                }
                close + 1
            }
            Tok::Punct(s) if s == "{" => {
                let Some(close) = matching_close(toks, i) else {
                    out.push(toks[i].clone());
                    return i + 1;
                };
                let inner = &toks[i + 1..close];
                out.extend(self.braces(inner));
                close + 1
            }
            Tok::Str(_) if out.last().is_some_and(|t| matches!(t, Tok::Str(_))) => {
                // implicit concatenation of adjacent literals
                if let (Some(Tok::Str(prev)), Tok::Str(next)) = (out.last_mut(), &toks[i]) {
                    prev.push_str(next);
                }
                i + 1
            }
            tok => {
                out.push(tok.clone());
                i + 1
            }
        }
    }

    fn name(&mut self, toks: &[Tok], i: usize, out: &mut Vec<Tok>) -> usize {
        let Some(word) = toks[i].as_ident() else {
            return i + 1;
        };
        let next = toks.get(i + 1);
        let next_is = |s: &str| next.is_some_and(|t| t.is_punct(s));

        match word {
            "True" => out.push(id("true")),
            "False" => out.push(id("false")),
            "None" => out.push(id("null")),
            "is" => {
                if next.is_some_and(|t| t.is_ident("not")) {
                    out.push(p("!="));
                    return i + 2;
                }
                out.push(p("=="));
            }
            "not" => {
                // `a == not b` is not Python; only reached inside malformed input
                out.push(p("!"));
            }
            "self" if next_is(".") => {
                if toks.get(i + 3).is_some_and(|t| t.is_punct("(")) {
                    self.note("method call on self");
                }
                return i + 2;
            }
            "f" | "F" | "rf" | "fr" if matches!(next, Some(Tok::Str(_))) => {
                if let Some(Tok::Str(text)) = next {
                    let formatted = self.format_string(text);
                    out.extend(formatted);
                }
                return i + 2;
            }
            "lambda" => {
                self.note("lambda expression");
                out.push(toks[i].clone());
            }
            "math" | "heapq" | "collections" | "sys" | "string" if next_is(".") => {
                return self.module_member(toks, i, out);
            }
            _ if next_is("(") => {
                let Some(close) = matching_close(toks, i + 1) else {
                    out.push(id(&safe_name(word)));
                    return i + 1;
                };
                let inner = &toks[i + 2..close];
                let rewritten = self.function(word, inner);
                out.extend(rewritten);
                return close + 1;
            }
            _ => out.push(id(&safe_name(word))),
        }
        i + 1
    }

    /// `math.sqrt(x)`, `math.inf`, `heapq.heappush(h, x)`, `sys.maxsize`
    fn module_member(&mut self, toks: &[Tok], i: usize, out: &mut Vec<Tok>) -> usize {
        let module = toks[i].as_ident().unwrap_or_default();
        let Some(member) = toks.get(i + 2).and_then(Tok::as_ident) else {
            out.push(toks[i].clone());
            return i + 1;
        };
        let constant = match (module, member) {
            ("math", "inf") => Some(call("float", vec![vec![Tok::Str("inf".into())]])),
            ("math", "pi") => Some(vec![Tok::Float(std::f64::consts::PI)]),
            ("math", "e") => Some(vec![Tok::Float(std::f64::consts::E)]),
            ("sys", "maxsize") => Some(int(i64::MAX)),
            ("string", "ascii_lowercase") => {
                Some(vec![Tok::Str("abcdefghijklmnopqrstuvwxyz".into())])
            }
            ("string", "ascii_uppercase") => {
                Some(vec![Tok::Str("ABCDEFGHIJKLMNOPQRSTUVWXYZ".into())])
            }
            ("string", "digits") => Some(vec![Tok::Str("0123456789".into())]),
            _ => None,
        };
        if let Some(value) = constant {
            out.extend(value);
            return i + 3;
        }
        if module == "collections" {
            // `collections.deque(..)` is `deque(..)`
            return i + 2;
        }
        if !toks.get(i + 3).is_some_and(|t| t.is_punct("(")) {
            self.note(format!("{}.{}", module, member));
            out.push(toks[i].clone());
            return i + 1;
        }
        let Some(close) = matching_close(toks, i + 3) else {
            out.push(toks[i].clone());
            return i + 1;
        };
        let args = self.arguments(&toks[i + 4..close]);
        let rewritten = match (module, member, args.as_slice()) {
            ("math", "sqrt" | "floor" | "ceil" | "gcd" | "pow" | "log", _) => {
                Some(call(member, args.clone()))
            }
            ("math", "fabs", [_]) => Some(call("abs", args.clone())),
            ("math", "isqrt", [x]) => Some(call("int", vec![call("sqrt", vec![x.clone()])])),
            ("math", "log2", [x]) => Some(call("log", vec![x.clone(), int(2)])),
            ("math", "log10", [x]) => Some(call("log", vec![x.clone(), int(10)])),
            ("math", "comb" | "factorial" | "perm", _) => None,
            ("heapq", "heappush", [_, _]) => Some(call("heap_push", args.clone())),
            ("heapq", "heappop", [_]) => Some(call("heap_pop", args.clone())),
            ("heapq", "heapify", [_]) => Some(call("heapify", args.clone())),
            ("heapq", "nlargest", [k, items]) => {
                let sorted = call("sorted", vec![items.clone(), vec![id("true")]]);
                Some(call("slice", vec![sorted, vec![id("null")], k.clone()]))
            }
            ("heapq", "nsmallest", [k, items]) => {
                let sorted = call("sorted", vec![items.clone()]);
                Some(call("slice", vec![sorted, vec![id("null")], k.clone()]))
            }
            _ => None,
        };
        match rewritten {
            Some(t) => out.extend(t),
            None => {
                self.note(format!("{}.{}", module, member));
                out.push(id(member));
                out.extend(group(join_args(args)));
            }
        }
        close + 1
    }

    /// Positional arguments; keyword arguments are reported and dropped
    fn arguments(&mut self, inner: &[Tok]) -> Vec<Vec<Tok>> {
        let (positional, keywords) = self.split_call_args(inner);
        for (name, _) in keywords {
            self.note(format!("keyword argument '{}'", name));
        }
        positional
    }

    fn split_call_args(&mut self, inner: &[Tok]) -> (Vec<Vec<Tok>>, Vec<(String, Vec<Tok>)>) {
        if find_word(inner, "for", 1).is_some() && !has_top_level_comma(inner) {
            // lone generator argument
            return (vec![self.comprehension(inner, Collect::List)], Vec::new());
        }
        let mut positional = Vec::new();
        let mut keywords = Vec::new();
        for part in split_top_level(inner, ",") {
            match part {
                [] => {}
                [Tok::Ident(name), eq, value @ ..] if eq.is_punct("=") => {
                    let value = self.test(value);
                    keywords.push((name.clone(), value));
                }
                [star, ..] if star.is_punct("*") || star.is_punct("**") => {
                    self.note("unpacked argument");
                    positional.push(self.test(part));
                }
                _ => positional.push(self.test(part)),
            }
        }
        (positional, keywords)
    }

    /// Free function calls by name
    fn function(&mut self, name: &str, inner: &[Tok]) -> Vec<Tok> {
        let (args, keywords) = self.split_call_args(inner);
        let keyword = |k: &str| keywords.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone());
        let reverse = keyword("reverse");
        let known_keywords: &[&str] = match name {
            "sorted" => &["reverse"],
            "print" => &["end", "sep", "flush"],
            "enumerate" => &["start"],
            _ => &[],
        };
        for (k, _) in &keywords {
            if !known_keywords.contains(&k.as_str()) {
                self.note(format!("keyword argument '{}'", k));
            }
        }

        match (name, args.as_slice()) {
            ("sorted", [_]) => {
                let mut a = args.clone();
                a.extend(reverse);
                call("sorted", a)
            }
            ("enumerate", [items]) => match keyword("start") {
                Some(start) => call("enumerate", vec![items.clone(), start]),
                None => call("enumerate", args.clone()),
            },
            ("round", [_, _]) => {
                self.note("round with digits");
                call("round", args.clone())
            }
            ("divmod", [a, b]) => {
                let mut q = group(a.clone());
                q.push(p("//"));
                q.extend(group(b.clone()));
                let mut r = group(a.clone());
                r.push(p("%"));
                r.extend(group(b.clone()));
                list(vec![q, r])
            }
            ("list" | "tuple", []) => list(Vec::new()),
            ("list" | "tuple", [_]) => call("to_list", args.clone()),
            ("set" | "frozenset", []) => call("new_set", Vec::new()),
            ("set" | "frozenset", [_]) => call("to_set", args.clone()),
            ("dict" | "OrderedDict", []) => vec![p("{"), p("}")],
            ("dict" | "OrderedDict", [_]) => call("copy", args.clone()),
            ("bool", [x]) => {
                let mut t = vec![p("!"), p("!")];
                t.extend(group(x.clone()));
                group(t)
            }
            ("deque", []) => list(Vec::new()),
            ("deque", [_]) => call("to_list", args.clone()),
            ("defaultdict", [factory]) => match default_for_factory(factory) {
                Some(default) => call("new_map", vec![default]),
                None => {
                    self.note("defaultdict factory");
                    call("new_map", vec![vec![id("null")]])
                }
            },
            ("defaultdict", []) => vec![p("{"), p("}")],
            ("Counter", []) => call("new_map", vec![int(0)]),
            ("Counter", [items]) => self.counter(items.clone()),
            (n, _) if SAME_NAME.contains(&n) => call(n, args.clone()),
            (
                "isinstance" | "map" | "filter" | "iter" | "next" | "hash" | "id" | "type" | "input"
                | "open",
                _,
            ) => {
                self.note(format!("function '{}'", name));
                call(name, args.clone())
            }
            // recursion or an unknown helper; the substrate decides
            _ => call(&safe_name(name), args.clone()),
        }
    }

    /// `Counter(items)` is counted by a hoisted loop
    fn counter(&mut self, items: Vec<Tok>) -> Vec<Tok> {
        if !self.hoist_ok {
            self.note("Counter construction");
            return call("Counter", vec![items]);
        }
        let acc = self.temp();
        let item = format!("{}_item", acc);
        let h = &mut self.hoisted;
        h.extend([id(&acc), p("=")]);
        h.extend(call("new_map", vec![int(0)]));
        h.push(p(";"));
        h.extend([id("for"), p("("), id(&item), id("of")]);
        h.extend(items);
        h.extend([p(")"), p("{"), id(&acc), p("["), id(&item), p("]")]);
        h.extend([p("+="), Tok::Int(1), p(";"), p("}")]);
        vec![id(&acc)]
    }

    /// `.name(...)` method calls and `.attr` accesses on the operand before
    fn attribute(&mut self, toks: &[Tok], i: usize, out: &mut Vec<Tok>) -> usize {
        let Some(name) = toks.get(i + 1).and_then(Tok::as_ident) else {
            out.push(toks[i].clone());
            return i + 1;
        };
        let recv = take_receiver(out);
        if !toks.get(i + 2).is_some_and(|t| t.is_punct("(")) {
            self.note(format!("attribute '{}'", name));
            out.extend(recv);
            out.push(toks[i].clone());
            out.push(toks[i + 1].clone());
            return i + 2;
        }
        let Some(close) = matching_close(toks, i + 2) else {
            out.extend(recv);
            out.push(toks[i].clone());
            return i + 1;
        };
        let (args, keywords) = self.split_call_args(&toks[i + 3..close]);
        match self.method(name, recv.clone(), &args, &keywords) {
            Some(rewritten) => out.extend(rewritten),
            None => {
                self.note(format!("method '{}'", name));
                out.extend(recv);
                out.extend([p("."), id(name)]);
                out.extend(group(join_args(args)));
            }
        }
        close + 1
    }

    fn method(
        &mut self,
        name: &str,
        r: Vec<Tok>,
        a: &[Vec<Tok>],
        keywords: &[(String, Vec<Tok>)],
    ) -> Option<Vec<Tok>> {
        let with = |builtin: &str, extra: &[Vec<Tok>]| {
            let mut args = vec![r.clone()];
            args.extend(extra.iter().cloned());
            call(builtin, args)
        };
        if name == "sort" {
            let mut extra = Vec::new();
            for (k, v) in keywords {
                if k == "reverse" {
                    extra.push(v.clone());
                } else {
                    return None;
                }
            }
            return a.is_empty().then(|| with("sort", &extra));
        }
        if !keywords.is_empty() {
            return None;
        }
        Some(match (name, a) {
            ("append", [_]) => with("push", a),
            ("appendleft", [_]) => with("unshift", a),
            ("popleft", []) => with("shift", &[]),
            ("pop", [] | [_] | [_, _]) => with("pop", a),
            ("extend" | "update", [_]) => with("extend", a),
            ("insert", [_, _]) => with("insert", a),
            ("remove" | "discard", [_]) => with("remove_value", a),
            ("add", [_]) => with("add", a),
            ("clear", []) => with("clear", &[]),
            ("copy", []) => with("copy", &[]),
            ("index" | "find", [_] | [_, _]) => with("index_of", a),
            ("rfind", [_]) => with("last_index_of", a),
            ("count", [_]) => with("count", a),
            ("reverse", []) => with("reverse", &[]),
            ("get", [_] | [_, _]) => with("get", a),
            ("keys", []) => with("keys", &[]),
            ("values", []) => with("values", &[]),
            ("items", []) => with("items", &[]),
            ("setdefault", [_, _]) => with("compute_if_absent", a),
            ("setdefault", [k]) => with("compute_if_absent", &[k.clone(), vec![id("null")]]),
            ("join", [items]) => call("join", vec![items.clone(), r.clone()]),
            ("split", []) => with("split", &[]),
            ("split", [_]) => with("split", a),
            ("strip", []) => with("trim", &[]),
            ("lower", []) => with("lower", &[]),
            ("upper", []) => with("upper", &[]),
            ("startswith", [_]) => with("starts_with", a),
            ("endswith", [_]) => with("ends_with", a),
            ("replace", [_, _]) => with("replace", a),
            ("isdigit" | "isnumeric" | "isdecimal", []) => with("is_digit", &[]),
            ("isalpha", []) => with("is_alpha", &[]),
            ("isalnum", []) => with("is_alnum", &[]),
            ("isupper", []) => with("is_upper", &[]),
            ("islower", []) => with("is_lower", &[]),
            ("isspace", []) => with("is_space", &[]),
            ("bit_count", []) => with("bit_count", &[]),
            _ => return None,
        })
    }

    /// `x[k]`, `x[a:b:c]`, `x[i, j]`
    fn subscript(&mut self, inner: &[Tok], out: &mut Vec<Tok>) {
        if find_punct(inner, ":").is_some() {
            let recv = take_receiver(out);
            let mut args = vec![recv];
            for bound in split_top_level(inner, ":") {
                if bound.is_empty() {
                    args.push(vec![id("null")]);
                } else {
                    args.push(self.test(bound));
                }
            }
            out.extend(call("slice", args));
            return;
        }
        out.push(p("["));
        out.extend(self.expr(inner));
        out.push(p("]"));
    }

    /// `{}` dict, `{k: v}` dict, `{a, b}` set, and their comprehensions
    fn braces(&mut self, inner: &[Tok]) -> Vec<Tok> {
        if inner.is_empty() {
            return vec![p("{"), p("}")];
        }
        let is_dict = split_top_level(inner, ",")
            .first()
            .is_some_and(|first| find_punct(first, ":").is_some());
        if find_word(inner, "for", 1).is_some() {
            return self.comprehension(inner, if is_dict { Collect::Dict } else { Collect::Set });
        }
        if !is_dict {
            let items = split_top_level(inner, ",")
                .into_iter()
                .filter(|t| !t.is_empty())
                .map(|t| self.test(t))
                .collect();
            return call("to_set", vec![list(items)]);
        }
        let mut out = vec![p("{")];
        let entries = split_top_level(inner, ",").into_iter().filter(|t| !t.is_empty());
        for (n, entry) in entries.enumerate() {
            if n > 0 {
                out.push(p(","));
            }
            match find_punct(entry, ":") {
                Some(k) => {
                    out.extend(self.test(&entry[..k]));
                    out.push(p(":"));
                    out.extend(self.test(&entry[k + 1..]));
                }
                None => {
                    self.note("dict unpacking");
                    out.extend(self.test(entry));
                }
            }
        }
        out.push(p("}"));
        out
    }

    /// Hoist `elem for t in it if c ...` into a loop filling a temporary
    fn comprehension(&mut self, inner: &[Tok], collect: Collect) -> Vec<Tok> {
        if !self.hoist_ok {
            self.note("comprehension in a lazily evaluated position");
            return list(vec![inner.to_vec()]);
        }
        let clauses = split_word(inner, "for");
        let element = clauses[0];
        let mut loops: Vec<(&[Tok], &[Tok], Vec<&[Tok]>)> = Vec::new();
        for clause in &clauses[1..] {
            let Some(k) = find_word(clause, "in", 0) else {
                self.note("comprehension clause");
                return inner.to_vec();
            };
            let mut conds = split_word(&clause[k + 1..], "if");
            let iterable = conds.remove(0);
            loops.push((&clause[..k], iterable, conds));
        }

        let acc = self.temp();
        let init = match collect {
            Collect::List => list(Vec::new()),
            Collect::Set => call("new_set", Vec::new()),
            Collect::Dict => vec![p("{"), p("}")],
        };

        // innermost statement first
        let (element_hoist, store) = self.scoped(true, |r| match collect {
            Collect::Dict => match find_punct(element, ":") {
                Some(k) => {
                    let key = r.test(&element[..k]);
                    let value = r.test(&element[k + 1..]);
                    call("set", vec![vec![id(&acc)], key, value])
                }
                None => call("set", vec![vec![id(&acc)], r.test(element), vec![id("null")]]),
            },
            Collect::Set => call("add", vec![vec![id(&acc)], r.test(element)]),
            Collect::List => call("push", vec![vec![id(&acc)], r.test(element)]),
        });
        let mut body = element_hoist;
        body.extend(store);
        body.push(p(";"));

        let mut outer_hoist = Vec::new();
        for (n, (target, iterable, conds)) in loops.iter().enumerate().rev() {
            for cond in conds.iter().rev() {
                let (hoist, c) = self.scoped(true, |r| r.test(cond));
                let mut wrapped = hoist;
                wrapped.extend([id("if"), p("(")]);
                wrapped.extend(c);
                wrapped.extend([p(")"), p("{")]);
                wrapped.extend(body);
                wrapped.push(p("}"));
                body = wrapped;
            }
            let target = self.target(target);
            let (hoist, it) = self.scoped(true, |r| r.expr(iterable));
            let mut wrapped = Vec::new();
            if n == 0 {
                outer_hoist = hoist;
            } else {
                wrapped.extend(hoist);
            }
            wrapped.extend([id("for"), p("(")]);
            wrapped.extend(target);
            wrapped.push(id("of"));
            wrapped.extend(it);
            wrapped.extend([p(")"), p("{")]);
            wrapped.extend(body);
            wrapped.push(p("}"));
            body = wrapped;
        }

        self.hoisted.extend(outer_hoist);
        self.hoisted.extend([id(&acc), p("=")]);
        self.hoisted.extend(init);
        self.hoisted.push(p(";"));
        self.hoisted.extend(body);
        vec![id(&acc)]
    }

    /// `f"a{x}b"` becomes `"a" + str(x) + "b"`
    fn format_string(&mut self, text: &str) -> Vec<Tok> {
        let mut pieces: Vec<Vec<Tok>> = Vec::new();
        let mut literal = String::new();
        let chars: Vec<char> = text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '{' if chars.get(i + 1) == Some(&'{') => {
                    literal.push('{');
                    i += 2;
                }
                '}' if chars.get(i + 1) == Some(&'}') => {
                    literal.push('}');
                    i += 2;
                }
                '{' => {
                    let Some(len) = chars[i + 1..].iter().position(|c| *c == '}') else {
                        self.note("f-string");
                        literal.extend(&chars[i..]);
                        break;
                    };
                    let field: String = chars[i + 1..i + 1 + len].iter().collect();
                    let toks = scan::tokenize(&field, Style::Python);
                    let toks = match find_punct(&toks, ":").or_else(|| find_punct(&toks, "!")) {
                        Some(k) => {
                            self.note("f-string format spec");
                            toks[..k].to_vec()
                        }
                        None => toks,
                    };
                    if !literal.is_empty() {
                        pieces.push(vec![Tok::Str(std::mem::take(&mut literal))]);
                    }
                    pieces.push(call("str", vec![self.test(&toks)]));
                    i += len + 2;
                }
                c => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        if !literal.is_empty() || pieces.is_empty() {
            pieces.push(vec![Tok::Str(literal)]);
        }
        let mut out = Vec::new();
        for (n, piece) in pieces.into_iter().enumerate() {
            if n > 0 {
                out.push(p("+"));
            }
            out.extend(piece);
        }
        group(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collect {
    List,
    Set,
    Dict,
}

/// Default value produced by a `defaultdict` factory
fn default_for_factory(factory: &[Tok]) -> Option<Vec<Tok>> {
    match factory {
        [Tok::Ident(name)] => Some(match name.as_str() {
            "int" => int(0),
            "float" => vec![Tok::Float(0.0)],
            "str" => vec![Tok::Str(String::new())],
            "bool" => vec![id("false")],
            "list" => list(Vec::new()),
            "set" => call("new_set", Vec::new()),
            "dict" => vec![p("{"), p("}")],
            _ => return None,
        }),
        // `lambda: 0` arrives already rewritten as its tokens
        [lambda, colon, value @ ..]
            if lambda.is_ident("lambda") && colon.is_punct(":") && !value.is_empty() =>
        {
            Some(value.to_vec())
        }
        _ => None,
    }
}

fn join_args(args: Vec<Vec<Tok>>) -> Vec<Tok> {
    let mut out = Vec::new();
    for (n, a) in args.into_iter().enumerate() {
        if n > 0 {
            out.push(p(","));
        }
        out.extend(a);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Param;
    use crate::normalizer::render;
    use arbiter_common::types::Language;

    fn normalize(params: &[&str], body: &str) -> (String, Vec<String>) {
        let method = ExtractedMethod {
            name: "solve".into(),
            language: Language::Python,
            params: params
                .iter()
                .map(|n| Param {
                    name: n.to_string(),
                    type_hint: None,
                })
                .collect(),
            return_type: None,
            body: body.into(),
        };
        let (toks, untranslated) = rewrite(&method);
        (render(&toks), untranslated)
    }

    fn text(params: &[&str], body: &str) -> String {
        normalize(params, body).0
    }

    #[test]
    fn test_two_sum() {
        let out = text(
            &["nums", "target"],
            concat!(
                "seen = {}\n",
                "for i, n in enumerate(nums):\n",
                "    if target - n in seen:\n",
                "        return [seen[target - n], i]\n",
                "    seen[n] = i\n",
                "return []",
            ),
        );
        assert_eq!(
            out,
            concat!(
                "seen = {};\n",
                "for ([i, n] of enumerate(nums)) {\n",
                "  if (has(seen, target - n)) {\n",
                "    return [seen[target - n], i];\n",
                "  }\n",
                "  seen[n] = i;\n",
                "}\n",
                "return [];",
            )
        );
    }

    #[test]
    fn test_elif_else_chain() {
        let out = text(
            &["n"],
            "if n < 0:\n    return -1\nelif n == 0:\n    return 0\nelse:\n    return 1",
        );
        assert!(out.contains("if (n < 0) {"));
        assert!(out.contains("}\nelse if (n == 0) {"));
        assert!(out.contains("}\nelse {"));
    }

    #[test]
    fn test_boolean_keywords_and_none() {
        let out = text(&["a", "b"], "return a is not None and not b or a in b");
        assert_eq!(out, "return a != null && !(b) || has(b, a);");
    }

    #[test]
    fn test_ternary() {
        let out = text(&["x"], "return 'pos' if x > 0 else 'neg'");
        assert_eq!(out, "return (x > 0 ? \"pos\": \"neg\");");
    }

    #[test]
    fn test_tuple_swap_and_chained_assignment() {
        let out = text(&["a", "b"], "a, b = b, a\nx = y = 0\nreturn x + y");
        assert!(out.contains("[a, b] = [b, a];"));
        assert!(out.contains("y = 0;\nx = y;"));
    }

    #[test]
    fn test_slices() {
        let out = text(&["s"], "return s[::-1] + s[1:] + s[:2]");
        assert_eq!(
            out,
            "return slice(s, null, null, - 1) + slice(s, 1, null) + slice(s, null, 2);"
        );
    }

    #[test]
    fn test_list_comprehension_hoisted() {
        let out = text(&["m", "n"], "grid = [[0] * n for _ in range(m)]\nreturn grid");
        assert!(out.starts_with(concat!(
            "_comp0 = [];\n",
            "for (_ of range(m)) {\n",
            "  push(_comp0, [0] * n);\n",
            "}\n",
            "grid = _comp0;",
        )));
    }

    #[test]
    fn test_generator_argument() {
        let out = text(&["xs"], "return sum(x * x for x in xs if x > 0)");
        assert!(out.contains("for (x of xs) {"));
        assert!(out.contains("if (x > 0) {"));
        assert!(out.contains("return sum(_comp0);"));
    }

    #[test]
    fn test_comprehension_in_while_condition_is_untranslated() {
        let (_, untranslated) =
            normalize(&["xs"], "while any([x for x in xs]):\n    xs.pop()\nreturn 0");
        assert!(untranslated.iter().any(|u| u.contains("comprehension")));
    }

    #[test]
    fn test_collections_and_methods() {
        let out = text(
            &["words"],
            concat!(
                "counts = defaultdict(int)\n",
                "q = deque()\n",
                "q.append(1)\n",
                "q.popleft()\n",
                "for w in words:\n",
                "    counts[w] += 1\n",
                "return ','.join(sorted(counts.keys(), reverse=True))",
            ),
        );
        assert!(out.contains("counts = new_map(0);"));
        assert!(out.contains("q = [];"));
        assert!(out.contains("push(q, 1);"));
        assert!(out.contains("shift(q);"));
        assert!(out.contains("return join(sorted(keys(counts), true), \",\");"));
    }

    #[test]
    fn test_heapq_and_math() {
        let out = text(
            &["xs"],
            "h = []\nheapq.heappush(h, 3)\nreturn heapq.heappop(h) + math.floor(math.sqrt(4))",
        );
        assert!(out.contains("heap_push(h, 3);"));
        assert!(out.contains("return heap_pop(h) + floor(sqrt(4));"));
    }

    #[test]
    fn test_pass_and_inline_suite() {
        let out = text(&["x"], "if x: return 1\nwhile False:\n    pass\nreturn 0");
        assert!(out.contains("if (x) {\n  return 1;\n}"));
        assert!(out.contains("while (false) {\n  ;\n}"));
    }

    #[test]
    fn test_multiline_bracket_join() {
        let out = text(&[], "xs = [1,\n      2,\n      3]\nreturn xs");
        assert!(out.starts_with("xs = [1, 2, 3];"));
    }

    #[test]
    fn test_f_string() {
        let out = text(&["n"], "return f\"n={n}!\"");
        assert_eq!(out, "return (\"n=\" + str(n) + \"!\");");
    }

    #[test]
    fn test_set_and_dict_literals() {
        let out = text(&[], "s = {1, 2}\nd = {'a': 1}\nreturn len(s) + d['a']");
        assert!(out.contains("s = to_set([1, 2]);"));
        assert!(out.contains("d = {\"a\": 1};"));
    }

    #[test]
    fn test_raise_and_del() {
        let out = text(&["d"], "del d['k']\nraise ValueError('bad')");
        assert!(out.contains("remove(d, \"k\");"));
        assert!(out.contains("fail(\"ValueError\");"));
    }

    #[test]
    fn test_nested_function_is_untranslated() {
        let (_, untranslated) = normalize(&["n"], "def helper(k):\n    return k\nreturn helper(n)");
        assert!(untranslated.iter().any(|u| u == "'def' statement"));
    }

    #[test]
    fn test_reserved_names() {
        let out = text(&["of"], "null = of\nreturn null");
        assert!(out.contains("null_ = of_;"));
    }
}
