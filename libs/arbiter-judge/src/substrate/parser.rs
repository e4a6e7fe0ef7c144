//! Recursive-descent parser for the substrate
//!
//! Produces a [`Program`] with every name resolved to a frame slot. Anything
//! the grammar does not cover, a call to an unknown function, or a name that
//! is read but never assigned is rejected here, before a single test case
//! runs.

use super::ast::{BinaryOp, Expr, Program, Stmt, Target, UnaryOp};
use super::builtins::Builtin;
use super::lexer::{self, Spanned, Token};
use std::collections::HashMap;

/// Guard for the parser's own recursion on adversarial nesting
const MAX_NESTING: usize = 100;

const KEYWORDS: &[&str] = &[
    "let", "if", "else", "while", "for", "of", "return", "break", "continue", "true", "false",
    "null",
];

/// Compile a function body.
///
/// `aliases` are extra spellings that also denote a recursive call
/// (the snake_case form of a camelCase entry point).
pub fn compile(
    name: &str,
    aliases: &[String],
    params: &[String],
    body: &str,
) -> Result<Program, String> {
    let tokens = lexer::tokenize(body)?;
    let mut parser = Parser::new(tokens, name, aliases, params);
    let mut stmts = Vec::new();
    while !parser.at_eof() {
        stmts.push(parser.statement()?);
    }
    parser.check_unassigned()?;

    Ok(Program {
        name: name.to_string(),
        params: params.to_vec(),
        slots: parser.slots,
        body: stmts,
    })
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    slots: Vec<String>,
    index: HashMap<String, usize>,
    /// Slot has a write somewhere in the body (or is a parameter)
    written: Vec<bool>,
    /// Line of the first read, reported for never-assigned names
    first_read: Vec<Option<usize>>,
    callee_names: Vec<String>,
    arity: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, name: &str, aliases: &[String], params: &[String]) -> Self {
        let mut callee_names = vec![name.to_string()];
        callee_names.extend(aliases.iter().cloned());
        let mut parser = Parser {
            tokens,
            pos: 0,
            slots: Vec::new(),
            index: HashMap::new(),
            written: Vec::new(),
            first_read: Vec::new(),
            callee_names,
            arity: params.len(),
            depth: 0,
        };
        for p in params {
            let slot = parser.slot(p);
            parser.written[slot] = true;
        }
        parser
    }

    // ── Token helpers ──────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].token
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn is_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Token::Sym(s) if *s == sym)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Token::Ident(w) if w == word)
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if self.is_sym(sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<(), String> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", sym)))
        }
    }

    fn error(&self, message: &str) -> String {
        format!("line {}: {}, found {}", self.line(), message, self.peek())
    }

    fn end_simple(&mut self) -> Result<(), String> {
        if self.eat_sym(";") || self.is_sym("}") || self.at_eof() {
            Ok(())
        } else {
            Err(self.error("expected ';'"))
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(format!("line {}: nesting too deep", self.line()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ── Names ──────────────────────────────────────────────

    fn slot(&mut self, name: &str) -> usize {
        if let Some(slot) = self.index.get(name) {
            return *slot;
        }
        let slot = self.slots.len();
        self.slots.push(name.to_string());
        self.index.insert(name.to_string(), slot);
        self.written.push(false);
        self.first_read.push(None);
        slot
    }

    fn read_name(&mut self, name: &str, line: usize) -> usize {
        let slot = self.slot(name);
        if self.first_read[slot].is_none() {
            self.first_read[slot] = Some(line);
        }
        slot
    }

    fn check_unassigned(&self) -> Result<(), String> {
        for (slot, name) in self.slots.iter().enumerate() {
            if !self.written[slot] {
                let line = self.first_read[slot].unwrap_or(0);
                return Err(format!("line {}: unknown name '{}'", line, name));
            }
        }
        Ok(())
    }

    fn mark_written(&mut self, target: &Target) {
        match target {
            Target::Local(slot) => self.written[*slot] = true,
            Target::Index(..) => {}
            Target::Unpack(parts) => parts.iter().for_each(|t| self.mark_written(t)),
        }
    }

    fn to_target(&mut self, expr: Expr) -> Result<Target, String> {
        let target = match expr {
            Expr::Local(slot) => Target::Local(slot),
            Expr::Index(base, index) => Target::Index(*base, *index),
            Expr::List(items) => Target::Unpack(
                items
                    .into_iter()
                    .map(|e| self.to_target(e))
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err(format!("line {}: invalid assignment target", self.line())),
        };
        self.mark_written(&target);
        Ok(target)
    }

    // ── Statements ─────────────────────────────────────────

    fn block(&mut self) -> Result<Vec<Stmt>, String> {
        self.expect_sym("{")?;
        let mut stmts = Vec::new();
        while !self.is_sym("}") {
            if self.at_eof() {
                return Err(self.error("expected '}'"));
            }
            stmts.push(self.statement()?);
        }
        self.advance();
        Ok(stmts)
    }

    /// Body of a control statement: a braced block or a single statement
    fn body(&mut self) -> Result<Vec<Stmt>, String> {
        if self.is_sym("{") {
            self.block()
        } else {
            Ok(vec![self.statement()?])
        }
    }

    fn statement(&mut self) -> Result<Stmt, String> {
        self.enter()?;
        let stmt = self.statement_inner();
        self.leave();
        stmt
    }

    fn statement_inner(&mut self) -> Result<Stmt, String> {
        if self.is_sym("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.eat_sym(";") {
            return Ok(Stmt::Block(Vec::new()));
        }

        let keyword = match self.peek() {
            Token::Ident(w) if KEYWORDS.contains(&w.as_str()) => Some(w.clone()),
            _ => None,
        };
        match keyword.as_deref() {
            Some("if") => self.if_statement(),
            Some("while") => {
                self.advance();
                self.expect_sym("(")?;
                let cond = self.expression()?;
                self.expect_sym(")")?;
                Ok(Stmt::While(cond, self.body()?))
            }
            Some("for") => self.for_statement(),
            Some("return") => {
                self.advance();
                let value = if self.is_sym(";") || self.is_sym("}") || self.at_eof() {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.end_simple()?;
                Ok(Stmt::Return(value))
            }
            Some("break") => {
                self.advance();
                self.end_simple()?;
                Ok(Stmt::Break)
            }
            Some("continue") => {
                self.advance();
                self.end_simple()?;
                Ok(Stmt::Continue)
            }
            _ => {
                let stmts = self.simple_list()?;
                self.end_simple()?;
                Ok(single_or_block(stmts))
            }
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, String> {
        let mut branches = Vec::new();
        let mut otherwise = None;
        loop {
            // at `if`
            self.advance();
            self.expect_sym("(")?;
            let cond = self.expression()?;
            self.expect_sym(")")?;
            branches.push((cond, self.body()?));

            if !self.is_keyword("else") {
                break;
            }
            self.advance();
            if self.is_keyword("if") {
                continue;
            }
            otherwise = Some(self.body()?);
            break;
        }
        Ok(Stmt::If { branches, otherwise })
    }

    fn for_statement(&mut self) -> Result<Stmt, String> {
        self.advance();
        self.expect_sym("(")?;

        if self.header_has_of() {
            if self.is_keyword("let") {
                self.advance();
            }
            let target_expr = self.postfix()?;
            let target = self.to_target(target_expr)?;
            if !self.is_keyword("of") {
                return Err(self.error("expected 'of'"));
            }
            self.advance();
            let iterable = self.expression()?;
            self.expect_sym(")")?;
            let body = self.body()?;
            return Ok(Stmt::ForOf {
                target,
                iterable,
                body,
            });
        }

        let init = if self.is_sym(";") { Vec::new() } else { self.simple_list()? };
        self.expect_sym(";")?;
        let cond = if self.is_sym(";") { None } else { Some(self.expression()?) };
        self.expect_sym(";")?;
        let step = if self.is_sym(")") { Vec::new() } else { self.simple_list()? };
        self.expect_sym(")")?;
        let body = self.body()?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    /// Whether the `for (...)` header at the cursor is a for-of loop
    fn header_has_of(&self) -> bool {
        let mut depth = 0i32;
        let mut k = 0;
        loop {
            match self.peek_at(k) {
                Token::Eof => return false,
                Token::Sym(s) if *s == "(" || *s == "[" || *s == "{" => depth += 1,
                Token::Sym(s) if *s == ")" || *s == "]" || *s == "}" => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::Sym(s) if *s == ";" && depth == 0 => return false,
                Token::Ident(w) if w == "of" && depth == 0 => return true,
                _ => {}
            }
            k += 1;
        }
    }

    /// Comma-separated simple statements (`let i = 0, j = n`, `i++, j--`)
    fn simple_list(&mut self) -> Result<Vec<Stmt>, String> {
        let is_let = self.is_keyword("let");
        if is_let {
            self.advance();
        }
        let mut stmts = vec![self.simple(is_let)?];
        while self.eat_sym(",") {
            if self.is_keyword("let") {
                self.advance();
            }
            stmts.push(self.simple(is_let)?);
        }
        Ok(stmts)
    }

    fn simple(&mut self, is_let: bool) -> Result<Stmt, String> {
        if is_let {
            let name = match self.advance() {
                Token::Ident(name) if !KEYWORDS.contains(&name.as_str()) => name,
                other => {
                    return Err(format!(
                        "line {}: expected a name after 'let', found {}",
                        self.line(),
                        other
                    ))
                }
            };
            let slot = self.slot(&name);
            self.written[slot] = true;
            let value = if self.eat_sym("=") { self.expression()? } else { Expr::Null };
            return Ok(Stmt::Assign(Target::Local(slot), value));
        }

        let lhs = self.expression()?;
        let compound = match self.peek() {
            Token::Sym("+=") => Some(BinaryOp::Add),
            Token::Sym("-=") => Some(BinaryOp::Sub),
            Token::Sym("*=") => Some(BinaryOp::Mul),
            Token::Sym("/=") => Some(BinaryOp::Div),
            Token::Sym("//=") => Some(BinaryOp::FloorDiv),
            Token::Sym("%=") => Some(BinaryOp::Mod),
            Token::Sym("**=") => Some(BinaryOp::Pow),
            Token::Sym("&=") => Some(BinaryOp::BitAnd),
            Token::Sym("|=") => Some(BinaryOp::BitOr),
            Token::Sym("^=") => Some(BinaryOp::BitXor),
            Token::Sym("<<=") => Some(BinaryOp::Shl),
            Token::Sym(">>=") => Some(BinaryOp::Shr),
            _ => None,
        };
        if let Some(op) = compound {
            self.advance();
            let target = self.to_target(lhs)?;
            let value = self.expression()?;
            return Ok(Stmt::Compound(target, op, value));
        }
        if self.eat_sym("=") {
            let target = self.to_target(lhs)?;
            let value = self.expression()?;
            return Ok(Stmt::Assign(target, value));
        }
        Ok(Stmt::Expr(lhs))
    }

    // ── Expressions ────────────────────────────────────────

    pub fn expression(&mut self) -> Result<Expr, String> {
        self.enter()?;
        let expr = self.ternary();
        self.leave();
        expr
    }

    fn ternary(&mut self) -> Result<Expr, String> {
        let cond = self.or()?;
        if !self.eat_sym("?") {
            return Ok(cond);
        }
        let then = self.expression()?;
        self.expect_sym(":")?;
        let otherwise = self.expression()?;
        Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)))
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.and()?;
        while self.eat_sym("||") {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.comparison()?;
        while self.eat_sym("&&") {
            let rhs = self.comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// Comparisons chain: `a < b <= c` means `a < b && b <= c`
    fn comparison(&mut self) -> Result<Expr, String> {
        let first = self.bit_or()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                Token::Sym("==") => BinaryOp::Eq,
                Token::Sym("!=") => BinaryOp::Ne,
                Token::Sym("<") => BinaryOp::Lt,
                Token::Sym("<=") => BinaryOp::Le,
                Token::Sym(">") => BinaryOp::Gt,
                Token::Sym(">=") => BinaryOp::Ge,
                _ => break,
            };
            self.advance();
            ops.push(op);
            operands.push(self.bit_or()?);
        }
        if ops.is_empty() {
            return Ok(operands.remove(0));
        }
        let mut links = ops.iter().enumerate().map(|(k, op)| {
            Expr::Binary(*op, Box::new(operands[k].clone()), Box::new(operands[k + 1].clone()))
        });
        let mut chain = links.next().ok_or_else(|| self.error("expected comparison"))?;
        for link in links {
            chain = Expr::And(Box::new(chain), Box::new(link));
        }
        Ok(chain)
    }

    fn binary_level(
        &mut self,
        table: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (sym, op) in table {
                if self.is_sym(sym) {
                    self.advance();
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn bit_or(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("|", BinaryOp::BitOr)], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("^", BinaryOp::BitXor)], Self::bit_and)
    }

    fn bit_and(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("&", BinaryOp::BitAnd)], Self::shift)
    }

    fn shift(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, String> {
        self.binary_level(&[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("//", BinaryOp::FloorDiv),
                ("%", BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr, String> {
        self.enter()?;
        let expr = self.unary_inner();
        self.leave();
        expr
    }

    fn unary_inner(&mut self) -> Result<Expr, String> {
        if self.eat_sym("-") {
            let operand = self.unary()?;
            return Ok(match operand {
                Expr::Int(n) => Expr::Int(-n),
                Expr::Float(f) => Expr::Float(-f),
                other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
            });
        }
        if self.eat_sym("+") {
            return self.unary();
        }
        if self.eat_sym("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat_sym("~") {
            return Ok(Expr::Unary(UnaryOp::BitNot, Box::new(self.unary()?)));
        }
        if self.is_sym("++") || self.is_sym("--") {
            let delta = if self.is_sym("++") { 1 } else { -1 };
            self.advance();
            let operand = self.postfix()?;
            let target = self.to_target(operand)?;
            return Ok(Expr::Step {
                target: Box::new(target),
                delta,
                postfix: false,
            });
        }
        self.power()
    }

    /// `**` is right-associative and binds tighter than a unary minus on its left
    fn power(&mut self) -> Result<Expr, String> {
        let base = self.postfix()?;
        if self.eat_sym("**") {
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_sym("[") {
                let index = self.expression()?;
                self.expect_sym("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.is_sym("++") || self.is_sym("--") {
                let delta = if self.is_sym("++") { 1 } else { -1 };
                self.advance();
                let target = self.to_target(expr)?;
                expr = Expr::Step {
                    target: Box::new(target),
                    delta,
                    postfix: true,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        let line = self.line();
        match self.advance() {
            Token::Int(n) => Ok(Expr::Int(n)),
            Token::Float(f) => Ok(Expr::Float(f)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Char(c) => Ok(Expr::Char(c)),
            Token::Sym("(") => {
                let inner = self.expression()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            Token::Sym("[") => {
                let items = self.arguments("]")?;
                Ok(Expr::List(items))
            }
            Token::Sym("{") => {
                let mut entries = Vec::new();
                while !self.is_sym("}") {
                    let key = self.expression()?;
                    self.expect_sym(":")?;
                    let value = self.expression()?;
                    entries.push((key, value));
                    if !self.eat_sym(",") {
                        break;
                    }
                }
                self.expect_sym("}")?;
                Ok(Expr::Map(entries))
            }
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                w if KEYWORDS.contains(&w) => {
                    Err(format!("line {}: unexpected keyword '{}'", line, w))
                }
                _ if self.is_sym("(") => {
                    self.advance();
                    let args = self.arguments(")")?;
                    self.call(&word, args, line)
                }
                _ => Ok(Expr::Local(self.read_name(&word, line))),
            },
            other => Err(format!("line {}: unexpected {}", line, other)),
        }
    }

    /// Comma-separated expressions up to `close` (trailing comma allowed)
    fn arguments(&mut self, close: &str) -> Result<Vec<Expr>, String> {
        let mut items = Vec::new();
        while !self.is_sym(close) {
            items.push(self.expression()?);
            if !self.eat_sym(",") {
                break;
            }
        }
        self.expect_sym(close)?;
        Ok(items)
    }

    fn call(&mut self, name: &str, args: Vec<Expr>, line: usize) -> Result<Expr, String> {
        if self.callee_names.iter().any(|n| n == name) {
            if args.len() != self.arity {
                return Err(format!(
                    "line {}: '{}' takes {} arguments but {} were given",
                    line,
                    name,
                    self.arity,
                    args.len()
                ));
            }
            return Ok(Expr::Recurse(args));
        }
        let builtin = Builtin::from_name(name)
            .ok_or_else(|| format!("line {}: unknown function '{}'", line, name))?;
        let (min, max) = builtin.arity();
        if args.len() < min || args.len() > max {
            return Err(format!(
                "line {}: '{}' does not accept {} arguments",
                line,
                name,
                args.len()
            ));
        }
        Ok(Expr::Builtin(builtin, args))
    }
}

fn single_or_block(mut stmts: Vec<Stmt>) -> Stmt {
    if stmts.len() == 1 {
        stmts.remove(0)
    } else {
        Stmt::Block(stmts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<Program, String> {
        compile("f", &[], &["n".to_string()], body)
    }

    #[test]
    fn test_slots_resolved() {
        let source = "let total = 0; for (let i = 0; i < n; i++) { total += i; } return total;";
        let program = parse(source).unwrap();
        assert_eq!(program.slots, vec!["n", "total", "i"]);
        assert!(matches!(program.body[0], Stmt::Assign(Target::Local(1), Expr::Int(0))));
        assert!(matches!(program.body[1], Stmt::For { .. }));
    }

    #[test]
    fn test_forward_read_is_allowed() {
        // `prev` is read in the first iteration branch only after assignment at runtime
        let program = parse("for (x of n) { if (x > 0) { return prev; } prev = x; } return 0;");
        assert!(program.is_ok());
    }

    #[test]
    fn test_unknown_name_rejected() {
        let err = parse("return Integer;").unwrap_err();
        assert!(err.contains("unknown name 'Integer'"), "{}", err);
    }

    #[test]
    fn test_unknown_function_rejected() {
        let err = parse("return foo(n);").unwrap_err();
        assert!(err.contains("unknown function 'foo'"), "{}", err);
    }

    #[test]
    fn test_recursion_arity_checked() {
        let program = parse("return f(n - 1);").unwrap();
        assert!(matches!(program.body[0], Stmt::Return(Some(Expr::Recurse(_)))));
        assert!(parse("return f(n, 1);").is_err());
    }

    #[test]
    fn test_precedence() {
        let program = parse("return -n ** 2 + 3 * n;").unwrap();
        let Stmt::Return(Some(Expr::Binary(BinaryOp::Add, lhs, _))) = &program.body[0] else {
            panic!("expected addition at the root");
        };
        assert!(matches!(**lhs, Expr::Unary(UnaryOp::Neg, _)));

        let program = parse("return n & 1 == 0;").unwrap();
        assert!(matches!(program.body[0], Stmt::Return(Some(Expr::Binary(BinaryOp::Eq, _, _)))));
    }

    #[test]
    fn test_chained_comparison() {
        let program = parse("return 0 < n < 10;").unwrap();
        assert!(matches!(program.body[0], Stmt::Return(Some(Expr::And(_, _)))));
    }

    #[test]
    fn test_for_of_with_unpack() {
        let program = parse("for ([k, v] of items({})) { n += v; } return n;").unwrap();
        let Stmt::ForOf { target, .. } = &program.body[0] else {
            panic!("expected for-of");
        };
        assert!(matches!(target, Target::Unpack(parts) if parts.len() == 2));
    }

    #[test]
    fn test_else_if_chain_and_single_statement_bodies() {
        let source = "if (n < 0) return -1; else if (n == 0) return 0; else return 1;";
        let program = parse(source).unwrap();
        let Stmt::If { branches, otherwise } = &program.body[0] else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("return (n;").is_err());
        assert!(parse("n + = 1;").is_err());
        assert!(parse("5 = n;").is_err());
        assert!(parse("if n > 0 { return 1; }").is_err());
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let body = format!("return {}n{};", "(".repeat(500), ")".repeat(500));
        assert!(parse(&body).unwrap_err().contains("nesting too deep"));
    }
}
