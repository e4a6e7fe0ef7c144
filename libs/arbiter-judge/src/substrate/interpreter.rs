//! Tree-walking evaluator for compiled substrate programs
//!
//! Execution is metered: every statement, loop iteration and bulk builtin
//! charges the [`Budget`], which periodically checks the wall-clock deadline
//! and the cancellation flag. Recursion depth is bounded separately.

use super::ast::{BinaryOp, Expr, Program, Stmt, Target};
use super::builtins::{self, Builtin};
use super::ops::{self, elements, fault, resolve_index};
use super::value::{Dyn, Key};
use super::Dialect;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Work units between two deadline checks
const CHECK_INTERVAL: u64 = 1024;

/// Why execution stopped early
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Trap {
    #[error("{0}")]
    Runtime(String),
    #[error("time limit exceeded")]
    Timeout,
    #[error("execution cancelled")]
    Cancelled,
}

/// Step meter and resource limits for one invocation
#[derive(Debug)]
pub struct Budget {
    deadline: Instant,
    cancel: Arc<AtomicBool>,
    pending: u64,
    max_collection_len: usize,
}

impl Budget {
    pub fn new(deadline: Instant, cancel: Arc<AtomicBool>, max_collection_len: usize) -> Self {
        Self {
            deadline,
            cancel,
            pending: 0,
            max_collection_len,
        }
    }

    /// Record `units` of work, checking the clock every [`CHECK_INTERVAL`] units
    pub fn charge(&mut self, units: u64) -> Result<(), Trap> {
        self.pending = self.pending.saturating_add(units);
        if self.pending >= CHECK_INTERVAL {
            self.pending = 0;
            self.check()?;
        }
        Ok(())
    }

    pub fn check(&self) -> Result<(), Trap> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(Trap::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(Trap::Timeout);
        }
        Ok(())
    }

    pub fn check_len(&self, len: usize) -> Result<(), Trap> {
        if len > self.max_collection_len {
            return fault(format!(
                "collection exceeds maximum length of {}",
                self.max_collection_len
            ));
        }
        Ok(())
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Dyn),
}

type Frame = Vec<Option<Dyn>>;

pub struct Interpreter<'p> {
    program: &'p Program,
    dialect: Dialect,
    budget: Budget,
    max_call_depth: usize,
    depth: usize,
}

impl<'p> Interpreter<'p> {
    pub fn new(
        program: &'p Program,
        dialect: Dialect,
        budget: Budget,
        max_call_depth: usize,
    ) -> Self {
        Self {
            program,
            dialect,
            budget,
            max_call_depth,
            depth: 0,
        }
    }

    /// Invoke the program's function with positional arguments
    pub fn invoke(&mut self, args: Vec<Dyn>) -> Result<Dyn, Trap> {
        if args.len() != self.program.arity() {
            return fault(format!(
                "{}() takes {} arguments but {} were given",
                self.program.name,
                self.program.arity(),
                args.len()
            ));
        }
        self.depth += 1;
        if self.depth > self.max_call_depth {
            self.depth -= 1;
            return fault("maximum recursion depth exceeded");
        }
        self.budget.charge(1)?;

        let mut frame: Frame = vec![None; self.program.slots.len()];
        for (slot, value) in args.into_iter().enumerate() {
            frame[slot] = Some(value);
        }
        let program = self.program;
        let result = self.exec_block(&program.body, &mut frame);
        self.depth -= 1;

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Dyn::Null),
            Flow::Break | Flow::Continue => fault("'break' or 'continue' outside a loop"),
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> Result<Flow, Trap> {
        for stmt in stmts {
            match self.exec(stmt, frame)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, Trap> {
        self.budget.charge(1)?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            Stmt::Assign(target, expr) => {
                let value = self.eval(expr, frame)?;
                self.assign(target, value, frame)?;
            }
            Stmt::Compound(target, op, expr) => {
                self.compound(target, *op, expr, frame)?;
            }
            Stmt::If { branches, otherwise } => {
                for (cond, body) in branches {
                    if self.eval(cond, frame)?.is_truthy() {
                        return self.exec_block(body, frame);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body, frame);
                }
            }
            Stmt::While(cond, body) => {
                while self.eval(cond, frame)?.is_truthy() {
                    self.budget.charge(1)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                for s in init {
                    self.exec(s, frame)?;
                }
                loop {
                    self.budget.charge(1)?;
                    if let Some(cond) = cond {
                        if !self.eval(cond, frame)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                        Flow::Normal | Flow::Continue => {}
                    }
                    for s in step {
                        self.exec(s, frame)?;
                    }
                }
            }
            Stmt::ForOf {
                target,
                iterable,
                body,
            } => return self.for_of(target, iterable, body, frame),
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(e, frame)?,
                    None => Dyn::Null,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Block(stmts) => return self.exec_block(stmts, frame),
        }
        Ok(Flow::Normal)
    }

    fn for_of(
        &mut self,
        target: &Target,
        iterable: &Expr,
        body: &[Stmt],
        frame: &mut Frame,
    ) -> Result<Flow, Trap> {
        // ranges are walked lazily instead of materialised
        if let Expr::Builtin(Builtin::Range, args) = iterable {
            let mut bounds = Vec::with_capacity(args.len());
            for a in args {
                let v = self.eval(a, frame)?;
                bounds.push(v.as_int().map_or_else(
                    || fault(format!("range bound must be an integer, not {}", v.type_name())),
                    Ok,
                )?);
            }
            let (start, stop, step) = match bounds.as_slice() {
                [stop] => (0, *stop, 1),
                [start, stop] => (*start, *stop, 1),
                [start, stop, step, ..] => (*start, *stop, *step),
                [] => (0, 0, 1),
            };
            if step == 0 {
                return fault("range() arg 3 must not be zero");
            }
            let mut i = start;
            while (step > 0 && i < stop) || (step < 0 && i > stop) {
                self.budget.charge(1)?;
                self.assign(target, Dyn::Int(i), frame)?;
                match self.exec_block(body, frame)? {
                    Flow::Break => break,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Normal | Flow::Continue => {}
                }
                i = match i.checked_add(step) {
                    Some(next) => next,
                    None => break,
                };
            }
            return Ok(Flow::Normal);
        }

        let source = self.eval(iterable, frame)?;
        let items = elements(&source, self.dialect)?;
        for item in items {
            self.budget.charge(1)?;
            self.assign(target, item, frame)?;
            match self.exec_block(body, frame)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    // ── Assignment ─────────────────────────────────────────

    fn assign(&mut self, target: &Target, value: Dyn, frame: &mut Frame) -> Result<(), Trap> {
        match target {
            Target::Local(slot) => {
                frame[*slot] = Some(value);
                Ok(())
            }
            Target::Index(base, key) => {
                let container = self.eval(base, frame)?;
                let key = self.eval(key, frame)?;
                self.store_into(&container, &key, value, base, frame)
            }
            Target::Unpack(targets) => {
                let items = elements(&value, self.dialect)?;
                if items.len() != targets.len() {
                    return fault(format!(
                        "cannot unpack {} values into {} targets",
                        items.len(),
                        targets.len()
                    ));
                }
                for (t, item) in targets.iter().zip(items) {
                    self.assign(t, item, frame)?;
                }
                Ok(())
            }
        }
    }

    /// `container[key] = value`; `base` is the expression that produced the
    /// container, needed to write back a rebuilt string.
    fn store_into(
        &mut self,
        container: &Dyn,
        key: &Dyn,
        value: Dyn,
        base: &Expr,
        frame: &mut Frame,
    ) -> Result<(), Trap> {
        match container {
            Dyn::List(l) => {
                let len = l.borrow().len();
                let i = resolve_index(key, len, self.dialect)?;
                l.borrow_mut()[i] = value;
                Ok(())
            }
            Dyn::Map(m) => {
                let k = Key::from_dyn(key).map_err(Trap::Runtime)?;
                m.borrow_mut().insert(k, value);
                let len = m.borrow().len();
                self.budget.check_len(len)
            }
            Dyn::Str(s) if self.dialect == Dialect::CFamily => {
                let mut chars: Vec<char> = s.chars().collect();
                let i = resolve_index(key, chars.len(), self.dialect)?;
                chars[i] = match &value {
                    Dyn::Char(c) => *c,
                    Dyn::Str(t) if t.chars().count() == 1 => t.chars().next().unwrap_or(' '),
                    other => {
                        let code = other.as_int().and_then(|n| u32::try_from(n).ok());
                        match code.and_then(char::from_u32) {
                            Some(c) => c,
                            None => {
                                return fault(format!(
                                    "cannot store {} in a string",
                                    other.type_name()
                                ))
                            }
                        }
                    }
                };
                let rebuilt = Dyn::str(&chars.into_iter().collect::<String>());
                self.store_expr(base, rebuilt, frame)
            }
            other => fault(format!(
                "'{}' value does not support item assignment",
                other.type_name()
            )),
        }
    }

    fn store_expr(&mut self, expr: &Expr, value: Dyn, frame: &mut Frame) -> Result<(), Trap> {
        match expr {
            Expr::Local(slot) => {
                frame[*slot] = Some(value);
                Ok(())
            }
            Expr::Index(base, key) => {
                let container = self.eval(base, frame)?;
                let key = self.eval(key, frame)?;
                self.store_into(&container, &key, value, base, frame)
            }
            _ => fault("strings are immutable here"),
        }
    }

    fn compound(
        &mut self,
        target: &Target,
        op: BinaryOp,
        expr: &Expr,
        frame: &mut Frame,
    ) -> Result<Dyn, Trap> {
        match target {
            Target::Local(slot) => {
                let current = self.read_slot(*slot, frame)?;
                let rhs = self.eval(expr, frame)?;
                let updated = ops::binary(op, &current, &rhs, self.dialect, &mut self.budget)?;
                frame[*slot] = Some(updated.clone());
                Ok(updated)
            }
            Target::Index(base, key) => {
                let container = self.eval(base, frame)?;
                let key = self.eval(key, frame)?;
                let current = ops::index_get(&container, &key, self.dialect)?;
                let rhs = self.eval(expr, frame)?;
                let updated = ops::binary(op, &current, &rhs, self.dialect, &mut self.budget)?;
                self.store_into(&container, &key, updated.clone(), base, frame)?;
                Ok(updated)
            }
            Target::Unpack(_) => fault("compound assignment to a destructuring target"),
        }
    }

    fn read_slot(&self, slot: usize, frame: &Frame) -> Result<Dyn, Trap> {
        match &frame[slot] {
            Some(value) => Ok(value.clone()),
            None => fault(format!(
                "variable '{}' used before assignment",
                self.program.slots[slot]
            )),
        }
    }

    // ── Expressions ────────────────────────────────────────

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Dyn, Trap> {
        match expr {
            Expr::Null => Ok(Dyn::Null),
            Expr::Bool(b) => Ok(Dyn::Bool(*b)),
            Expr::Int(n) => Ok(Dyn::Int(*n)),
            Expr::Float(f) => Ok(Dyn::Float(*f)),
            Expr::Char(c) => Ok(self.dialect.char_value(*c)),
            Expr::Str(s) => Ok(Dyn::str(s)),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, frame)?);
                }
                Ok(Dyn::list(values))
            }
            Expr::Map(entries) => {
                let mut map = super::value::DynMap::new();
                for (k, v) in entries {
                    let key = self.eval(k, frame)?;
                    let value = self.eval(v, frame)?;
                    map.insert(Key::from_dyn(&key).map_err(Trap::Runtime)?, value);
                }
                Ok(Dyn::map(map))
            }
            Expr::Local(slot) => self.read_slot(*slot, frame),
            Expr::Index(base, key) => {
                let container = self.eval(base, frame)?;
                let key = self.eval(key, frame)?;
                ops::index_get(&container, &key, self.dialect)
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, frame)?;
                ops::unary(*op, &value)
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs, frame)?;
                let b = self.eval(rhs, frame)?;
                ops::binary(*op, &a, &b, self.dialect, &mut self.budget)
            }
            Expr::And(lhs, rhs) => {
                let a = self.eval(lhs, frame)?;
                if !a.is_truthy() {
                    return Ok(a);
                }
                self.eval(rhs, frame)
            }
            Expr::Or(lhs, rhs) => {
                let a = self.eval(lhs, frame)?;
                if a.is_truthy() {
                    return Ok(a);
                }
                self.eval(rhs, frame)
            }
            Expr::Ternary(cond, then, otherwise) => {
                if self.eval(cond, frame)?.is_truthy() {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            Expr::Step {
                target,
                delta,
                postfix,
            } => {
                let before = match target.as_ref() {
                    Target::Local(slot) => self.read_slot(*slot, frame)?,
                    Target::Index(base, key) => {
                        let container = self.eval(base, frame)?;
                        let key = self.eval(key, frame)?;
                        ops::index_get(&container, &key, self.dialect)?
                    }
                    Target::Unpack(_) => return fault("cannot increment a destructuring target"),
                };
                let after = self.compound(target, BinaryOp::Add, &Expr::Int(*delta), frame)?;
                Ok(if *postfix { before } else { after })
            }
            Expr::Builtin(builtin, args) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a, frame)?);
                }
                builtins::call(*builtin, values, self.dialect, &mut self.budget)
            }
            Expr::Recurse(args) => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval(a, frame)?);
                }
                self.invoke(values)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::parser::compile;
    use std::time::Duration;

    fn run_with(
        body: &str,
        params: &[&str],
        args: Vec<Dyn>,
        dialect: Dialect,
        budget: Budget,
    ) -> Result<Dyn, Trap> {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let program = compile("f", &[], &params, body).unwrap();
        Interpreter::new(&program, dialect, budget, 64).invoke(args)
    }

    fn run(body: &str, params: &[&str], args: Vec<Dyn>, dialect: Dialect) -> Result<Dyn, Trap> {
        let budget = Budget::new(
            Instant::now() + Duration::from_secs(5),
            Arc::new(AtomicBool::new(false)),
            100_000,
        );
        run_with(body, params, args, dialect, budget)
    }

    #[test]
    fn test_loops_and_accumulation() {
        let body = "let total = 0;
            for (let i = 1; i <= n; i++) { if (i % 2 == 0) continue; total += i; }
            return total;";
        let result = run(body, &["n"], vec![Dyn::Int(9)], Dialect::CFamily);
        assert!(matches!(result, Ok(Dyn::Int(25))));
    }

    #[test]
    fn test_recursion() {
        let body = "if (n < 2) return n; return f(n - 1) + f(n - 2);";
        let result = run(body, &["n"], vec![Dyn::Int(15)], Dialect::CFamily);
        assert!(matches!(result, Ok(Dyn::Int(610))));
    }

    #[test]
    fn test_recursion_depth_limit() {
        let body = "return f(n + 1);";
        let err = run(body, &["n"], vec![Dyn::Int(0)], Dialect::Python).unwrap_err();
        assert_eq!(err, Trap::Runtime("maximum recursion depth exceeded".into()));
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let budget = Budget::new(
            Instant::now() + Duration::from_millis(50),
            Arc::new(AtomicBool::new(false)),
            1000,
        );
        let body = "while (true) { n += 1; }";
        let result = run_with(body, &["n"], vec![Dyn::Int(0)], Dialect::Python, budget);
        assert_eq!(result.unwrap_err(), Trap::Timeout);
    }

    #[test]
    fn test_cancellation_observed() {
        let cancel = Arc::new(AtomicBool::new(true));
        let budget = Budget::new(Instant::now() + Duration::from_secs(5), cancel, 1000);
        let body = "while (true) { }";
        let result = run_with(body, &["n"], vec![Dyn::Int(0)], Dialect::Python, budget);
        assert_eq!(result.unwrap_err(), Trap::Cancelled);
    }

    #[test]
    fn test_map_counting_with_default() {
        let body = r#"let counts = new_map(0);
            for (c of s) { counts[c] += 1; }
            return counts["a"];"#;
        let result = run(body, &["s"], vec![Dyn::str("banana")], Dialect::Python);
        assert!(matches!(result, Ok(Dyn::Int(3))));
    }

    #[test]
    fn test_string_index_assignment_in_c_family() {
        let body = "s[0] = 'J'; return s;";
        let result = run(body, &["s"], vec![Dyn::str("java")], Dialect::CFamily).unwrap();
        assert_eq!(result.render(), "Java");
        assert!(run(body, &["s"], vec![Dyn::str("java")], Dialect::Python).is_err());
    }

    #[test]
    fn test_postfix_and_prefix_steps() {
        let body = "let a = [0, 0]; let i = 0; a[i++] = 5; a[i] = i + 1; return a;";
        let result = run(body, &["n"], vec![Dyn::Null], Dialect::CFamily).unwrap();
        assert_eq!(result.render(), "[5, 2]");
    }

    #[test]
    fn test_destructuring_swap() {
        let body = "let a = 1; let b = 2; [a, b] = [b, a]; return [a, b];";
        assert_eq!(run(body, &["n"], vec![Dyn::Null], Dialect::Python).unwrap().render(), "[2, 1]");
    }

    #[test]
    fn test_unassigned_variable_faults() {
        let body = "if (n > 0) { x = 1; } return x;";
        let err = run(body, &["n"], vec![Dyn::Int(0)], Dialect::Python).unwrap_err();
        assert_eq!(err, Trap::Runtime("variable 'x' used before assignment".into()));
    }

    #[test]
    fn test_short_circuit_returns_operands() {
        let either = run("return n || 7;", &["n"], vec![Dyn::Int(0)], Dialect::Python);
        assert!(matches!(either, Ok(Dyn::Int(7))));
        // right side would fault if evaluated
        let both = run("return n && 1 / 0;", &["n"], vec![Dyn::Int(0)], Dialect::Python);
        assert!(matches!(both, Ok(Dyn::Int(0))));
    }

    #[test]
    fn test_lazy_range_iteration() {
        let body = "let total = 0; for (i of range(n, 0, -1)) { total += i; } return total;";
        // larger than the collection limit, still fine when walked lazily
        let result = run(body, &["n"], vec![Dyn::Int(200_000)], Dialect::Python);
        assert!(matches!(result, Ok(Dyn::Int(20_000_100_000))));
    }
}
