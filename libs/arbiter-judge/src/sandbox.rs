/// Execution Sandbox - runs a normalized function against one set of arguments
///
/// **Boundary:**
/// Only the bound arguments go in and only a value or a fault comes out.
/// The substrate has no builtins for files, network, environment, clock or
/// processes, so nothing else is reachable from a submission.
///
/// **Isolation:**
/// Every case runs on its own execution thread with a large stack, a fresh
/// interpreter and freshly converted arguments. Nothing survives between cases.
///
/// **Time limits:**
/// The interpreter checks its deadline and a cancellation flag as it runs,
/// so a runaway unit stops by itself. The caller additionally awaits the unit
/// with `tokio::time::timeout`; if the budget plus a grace period elapses
/// first, the flag is raised and the case is recorded as a timeout.
use crate::config::JudgeConfig;
use crate::normalizer::NormalizedFunction;
use crate::substrate::ast::Program;
use crate::substrate::value::MAX_CONVERT_DEPTH;
use crate::substrate::{self, Budget, Dialect, Dyn, Interpreter, Trap};
use arbiter_common::types::{Actual, Fault, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How the declared return type reshapes the returned value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    /// `double`, `float`, `List<Double>`: integers widen to floats
    Floating,
    /// `int`, `long`, `vector<int>`: characters and booleans become integers
    Integral,
    Other,
}

const FLOATING: &[&str] = &["double", "float", "Double", "Float"];
const INTEGRAL: &[&str] = &[
    "int", "long", "short", "byte", "Integer", "Long", "Short", "Byte", "size_t", "int64_t",
    "int32_t", "uint64_t", "uint32_t", "unsigned",
];

/// Bounds of a 32-bit `int` return; 64-bit arithmetic faults on its own
fn narrow_int_range(hint: Option<&str>) -> Option<(i64, i64)> {
    let words: Vec<&str> = hint?
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();
    if words.contains(&"long") {
        return None;
    }
    let unsigned = words.contains(&"unsigned");
    match *words.last()? {
        "uint32_t" | "unsigned" => Some((0, u32::MAX as i64)),
        "int" if unsigned => Some((0, u32::MAX as i64)),
        "int" | "Integer" | "int32_t" => Some((i32::MIN as i64, i32::MAX as i64)),
        _ => None,
    }
}

impl ReturnShape {
    /// Classify by the innermost scalar named in the type text
    pub fn from_type_hint(hint: Option<&str>) -> Self {
        let Some(hint) = hint else {
            return ReturnShape::Other;
        };
        let scalar = hint
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .filter(|w| !w.is_empty())
            .last();
        match scalar {
            Some(s) if FLOATING.contains(&s) => ReturnShape::Floating,
            Some(s) if INTEGRAL.contains(&s) => ReturnShape::Integral,
            _ => ReturnShape::Other,
        }
    }
}

/// A compiled function ready to be invoked once per case
#[derive(Debug, Clone)]
pub struct Sandbox {
    program: Arc<Program>,
    dialect: Dialect,
    shape: ReturnShape,
    /// Java/C++ `int` returns must fit in 32 bits
    int_range: Option<(i64, i64)>,
    max_call_depth: usize,
    max_collection_len: usize,
    stack_size_bytes: usize,
}

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRun {
    pub actual: Actual,
    pub execution_time_ms: u64,
}

impl Sandbox {
    /// Compile the normalized body. Anything the substrate rejects is a syntax fault.
    pub fn prepare(function: &NormalizedFunction, config: &JudgeConfig) -> Result<Self, Fault> {
        let program = substrate::compile(
            &function.name,
            &function.aliases,
            &function.params,
            &function.text,
        )
        .map_err(Fault::Syntax)?;

        Ok(Self {
            program: Arc::new(program),
            dialect: function.dialect,
            shape: ReturnShape::from_type_hint(function.return_type.as_deref()),
            int_range: match function.dialect {
                Dialect::CFamily => narrow_int_range(function.return_type.as_deref()),
                Dialect::Python => None,
            },
            max_call_depth: config.max_call_depth,
            max_collection_len: config.max_collection_len,
            stack_size_bytes: config.stack_size_bytes,
        })
    }

    pub fn arity(&self) -> usize {
        self.program.arity()
    }

    /// Invoke the function with positional arguments under a wall-clock budget
    pub async fn run(&self, args: Vec<Value>, timeout: Duration, grace: Duration) -> CaseRun {
        let started = Instant::now();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();

        let program = Arc::clone(&self.program);
        let dialect = self.dialect;
        let shape = self.shape;
        let int_range = self.int_range;
        let max_call_depth = self.max_call_depth;
        let budget = Budget::new(started + timeout, Arc::clone(&cancel), self.max_collection_len);

        let spawned = thread::Builder::new()
            .name("arbiter-case".to_string())
            .stack_size(self.stack_size_bytes)
            .spawn(move || {
                let args = args.iter().map(Dyn::from_value).collect();
                let mut interpreter = Interpreter::new(&program, dialect, budget, max_call_depth);
                let result = interpreter
                    .invoke(args)
                    .and_then(|value| {
                        export(value, shape, dialect, int_range).map_err(Trap::Runtime)
                    });
                // receiver is gone once the harness gave up on this case
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            warn!(error = %e, "Failed to start execution thread");
            return CaseRun {
                actual: Actual::Fault(Fault::Runtime(format!("failed to start execution: {}", e))),
                execution_time_ms: 0,
            };
        }

        let actual = match tokio::time::timeout(timeout + grace, rx).await {
            Ok(Ok(Ok(value))) => Actual::Value(value),
            Ok(Ok(Err(trap))) => Actual::Fault(trap_to_fault(trap, timeout)),
            Ok(Err(_)) => Actual::Fault(Fault::Runtime(
                "execution aborted unexpectedly".to_string(),
            )),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                debug!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Execution unit did not stop in time, cancelled"
                );
                Actual::Fault(timeout_fault(timeout))
            }
        };

        CaseRun {
            actual,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

fn timeout_fault(timeout: Duration) -> Fault {
    Fault::Timeout(format!("exceeded time limit of {} ms", timeout.as_millis()))
}

fn trap_to_fault(trap: Trap, timeout: Duration) -> Fault {
    match trap {
        Trap::Runtime(message) => Fault::Runtime(message),
        Trap::Timeout | Trap::Cancelled => timeout_fault(timeout),
    }
}

/// Convert the returned value to a shareable one, widened by the declared return type
fn export(
    value: Dyn,
    shape: ReturnShape,
    dialect: Dialect,
    int_range: Option<(i64, i64)>,
) -> Result<Value, String> {
    let value = match (shape, dialect) {
        (ReturnShape::Integral, Dialect::CFamily) => widen_integral(value, 0),
        _ => value,
    };
    let value = value.to_value()?;
    if let Some(range) = int_range {
        check_int_range(&value, range)?;
    }
    Ok(match shape {
        ReturnShape::Floating => widen_floating(value),
        _ => value,
    })
}

fn widen_integral(value: Dyn, depth: usize) -> Dyn {
    if depth > MAX_CONVERT_DEPTH {
        // left alone; conversion reports the nesting
        return value;
    }
    match value {
        Dyn::Char(c) => Dyn::Int(c as i64),
        Dyn::Bool(b) => Dyn::Int(b as i64),
        Dyn::List(items) => {
            let widened = items
                .borrow()
                .iter()
                .cloned()
                .map(|v| widen_integral(v, depth + 1))
                .collect();
            Dyn::list(widened)
        }
        other => other,
    }
}

fn check_int_range(value: &Value, (lo, hi): (i64, i64)) -> Result<(), String> {
    match value {
        Value::Int(n) if *n < lo || *n > hi => Err(format!(
            "integer overflow: {} does not fit the declared return type",
            n
        )),
        Value::Seq(items) => items.iter().try_for_each(|v| check_int_range(v, (lo, hi))),
        Value::Map(entries) => entries.values().try_for_each(|v| check_int_range(v, (lo, hi))),
        _ => Ok(()),
    }
}

fn widen_floating(value: Value) -> Value {
    match value {
        Value::Int(n) => Value::Float(n as f64),
        Value::Seq(items) => Value::Seq(items.into_iter().map(widen_floating).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, widen_floating(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(
        dialect: Dialect,
        params: &[&str],
        return_type: Option<&str>,
        text: &str,
    ) -> NormalizedFunction {
        NormalizedFunction {
            name: "solve".to_string(),
            aliases: Vec::new(),
            params: params.iter().map(|p| p.to_string()).collect(),
            return_type: return_type.map(str::to_string),
            dialect,
            text: text.to_string(),
            untranslated: Vec::new(),
        }
    }

    fn config() -> JudgeConfig {
        JudgeConfig {
            stack_size_bytes: 16 * 1024 * 1024,
            ..JudgeConfig::default()
        }
    }

    async fn run(f: &NormalizedFunction, args: Vec<Value>) -> Actual {
        let sandbox = Sandbox::prepare(f, &config()).unwrap();
        sandbox
            .run(args, Duration::from_millis(500), Duration::from_millis(200))
            .await
            .actual
    }

    #[test]
    fn test_return_shape() {
        assert_eq!(ReturnShape::from_type_hint(Some("double")), ReturnShape::Floating);
        assert_eq!(ReturnShape::from_type_hint(Some("List<Double>")), ReturnShape::Floating);
        assert_eq!(ReturnShape::from_type_hint(Some("vector<vector<int>>")), ReturnShape::Integral);
        assert_eq!(ReturnShape::from_type_hint(Some("long long")), ReturnShape::Integral);
        assert_eq!(ReturnShape::from_type_hint(Some("String")), ReturnShape::Other);
        assert_eq!(ReturnShape::from_type_hint(None), ReturnShape::Other);
    }

    #[test]
    fn test_narrow_int_range() {
        let int32 = Some((i32::MIN as i64, i32::MAX as i64));
        assert_eq!(narrow_int_range(Some("int")), int32);
        assert_eq!(narrow_int_range(Some("List<Integer>")), int32);
        assert_eq!(narrow_int_range(Some("unsigned int")), Some((0, u32::MAX as i64)));
        assert_eq!(narrow_int_range(Some("long long")), None);
        assert_eq!(narrow_int_range(Some("long")), None);
        assert_eq!(narrow_int_range(Some("double")), None);
    }

    #[tokio::test]
    async fn test_int_return_overflow_is_runtime_fault() {
        let f = function(Dialect::CFamily, &["a"], Some("int"), "return a + 1;");
        let actual = run(&f, vec![Value::Int(i32::MAX as i64)]).await;
        assert!(matches!(actual, Actual::Fault(Fault::Runtime(msg)) if msg.contains("overflow")));

        let widened = Actual::Value(Value::Int(2147483648));
        let f = function(Dialect::CFamily, &["a"], Some("long"), "return a + 1;");
        assert_eq!(run(&f, vec![Value::Int(i32::MAX as i64)]).await, widened);

        let f = function(Dialect::Python, &["a"], Some("int"), "return a + 1;");
        assert_eq!(run(&f, vec![Value::Int(i32::MAX as i64)]).await, widened);
    }

    #[test]
    fn test_unknown_call_is_syntax_fault() {
        let f = function(Dialect::CFamily, &[], None, "return launch(1);");
        assert!(matches!(Sandbox::prepare(&f, &config()), Err(Fault::Syntax(_))));
    }

    #[tokio::test]
    async fn test_returns_value() {
        let f = function(Dialect::CFamily, &["a", "b"], None, "return a + b;");
        assert_eq!(run(&f, vec![Value::Int(2), Value::Int(3)]).await, Actual::Value(Value::Int(5)));
    }

    #[tokio::test]
    async fn test_division_by_zero_is_runtime_fault() {
        let f = function(Dialect::CFamily, &["a", "b"], None, "return a / b;");
        let actual = run(&f, vec![Value::Int(1), Value::Int(0)]).await;
        assert!(matches!(actual, Actual::Fault(Fault::Runtime(_))));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let source = "let i = 0;\nwhile (true) {\n  i = i + 1;\n}";
        let f = function(Dialect::CFamily, &[], None, source);
        let sandbox = Sandbox::prepare(&f, &config()).unwrap();
        let started = Instant::now();
        let run = sandbox
            .run(Vec::new(), Duration::from_millis(100), Duration::from_millis(200))
            .await;
        assert!(matches!(run.actual, Actual::Fault(Fault::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_double_return_widens_int() {
        let f = function(Dialect::CFamily, &["n"], Some("double"), "return n;");
        assert_eq!(run(&f, vec![Value::Int(4)]).await, Actual::Value(Value::Float(4.0)));
    }

    #[tokio::test]
    async fn test_int_return_widens_char() {
        let f = function(Dialect::CFamily, &[], Some("int"), "return 'a';");
        assert_eq!(run(&f, vec![]).await, Actual::Value(Value::Int(97)));
    }

    #[tokio::test]
    async fn test_arguments_are_fresh_per_run() {
        let f = function(Dialect::CFamily, &["xs"], None, "push(xs, 1);\nreturn len(xs);");
        let sandbox = Sandbox::prepare(&f, &config()).unwrap();
        let args = vec![Value::Seq(vec![])];
        for _ in 0..2 {
            let run = sandbox
                .run(args.clone(), Duration::from_millis(500), Duration::from_millis(100))
                .await;
            assert_eq!(run.actual, Actual::Value(Value::Int(1)));
        }
    }
}
