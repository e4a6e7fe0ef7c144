use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Source languages accepted by the judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Java, Language::Python, Language::Cpp];

    /// Conventional source file extension, used by the CLI when guessing a language
    pub fn file_extension(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Python => "py",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Java => write!(f, "java"),
            Language::Python => write!(f, "python"),
            Language::Cpp => write!(f, "cpp"),
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "java" => Ok(Language::Java),
            "python" | "python3" | "py" => Ok(Language::Python),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Structural test value.
///
/// Closed sum type over everything a test case can carry. Serialized as
/// plain JSON: integers land in `Int`, numbers with a fraction or exponent
/// in `Float`. Mappings are ordered so rendering is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Seq(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One input/expected-output pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: BTreeMap<String, Value>,
    pub output: Value,
}

/// Immutable problem definition, shared read-only across judging runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub category: String,
    pub difficulty: Difficulty,
    /// Canonical method name the extractor looks for
    pub entry_point: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub templates: BTreeMap<Language, String>,
    #[serde(default)]
    pub solutions: BTreeMap<Language, String>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

/// A judging request as handed over by the submitter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub problem_id: String,
    pub language: Language,
    pub source_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    Extraction,
    Syntax,
    Runtime,
    Timeout,
    Arity,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::Extraction => "extraction",
            FaultKind::Syntax => "syntax",
            FaultKind::Runtime => "runtime",
            FaultKind::Timeout => "timeout",
            FaultKind::Arity => "arity",
        };
        write!(f, "{}", s)
    }
}

/// Why a case produced no comparable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Fault {
    /// No recognizable solution method, or an empty body
    #[error("extraction error: {0}")]
    Extraction(String),
    /// The normalized body is not valid in the execution substrate
    #[error("syntax fault: {0}")]
    Syntax(String),
    #[error("runtime fault: {0}")]
    Runtime(String),
    #[error("timeout fault: {0}")]
    Timeout(String),
    /// A declared parameter has no matching input field
    #[error("arity mismatch: {0}")]
    Arity(String),
}

impl Fault {
    pub fn kind(&self) -> FaultKind {
        match self {
            Fault::Extraction(_) => FaultKind::Extraction,
            Fault::Syntax(_) => FaultKind::Syntax,
            Fault::Runtime(_) => FaultKind::Runtime,
            Fault::Timeout(_) => FaultKind::Timeout,
            Fault::Arity(_) => FaultKind::Arity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Fault::Extraction(m)
            | Fault::Syntax(m)
            | Fault::Runtime(m)
            | Fault::Timeout(m)
            | Fault::Arity(m) => m,
        }
    }

    /// Faults raised before any case runs
    pub fn is_submission_level(&self) -> bool {
        matches!(self, Fault::Extraction(_) | Fault::Syntax(_))
    }
}

/// Actual outcome of a case: a returned value or a fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actual {
    Value(Value),
    Fault(Fault),
}

impl Actual {
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Actual::Fault(f) => Some(f),
            Actual::Value(_) => None,
        }
    }
}

impl fmt::Display for Actual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actual::Value(v) => write!(f, "{}", v),
            Actual::Fault(fault) => write!(f, "{}", fault),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// 1-based position of the case in the problem
    pub case_number: usize,
    pub passed: bool,
    pub expected: Value,
    pub actual: Actual,
    pub input: BTreeMap<String, Value>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    CompilationError,
}

impl Verdict {
    /// Derive the submission verdict from ordered case results.
    ///
    /// Submission-level faults win; otherwise the first failing case decides.
    pub fn from_results(results: &[TestResult]) -> Verdict {
        if results
            .iter()
            .any(|r| r.actual.fault().is_some_and(Fault::is_submission_level))
        {
            return Verdict::CompilationError;
        }

        match results.iter().find(|r| !r.passed) {
            None => Verdict::Accepted,
            Some(failed) => match failed.actual.fault().map(Fault::kind) {
                Some(FaultKind::Timeout) => Verdict::TimeLimitExceeded,
                Some(FaultKind::Runtime) | Some(FaultKind::Arity) => Verdict::RuntimeError,
                Some(FaultKind::Extraction) | Some(FaultKind::Syntax) => Verdict::CompilationError,
                None => Verdict::WrongAnswer,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::WrongAnswer => "wrong_answer",
            Verdict::RuntimeError => "runtime_error",
            Verdict::TimeLimitExceeded => "time_limit_exceeded",
            Verdict::CompilationError => "compilation_error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate produced by the harness for one submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgement {
    pub verdict: Verdict,
    pub passed_count: usize,
    pub total_count: usize,
    pub results: Vec<TestResult>,
}

impl Judgement {
    pub fn from_results(results: Vec<TestResult>) -> Self {
        Self {
            verdict: Verdict::from_results(&results),
            passed_count: results.iter().filter(|r| r.passed).count(),
            total_count: results.len(),
            results,
        }
    }

    pub fn accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

/// Queue payload pushed by the submission source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionJob {
    pub id: Uuid,
    pub problem_id: String,
    pub language: Language,
    pub source_code: String,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionJob {
    pub fn new(submission: Submission) -> Self {
        Self {
            id: Uuid::new_v4(),
            problem_id: submission.problem_id,
            language: submission.language,
            source_code: submission.source_code,
            submitted_at: Utc::now(),
        }
    }

    pub fn submission(&self) -> Submission {
        Submission {
            problem_id: self.problem_id.clone(),
            language: self.language,
            source_code: self.source_code.clone(),
        }
    }
}

/// What the worker hands to the progress/persistence service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeReport {
    pub submission_id: Uuid,
    pub problem_id: String,
    pub language: Language,
    pub verdict: Verdict,
    pub passed_count: usize,
    pub total_count: usize,
    pub results: Vec<TestResult>,
    pub judged_at: DateTime<Utc>,
}

impl JudgeReport {
    pub fn new(job: &SubmissionJob, judgement: Judgement) -> Self {
        Self {
            submission_id: job.id,
            problem_id: job.problem_id.clone(),
            language: job.language,
            verdict: judgement.verdict,
            passed_count: judgement.passed_count,
            total_count: judgement.total_count,
            results: judgement.results,
            judged_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(case_number: usize, passed: bool, actual: Actual) -> TestResult {
        TestResult {
            case_number,
            passed,
            expected: Value::Int(1),
            actual,
            input: BTreeMap::new(),
            execution_time_ms: 0,
        }
    }

    #[test]
    fn test_value_json_integers_stay_integers() {
        let v: Value = serde_json::from_str("[1, 2.5, true, null, \"x\"]").unwrap();
        assert_eq!(
            v,
            Value::Seq(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Bool(true),
                Value::Null,
                Value::Str("x".to_string()),
            ])
        );
    }

    #[test]
    fn test_value_json_float_with_zero_fraction() {
        let v: Value = serde_json::from_str("2.0").unwrap();
        assert_eq!(v, Value::Float(2.0));
    }

    #[test]
    fn test_value_display() {
        let v: Value = serde_json::from_str(r#"{"b": [1, 2], "a": 1.0}"#).unwrap();
        assert_eq!(v.to_string(), r#"{"a": 1.0, "b": [1, 2]}"#);
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("Python3".parse::<Language>(), Ok(Language::Python));
        assert_eq!("c++".parse::<Language>(), Ok(Language::Cpp));
        assert_eq!("java".parse::<Language>(), Ok(Language::Java));
        assert!("rust".parse::<Language>().is_err());
    }

    #[test]
    fn test_language_serde_lowercase() {
        let json = serde_json::to_string(&Language::Cpp).unwrap();
        assert_eq!(json, "\"cpp\"");
    }

    #[test]
    fn test_fault_wire_format() {
        let json = serde_json::to_value(Fault::Runtime("division by zero".into())).unwrap();
        assert_eq!(json["kind"], "runtime");
        assert_eq!(json["message"], "division by zero");
    }

    #[test]
    fn test_verdict_all_passed() {
        let results = vec![
            result(1, true, Actual::Value(Value::Int(1))),
            result(2, true, Actual::Value(Value::Int(1))),
        ];
        assert_eq!(Verdict::from_results(&results), Verdict::Accepted);
    }

    #[test]
    fn test_verdict_empty_is_accepted() {
        assert_eq!(Verdict::from_results(&[]), Verdict::Accepted);
    }

    #[test]
    fn test_verdict_first_failure_decides() {
        let results = vec![
            result(1, true, Actual::Value(Value::Int(1))),
            result(2, false, Actual::Fault(Fault::Timeout("2000ms".into()))),
            result(3, false, Actual::Value(Value::Int(3))),
        ];
        assert_eq!(Verdict::from_results(&results), Verdict::TimeLimitExceeded);
    }

    #[test]
    fn test_verdict_arity_is_runtime_error() {
        let results = vec![result(1, false, Actual::Fault(Fault::Arity("nums".into())))];
        assert_eq!(Verdict::from_results(&results), Verdict::RuntimeError);
    }

    #[test]
    fn test_verdict_extraction_is_compilation_error() {
        let results = vec![
            result(1, false, Actual::Fault(Fault::Extraction("no solution provided".into()))),
            result(2, false, Actual::Fault(Fault::Extraction("no solution provided".into()))),
        ];
        assert_eq!(Verdict::from_results(&results), Verdict::CompilationError);
    }

    #[test]
    fn test_verdict_wire_format() {
        let json = serde_json::to_string(&Verdict::TimeLimitExceeded).unwrap();
        assert_eq!(json, "\"time_limit_exceeded\"");
    }

    #[test]
    fn test_judgement_counts() {
        let judgement = Judgement::from_results(vec![
            result(1, true, Actual::Value(Value::Int(1))),
            result(2, false, Actual::Value(Value::Int(2))),
        ]);
        assert_eq!(judgement.passed_count, 1);
        assert_eq!(judgement.total_count, 2);
        assert_eq!(judgement.verdict, Verdict::WrongAnswer);
        assert!(!judgement.accepted());
    }
}
