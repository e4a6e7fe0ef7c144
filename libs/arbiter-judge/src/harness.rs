/// Test Harness - drives one submission through the judging pipeline
///
/// **Phases:**
/// `Pending -> Extracting -> Normalizing -> Running(0..n) -> Completed`
///
/// - Extraction, normalization and substrate preparation happen once. If any
///   of them fails, every case gets a synthetic failing result carrying that
///   fault and nothing executes.
/// - `Running(i)` isolates cases: a fault fails case `i` only and the next
///   case still runs.
/// - `Completed` always holds exactly one result per case, in case order.
///
/// **Critical Architectural Boundary:**
/// - Harness knows the order of operations and builds `TestResult`s
/// - Sandbox knows how to execute
/// - Comparator knows what "equal" means
use crate::binder;
use crate::comparator;
use crate::config::JudgeConfig;
use crate::extractor::{self, ExtractedMethod};
use crate::normalizer::{self, NormalizedFunction};
use crate::sandbox::Sandbox;
use arbiter_common::types::{
    Actual, Fault, Judgement, Language, Problem, Submission, TestCase, TestResult,
};
use tracing::{debug, info, warn};

/// Where a judging run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JudgePhase {
    Pending,
    Extracting,
    Normalizing,
    /// Executing the case at this 0-based index
    Running(usize),
    Completed,
}

impl JudgePhase {
    pub fn can_advance_to(&self, next: JudgePhase) -> bool {
        use JudgePhase::*;
        match (*self, next) {
            (Pending, Extracting) => true,
            (Extracting, Normalizing) | (Extracting, Completed) => true,
            (Normalizing, Running(0)) | (Normalizing, Completed) => true,
            (Running(i), Running(j)) => j == i + 1,
            (Running(_), Completed) => true,
            _ => false,
        }
    }
}

/// Phase tracker for one run
#[derive(Debug)]
struct RunState {
    phase: JudgePhase,
}

impl RunState {
    fn new() -> Self {
        Self {
            phase: JudgePhase::Pending,
        }
    }

    fn advance(&mut self, next: JudgePhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal judge phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(from = ?self.phase, to = ?next, "Judge phase transition");
        self.phase = next;
    }
}

/// Everything built once per submission before any case runs
#[derive(Debug, Clone)]
pub struct Prepared {
    pub method: ExtractedMethod,
    pub function: NormalizedFunction,
    pub sandbox: Sandbox,
}

/// Stateless judging engine; safe to share across concurrent runs
#[derive(Debug, Clone, Default)]
pub struct Judge {
    config: JudgeConfig,
}

impl Judge {
    pub fn new(config: JudgeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Extract the entry point and rewrite it, without compiling
    pub fn normalize(
        &self,
        source_code: &str,
        language: Language,
        entry_point: &str,
    ) -> Result<(ExtractedMethod, NormalizedFunction), Fault> {
        let method = extractor::extract(
            source_code,
            language,
            entry_point,
            self.config.max_source_bytes,
        )?;
        let function = normalizer::normalize(&method);
        Ok((method, function))
    }

    /// Run the submission-level phases. The state machine is advanced by the caller.
    fn prepare_phased(
        &self,
        source_code: &str,
        language: Language,
        entry_point: &str,
        state: &mut RunState,
    ) -> Result<Prepared, Fault> {
        state.advance(JudgePhase::Extracting);
        let method = extractor::extract(
            source_code,
            language,
            entry_point,
            self.config.max_source_bytes,
        )?;
        debug!(
            method = %method.name,
            params = ?method.param_names(),
            "Extracted entry point"
        );

        state.advance(JudgePhase::Normalizing);
        let function = normalizer::normalize(&method);
        if !function.untranslated.is_empty() {
            // the substrate decides whether these are fatal
            debug!(
                untranslated = ?function.untranslated,
                "Normalizer left constructs untranslated"
            );
        }
        let sandbox = Sandbox::prepare(&function, &self.config)?;

        Ok(Prepared {
            method,
            function,
            sandbox,
        })
    }

    /// Extract, normalize and compile a submission in one step
    pub fn prepare(
        &self,
        source_code: &str,
        language: Language,
        entry_point: &str,
    ) -> Result<Prepared, Fault> {
        self.prepare_phased(source_code, language, entry_point, &mut RunState::new())
    }

    /// Judge a submission against every case of a problem.
    ///
    /// Always returns one result per case, in case order.
    pub async fn judge(
        &self,
        problem: &Problem,
        source_code: &str,
        language: Language,
    ) -> Vec<TestResult> {
        let mut state = RunState::new();
        info!(
            problem_id = %problem.id,
            language = %language,
            cases = problem.test_cases.len(),
            "Judging submission"
        );

        let phased = self.prepare_phased(source_code, language, &problem.entry_point, &mut state);
        let prepared = match phased {
            Ok(prepared) => prepared,
            Err(fault) => {
                warn!(
                    problem_id = %problem.id,
                    fault = %fault,
                    "Submission rejected before execution"
                );
                state.advance(JudgePhase::Completed);
                return synthetic_failures(&problem.test_cases, fault);
            }
        };

        let timeout = self.config.case_timeout(problem.time_limit_ms);
        let grace = self.config.grace();
        let params = prepared.method.param_names();
        let mut results = Vec::with_capacity(problem.test_cases.len());

        for (index, case) in problem.test_cases.iter().enumerate() {
            state.advance(JudgePhase::Running(index));

            let (actual, execution_time_ms) = match binder::bind(&params, &case.input) {
                Ok(args) => {
                    let run = prepared.sandbox.run(args, timeout, grace).await;
                    (run.actual, run.execution_time_ms)
                }
                Err(fault) => (Actual::Fault(fault), 0),
            };
            let passed = comparator::evaluate(&actual, &case.output);

            match actual.fault() {
                Some(fault) => debug!(case = index + 1, fault = %fault, "Case faulted"),
                None if passed => debug!(case = index + 1, execution_time_ms, "Case passed"),
                None => debug!(
                    case = index + 1,
                    expected = %case.output,
                    actual = %actual,
                    "Output mismatch"
                ),
            }

            results.push(TestResult {
                case_number: index + 1,
                passed,
                expected: case.output.clone(),
                actual,
                input: case.input.clone(),
                execution_time_ms,
            });
        }

        state.advance(JudgePhase::Completed);
        results
    }

    /// Judge and aggregate into a verdict
    pub async fn judge_submission(&self, problem: &Problem, submission: &Submission) -> Judgement {
        let results = self
            .judge(problem, &submission.source_code, submission.language)
            .await;
        let judgement = Judgement::from_results(results);
        info!(
            problem_id = %problem.id,
            language = %submission.language,
            verdict = %judgement.verdict,
            passed = judgement.passed_count,
            total = judgement.total_count,
            "Judging complete"
        );
        judgement
    }
}

/// One failing result per case, all carrying the same submission-level fault
fn synthetic_failures(cases: &[TestCase], fault: Fault) -> Vec<TestResult> {
    cases
        .iter()
        .enumerate()
        .map(|(index, case)| TestResult {
            case_number: index + 1,
            passed: false,
            expected: case.output.clone(),
            actual: Actual::Fault(fault.clone()),
            input: case.input.clone(),
            execution_time_ms: 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use JudgePhase::*;
        assert!(Pending.can_advance_to(Extracting));
        assert!(Extracting.can_advance_to(Completed));
        assert!(Normalizing.can_advance_to(Running(0)));
        assert!(Running(0).can_advance_to(Running(1)));
        assert!(Running(3).can_advance_to(Completed));
    }

    #[test]
    fn test_illegal_transitions() {
        use JudgePhase::*;
        assert!(!Pending.can_advance_to(Running(0)));
        assert!(!Normalizing.can_advance_to(Running(1)));
        assert!(!Running(1).can_advance_to(Running(1)));
        assert!(!Completed.can_advance_to(Extracting));
    }

    #[test]
    fn test_synthetic_failures_cover_every_case() {
        let cases = vec![
            TestCase {
                input: Default::default(),
                output: arbiter_common::types::Value::Int(1),
            },
            TestCase {
                input: Default::default(),
                output: arbiter_common::types::Value::Int(2),
            },
        ];
        let results = synthetic_failures(&cases, Fault::Extraction("no solution provided".into()));
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].case_number, 2);
        assert!(results.iter().all(|r| !r.passed));
    }
}
