//! End-to-end judging scenarios
//!
//! These run real submissions in all three languages through extraction,
//! normalization, the substrate and the comparator.

#[cfg(test)]
mod judging_scenarios {
    use crate::config::JudgeConfig;
    use crate::harness::Judge;
    use arbiter_common::types::{
        Actual, Difficulty, Fault, Language, Problem, Submission, TestCase, Value, Verdict,
    };
    use std::collections::BTreeMap;
    use std::time::{Duration, Instant};

    fn judge() -> Judge {
        Judge::new(JudgeConfig {
            timeout_ms: 300,
            grace_ms: 200,
            stack_size_bytes: 16 * 1024 * 1024,
            ..JudgeConfig::default()
        })
    }

    fn case(input: &str, output: &str) -> TestCase {
        TestCase {
            input: serde_json::from_str::<BTreeMap<String, Value>>(input).unwrap(),
            output: serde_json::from_str(output).unwrap(),
        }
    }

    fn problem(entry_point: &str, test_cases: Vec<TestCase>) -> Problem {
        Problem {
            id: entry_point.to_string(),
            title: entry_point.to_string(),
            category: "test".to_string(),
            difficulty: Difficulty::Easy,
            entry_point: entry_point.to_string(),
            test_cases,
            templates: BTreeMap::new(),
            solutions: BTreeMap::new(),
            time_limit_ms: None,
        }
    }

    fn two_sum() -> Problem {
        problem(
            "twoSum",
            vec![
                case(r#"{"nums": [2, 7, 11, 15], "target": 9}"#, "[0, 1]"),
                case(r#"{"nums": [3, 2, 4], "target": 6}"#, "[1, 2]"),
                case(r#"{"nums": [3, 3], "target": 6}"#, "[0, 1]"),
            ],
        )
    }

    const JAVA_TWO_SUM: &str = r#"
import java.util.*;

class Solution {
    public int[] twoSum(int[] nums, int target) {
        Map<Integer, Integer> seen = new HashMap<>();
        for (int i = 0; i < nums.length; i++) {
            int complement = target - nums[i];
            if (seen.containsKey(complement)) {
                return new int[] { seen.get(complement), i };
            }
            seen.put(nums[i], i);
        }
        return new int[0];
    }
}
"#;

    const PYTHON_TWO_SUM: &str = r#"
class Solution:
    def twoSum(self, nums, target):
        seen = {}
        for i, n in enumerate(nums):
            if target - n in seen:
                return [seen[target - n], i]
            seen[n] = i
        return []
"#;

    const CPP_TWO_SUM: &str = r#"
#include <vector>
#include <unordered_map>
using namespace std;

class Solution {
public:
    vector<int> twoSum(vector<int>& nums, int target) {
        unordered_map<int, int> seen;
        for (int i = 0; i < nums.size(); i++) {
            int complement = target - nums[i];
            if (seen.count(complement)) {
                return {seen[complement], i};
            }
            seen[nums[i]] = i;
        }
        return {};
    }
};
"#;

    #[tokio::test]
    async fn test_two_sum_accepted_in_every_language() {
        let problem = two_sum();
        for (language, source) in [
            (Language::Java, JAVA_TWO_SUM),
            (Language::Python, PYTHON_TWO_SUM),
            (Language::Cpp, CPP_TWO_SUM),
        ] {
            let results = judge().judge(&problem, source, language).await;
            assert_eq!(results.len(), 3, "{}", language);
            for result in &results {
                assert!(
                    result.passed,
                    "{} case {}: {}",
                    language, result.case_number, result.actual
                );
            }
        }
    }

    #[tokio::test]
    async fn test_cpp_two_sum_with_find_iterator() {
        let source = r#"
class Solution {
public:
    vector<int> twoSum(vector<int>& nums, int target) {
        unordered_map<int, int> seen;
        for (int i = 0; i < nums.size(); i++) {
            auto it = seen.find(target - nums[i]);
            if (it != seen.end()) return {it->second, i};
            seen[nums[i]] = i;
        }
        return {};
    }
};
"#;
        let results = judge().judge(&two_sum(), source, Language::Cpp).await;
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[tokio::test]
    async fn test_java_string_builder_reverse_chain() {
        let problem = problem(
            "reverseString",
            vec![
                case(r#"{"s": "abc"}"#, r#""cba""#),
                case(r#"{"s": ""}"#, r#""""#),
            ],
        );
        let source = r#"
class Solution {
    public String reverseString(String s) {
        return new StringBuilder(s).reverse().toString();
    }
}
"#;
        let results = judge().judge(&problem, source, Language::Java).await;
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }

    #[tokio::test]
    async fn test_do_while_continue_rechecks_condition() {
        let problem = problem("count", vec![case(r#"{"n": 3}"#, "3"), case(r#"{"n": 0}"#, "1")]);
        let source = r#"
int count(int n) {
    int i = 0;
    do {
        i++;
        if (i < 100) continue;
    } while (i < n);
    return i;
}
"#;
        for language in [Language::Java, Language::Cpp] {
            let results = judge().judge(&problem, source, language).await;
            assert!(results.iter().all(|r| r.passed), "{}: {:?}", language, results);
        }
    }

    #[tokio::test]
    async fn test_int_overflow_is_not_accepted() {
        let problem = problem("next", vec![case(r#"{"a": 2147483647}"#, "2147483648")]);
        let source = "class S { public int next(int a) { return a + 1; } }";
        let results = judge().judge(&problem, source, Language::Java).await;
        assert!(!results[0].passed);
        assert!(matches!(results[0].actual, Actual::Fault(Fault::Runtime(_))));
    }

    #[tokio::test]
    async fn test_two_sum_reversed_answer_is_wrong() {
        let source = r#"
def twoSum(nums, target):
    for i in range(len(nums)):
        for j in range(i + 1, len(nums)):
            if nums[i] + nums[j] == target:
                return [j, i]
    return []
"#;
        let submission = Submission {
            problem_id: "twoSum".to_string(),
            language: Language::Python,
            source_code: source.to_string(),
        };
        let judgement = judge().judge_submission(&two_sum(), &submission).await;

        assert_eq!(judgement.verdict, Verdict::WrongAnswer);
        assert_eq!(judgement.passed_count, 0);
        assert_eq!(
            judgement.results[0].actual,
            Actual::Value(Value::Seq(vec![Value::Int(1), Value::Int(0)]))
        );
    }

    #[tokio::test]
    async fn test_empty_source_fails_every_case() {
        let problem = two_sum();
        for language in Language::ALL {
            let results = judge().judge(&problem, "   \n", language).await;
            assert_eq!(results.len(), 3);
            for (i, result) in results.iter().enumerate() {
                assert_eq!(result.case_number, i + 1);
                assert!(!result.passed);
                assert_eq!(
                    result.actual,
                    Actual::Fault(Fault::Extraction("no solution provided".to_string()))
                );
            }
        }
    }

    #[tokio::test]
    async fn test_untouched_template_is_compilation_error() {
        let template = "class Solution:\n    def twoSum(self, nums, target):\n        pass\n";
        let submission = Submission {
            problem_id: "twoSum".to_string(),
            language: Language::Python,
            source_code: template.to_string(),
        };
        let judgement = judge().judge_submission(&two_sum(), &submission).await;
        assert_eq!(judgement.verdict, Verdict::CompilationError);
        assert_eq!(judgement.total_count, 3);
    }

    #[tokio::test]
    async fn test_unknown_call_is_syntax_fault_for_every_case() {
        let source = "int twoSum(int[] nums, int target) { return launchMissiles(nums); }";
        let results = judge().judge(&two_sum(), source, Language::Java).await;
        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| matches!(r.actual, Actual::Fault(Fault::Syntax(_)))));
    }

    #[tokio::test]
    async fn test_division_by_zero_fails_only_that_case() {
        let problem = problem(
            "divide",
            vec![
                case(r#"{"a": 6, "b": 3}"#, "2"),
                case(r#"{"a": 1, "b": 0}"#, "0"),
                case(r#"{"a": 9, "b": 3}"#, "3"),
            ],
        );
        let source = r#"
class Solution {
    public int divide(int a, int b) {
        return a / b;
    }
}
"#;
        let results = judge().judge(&problem, source, Language::Java).await;

        assert!(results[0].passed);
        assert!(matches!(results[1].actual, Actual::Fault(Fault::Runtime(_))));
        assert!(!results[1].passed);
        assert!(results[2].passed);
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out_without_hanging() {
        let problem = problem(
            "spin",
            vec![case(r#"{"n": 1}"#, "1"), case(r#"{"n": 2}"#, "2")],
        );
        let sources = [
            (Language::Java, "int spin(int n) { int x = 0; while (true) { x++; } }"),
            (Language::Python, "def spin(n):\n    x = 0\n    while True:\n        x += 1\n"),
            (Language::Cpp, "int spin(int n) { int x = 0; for (;;) { x += 1; } return x; }"),
        ];
        for (language, source) in sources {
            let started = Instant::now();
            let results = judge().judge(&problem, source, language).await;
            assert!(started.elapsed() < Duration::from_secs(5), "{}", language);
            assert_eq!(results.len(), 2);
            for result in &results {
                assert!(
                    matches!(result.actual, Actual::Fault(Fault::Timeout(_))),
                    "{}: {}",
                    language,
                    result.actual
                );
            }
        }
    }

    #[tokio::test]
    async fn test_missing_input_is_arity_fault_for_that_case() {
        let problem = problem(
            "add",
            vec![case(r#"{"a": 1, "b": 2}"#, "3"), case(r#"{"a": 1}"#, "1")],
        );
        let judgement = judge()
            .judge_submission(
                &problem,
                &Submission {
                    problem_id: "add".to_string(),
                    language: Language::Python,
                    source_code: "def add(a, b):\n    return a + b\n".to_string(),
                },
            )
            .await;
        assert!(judgement.results[0].passed);
        assert!(matches!(judgement.results[1].actual, Actual::Fault(Fault::Arity(_))));
        assert_eq!(judgement.verdict, Verdict::RuntimeError);
    }

    #[tokio::test]
    async fn test_judging_is_deterministic() {
        let problem = two_sum();
        let first = judge().judge(&problem, PYTHON_TWO_SUM, Language::Python).await;
        let second = judge().judge(&problem, PYTHON_TWO_SUM, Language::Python).await;
        let outcomes = |results: &[arbiter_common::types::TestResult]| {
            results
                .iter()
                .map(|r| (r.case_number, r.passed, r.actual.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(outcomes(&first), outcomes(&second));
    }

    #[tokio::test]
    async fn test_zero_cases_is_vacuously_accepted() {
        let submission = Submission {
            problem_id: "noop".to_string(),
            language: Language::Python,
            source_code: "def noop():\n    return 1\n".to_string(),
        };
        let judgement = judge().judge_submission(&problem("noop", vec![]), &submission).await;
        assert_eq!(judgement.verdict, Verdict::Accepted);
        assert_eq!(judgement.total_count, 0);
    }

    #[tokio::test]
    async fn test_float_result_within_tolerance() {
        let problem = problem(
            "average",
            vec![
                case(r#"{"xs": [1, 2]}"#, "1.5"),
                case(r#"{"xs": [2, 2]}"#, "2.0"),
            ],
        );
        let source = r#"
class Solution {
    public double average(int[] xs) {
        int total = 0;
        for (int x : xs) total += x;
        return (double) total / xs.length;
    }
}
"#;
        let results = judge().judge(&problem, source, Language::Java).await;
        assert!(results.iter().all(|r| r.passed), "{:?}", results);
    }
}
