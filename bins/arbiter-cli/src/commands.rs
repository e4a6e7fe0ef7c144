// CLI commands for judging submissions and checking the problem catalog
use anyhow::{bail, Context, Result};
use arbiter_common::catalog::{JsonCatalog, ProblemCatalog};
use arbiter_common::types::{Judgement, Language, Problem, Submission, Verdict};
use arbiter_judge::{Judge, JudgeConfig};
use std::fs;
use std::path::Path;
use std::sync::Arc;

fn load_catalog(catalog_path: &Path) -> Result<JsonCatalog> {
    JsonCatalog::load(catalog_path)
        .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))
}

fn find_problem(catalog: &JsonCatalog, problem_id: &str) -> Result<Arc<Problem>> {
    match catalog.get(problem_id) {
        Some(problem) => Ok(problem),
        None => bail!(
            "Unknown problem '{}'. Available: {}",
            problem_id,
            catalog.ids().join(", ")
        ),
    }
}

/// Resolve the language from the flag, falling back to the file extension
pub fn resolve_language(explicit: Option<&str>, file: &Path) -> Result<Language> {
    if let Some(name) = explicit {
        return name.parse().map_err(|e: String| anyhow::anyhow!(e));
    }
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match Language::ALL.iter().find(|l| l.file_extension() == ext) {
        Some(language) => Ok(*language),
        None => bail!(
            "Cannot infer language from '{}'; pass --language java|python|cpp",
            file.display()
        ),
    }
}

fn print_judgement(problem: &Problem, language: Language, judgement: &Judgement) {
    println!("⚖️  {} ({}) in {}\n", problem.title, problem.id, language);
    for result in &judgement.results {
        let mark = if result.passed { "✅" } else { "❌" };
        println!(
            "  {} Case {:<3} {:>5} ms  expected {}  got {}",
            mark, result.case_number, result.execution_time_ms, result.expected, result.actual
        );
    }
    println!(
        "\n{} Verdict: {} ({}/{} passed)",
        if judgement.accepted() { "✅" } else { "❌" },
        judgement.verdict,
        judgement.passed_count,
        judgement.total_count
    );
}

/// Judge a local source file against a catalog problem
pub async fn judge_file(
    catalog_path: &Path,
    problem_id: &str,
    file: &Path,
    language: Option<&str>,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<Verdict> {
    let catalog = load_catalog(catalog_path)?;
    let problem = find_problem(&catalog, problem_id)?;
    let language = resolve_language(language, file)?;
    let source_code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut config = JudgeConfig::default();
    if let Some(ms) = timeout_ms {
        config.timeout_ms = ms;
    }
    let submission = Submission {
        problem_id: problem.id.clone(),
        language,
        source_code,
    };
    let judgement = Judge::new(config).judge_submission(&problem, &submission).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&judgement).context("Failed to serialize judgement")?
        );
    } else {
        print_judgement(&problem, language, &judgement);
    }
    Ok(judgement.verdict)
}

/// Print a problem's starter template
pub fn print_template(catalog_path: &Path, problem_id: &str, language: &str) -> Result<()> {
    let catalog = load_catalog(catalog_path)?;
    let problem = find_problem(&catalog, problem_id)?;
    let language: Language = language.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    match problem.templates.get(&language) {
        Some(template) => {
            print!("{}", template);
            Ok(())
        }
        None => bail!("Problem '{}' has no {} template", problem.id, language),
    }
}

/// Show what the normalizer makes of a source file
pub fn print_normalized(file: &Path, language: Option<&str>, entry_point: &str) -> Result<()> {
    let language = resolve_language(language, file)?;
    let source_code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let judge = Judge::default();
    let (method, function) = judge
        .normalize(&source_code, language, entry_point)
        .map_err(|fault| anyhow::anyhow!(fault))?;

    println!("📋 {}({})", method.name, method.param_names().join(", "));
    if let Some(return_type) = &method.return_type {
        println!("   returns {}", return_type);
    }
    println!("{}", "─".repeat(60));
    println!("{}", function.text);
    println!("{}", "─".repeat(60));

    if !function.untranslated.is_empty() {
        println!("⚠️  Left untranslated:");
        for item in &function.untranslated {
            println!("  - {}", item);
        }
    }
    match judge.prepare(&source_code, language, entry_point) {
        Ok(_) => println!("✅ Compiles in the substrate"),
        Err(fault) => println!("❌ {}", fault),
    }
    Ok(())
}

/// Outcome of validating one problem
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub checked: usize,
    pub failures: Vec<String>,
}

/// Check every problem: reference solutions must be accepted and untouched
/// templates must be reported as "no solution provided"
pub async fn validate_catalog(catalog: &JsonCatalog, judge: &Judge) -> ValidationReport {
    let mut report = ValidationReport::default();
    for id in catalog.ids() {
        let Some(problem) = catalog.get(&id) else {
            continue;
        };
        if problem.test_cases.is_empty() {
            report.failures.push(format!("{}: no test cases", id));
        }
        for (language, source_code) in &problem.solutions {
            report.checked += 1;
            let submission = Submission {
                problem_id: id.clone(),
                language: *language,
                source_code: source_code.clone(),
            };
            let judgement = judge.judge_submission(&problem, &submission).await;
            if !judgement.accepted() {
                let detail = judgement
                    .results
                    .iter()
                    .find(|r| !r.passed)
                    .map(|r| {
                        format!(
                            "case {}: expected {}, got {}",
                            r.case_number, r.expected, r.actual
                        )
                    })
                    .unwrap_or_default();
                report.failures.push(format!(
                    "{} [{}] solution: {} ({})",
                    id, language, judgement.verdict, detail
                ));
            }
        }
        for (language, template) in &problem.templates {
            report.checked += 1;
            if let Err(fault) = judge.normalize(template, *language, &problem.entry_point) {
                if fault.message() == arbiter_judge::extractor::NO_SOLUTION {
                    continue;
                }
                report.failures.push(format!("{} [{}] template: {}", id, language, fault));
            } else {
                report
                    .failures
                    .push(format!("{} [{}] template: body is not empty", id, language));
            }
        }
    }
    report
}

pub async fn validate(catalog_path: &Path) -> Result<()> {
    println!("🔍 Validating catalog {}", catalog_path.display());
    let catalog = load_catalog(catalog_path)?;
    let report = validate_catalog(&catalog, &Judge::default()).await;

    if report.failures.is_empty() {
        println!(
            "\n✅ {} problem(s), {} solution/template check(s) passed",
            catalog.len(),
            report.checked
        );
        return Ok(());
    }
    for failure in &report.failures {
        println!("  ❌ {}", failure);
    }
    bail!("{} of {} check(s) failed", report.failures.len(), report.checked)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "problems": [{
            "id": "max-of-two",
            "title": "Max of Two",
            "category": "math",
            "difficulty": "easy",
            "entry_point": "maxOfTwo",
            "test_cases": [
                {"input": {"a": 1, "b": 2}, "output": 2},
                {"input": {"a": 5, "b": -3}, "output": 5}
            ],
            "templates": {
                "python": "class Solution:\n    def maxOfTwo(self, a, b):\n        pass\n",
                "java": "class Solution {\n    public int maxOfTwo(int a, int b) {\n        // your code here\n    }\n}\n"
            },
            "solutions": {
                "python": "class Solution:\n    def maxOfTwo(self, a, b):\n        return a if a > b else b\n",
                "cpp": "class Solution {\npublic:\n    int maxOfTwo(int a, int b) {\n        return max(a, b);\n    }\n};\n"
            }
        }]
    }"#;

    #[test]
    fn test_resolve_language() {
        assert_eq!(resolve_language(None, Path::new("a/Solution.java")).unwrap(), Language::Java);
        assert_eq!(resolve_language(None, Path::new("sol.py")).unwrap(), Language::Python);
        assert_eq!(resolve_language(Some("c++"), Path::new("x.txt")).unwrap(), Language::Cpp);
        assert!(resolve_language(None, Path::new("x.txt")).is_err());
    }

    #[tokio::test]
    async fn test_validate_catalog_passes() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let report = validate_catalog(&catalog, &Judge::default()).await;
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.checked, 4);
    }

    #[tokio::test]
    async fn test_validate_catalog_reports_wrong_solution() {
        let broken = CATALOG.replace("return a if a > b else b", "return a");
        let catalog = JsonCatalog::from_json(&broken).unwrap();
        let report = validate_catalog(&catalog, &Judge::default()).await;
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].contains("wrong_answer"));
    }

    #[tokio::test]
    async fn test_repository_catalog_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/problems.json");
        let catalog = JsonCatalog::load(&path).unwrap();
        let report = validate_catalog(&catalog, &Judge::default()).await;
        assert!(report.failures.is_empty(), "{:#?}", report.failures);
    }
}
