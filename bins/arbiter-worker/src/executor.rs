/// Job Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Turn one queued submission into a stored `JudgeReport`.
///
/// **Architecture:**
/// 1. Skip the job if the submitter cancelled it
/// 2. Look the problem up in the catalog
/// 3. Run the judge (extract, normalize, execute, compare)
/// 4. Record metrics and persist the report for the progress service
///
/// This module is the glue layer; it knows nothing about how code executes
/// or how results are compared.
use crate::metrics;
use anyhow::{Context, Result};
use arbiter_common::catalog::ProblemCatalog;
use arbiter_common::redis;
use arbiter_common::types::{JudgeReport, SubmissionJob};
use arbiter_judge::Judge;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What happened to a popped job
#[derive(Debug)]
pub enum JobOutcome {
    Judged(JudgeReport),
    Cancelled,
    UnknownProblem,
}

/// Judge a job without touching Redis
pub async fn judge_job(
    job: &SubmissionJob,
    catalog: &dyn ProblemCatalog,
    judge: &Judge,
) -> JobOutcome {
    let Some(problem) = catalog.get(&job.problem_id) else {
        warn!(
            submission_id = %job.id,
            problem_id = %job.problem_id,
            "Unknown problem; job dropped"
        );
        metrics::JOBS_SKIPPED.with_label_values(&["unknown_problem"]).inc();
        return JobOutcome::UnknownProblem;
    };

    let start = Instant::now();
    let judgement = judge.judge_submission(&problem, &job.submission()).await;
    let elapsed = start.elapsed();
    metrics::record_judgement(job.language, &judgement, elapsed);

    for result in &judgement.results {
        debug!(
            submission_id = %job.id,
            case = result.case_number,
            passed = result.passed,
            execution_ms = result.execution_time_ms,
            "Case result"
        );
    }
    info!(
        submission_id = %job.id,
        verdict = %judgement.verdict,
        passed = judgement.passed_count,
        total = judgement.total_count,
        execution_ms = elapsed.as_millis() as u64,
        "Submission judged"
    );

    JobOutcome::Judged(JudgeReport::new(job, judgement))
}

/// Full production path: cancellation check, judging, persistence
pub async fn execute_job(
    job: &SubmissionJob,
    catalog: &dyn ProblemCatalog,
    judge: &Judge,
    redis_conn: &mut ::redis::aio::ConnectionManager,
) -> Result<JobOutcome> {
    match redis::is_job_cancelled(redis_conn, &job.id).await {
        Ok(true) => {
            info!(submission_id = %job.id, "Submission cancelled before judging");
            metrics::JOBS_SKIPPED.with_label_values(&["cancelled"]).inc();
            redis::store_status(redis_conn, &job.id, redis::STATUS_CANCELLED)
                .await
                .with_context(|| format!("Failed to persist status for {}", job.id))?;
            return Ok(JobOutcome::Cancelled);
        }
        Ok(false) => {}
        Err(e) => {
            // judge anyway rather than drop a live submission
            warn!(submission_id = %job.id, error = %e, "Failed to check cancellation status");
        }
    }

    let outcome = judge_job(job, catalog, judge).await;
    match &outcome {
        JobOutcome::Judged(report) => redis::store_report(redis_conn, report)
            .await
            .with_context(|| format!("Failed to persist report for {}", job.id))?,
        // the progress service still needs a terminal state
        JobOutcome::UnknownProblem => {
            redis::store_status(redis_conn, &job.id, redis::STATUS_UNKNOWN_PROBLEM)
                .await
                .with_context(|| format!("Failed to persist status for {}", job.id))?
        }
        JobOutcome::Cancelled => {}
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_common::catalog::JsonCatalog;
    use arbiter_common::types::{Language, Submission, Verdict};

    const CATALOG: &str = r#"{
        "problems": [{
            "id": "square",
            "title": "Square",
            "category": "math",
            "difficulty": "easy",
            "entry_point": "square",
            "test_cases": [
                {"input": {"n": 3}, "output": 9},
                {"input": {"n": -4}, "output": 16}
            ]
        }]
    }"#;

    fn job(problem_id: &str, source: &str) -> SubmissionJob {
        SubmissionJob::new(Submission {
            problem_id: problem_id.to_string(),
            language: Language::Python,
            source_code: source.to_string(),
        })
    }

    #[tokio::test]
    async fn test_judge_job_produces_report() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let job = job("square", "def square(n):\n    return n * n\n");
        match judge_job(&job, &catalog, &Judge::default()).await {
            JobOutcome::Judged(report) => {
                assert_eq!(report.submission_id, job.id);
                assert_eq!(report.verdict, Verdict::Accepted);
                assert_eq!(report.passed_count, 2);
            }
            other => panic!("expected a report, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_problem_is_skipped() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let job = job("missing", "def square(n):\n    return n\n");
        assert!(matches!(
            judge_job(&job, &catalog, &Judge::default()).await,
            JobOutcome::UnknownProblem
        ));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_cancelled_job_is_not_judged() {
        let client = ::redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let mut conn = client.get_connection_manager().await.unwrap();
        let job = job("square", "def square(n):\n    return n * n\n");
        let _: () = ::redis::AsyncCommands::set(&mut conn, redis::cancel_key(&job.id), "1")
            .await
            .unwrap();

        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let outcome = execute_job(&job, &catalog, &Judge::default(), &mut conn).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Cancelled));
        assert_eq!(
            redis::get_status(&mut conn, &job.id).await.unwrap().as_deref(),
            Some(redis::STATUS_CANCELLED)
        );
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_unknown_problem_stores_terminal_status() {
        let client = ::redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let mut conn = client.get_connection_manager().await.unwrap();
        let job = job("missing", "def square(n):\n    return n\n");

        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let outcome = execute_job(&job, &catalog, &Judge::default(), &mut conn).await.unwrap();
        assert!(matches!(outcome, JobOutcome::UnknownProblem));
        assert_eq!(
            redis::get_status(&mut conn, &job.id).await.unwrap().as_deref(),
            Some(redis::STATUS_UNKNOWN_PROBLEM)
        );
        assert!(redis::get_report(&mut conn, &job.id).await.unwrap().is_none());
    }
}
