use crate::types::{JudgeReport, Language, SubmissionJob};
use redis::{AsyncCommands, RedisResult};

/// Redis queue semantics shared by submitters, workers and the progress service.
/// Keys are deterministic so the producer side never drifts from the worker.

pub const QUEUE_PREFIX: &str = "arbiter:queue";
pub const RESULT_PREFIX: &str = "arbiter:result";
pub const STATUS_PREFIX: &str = "arbiter:status";
pub const CANCEL_PREFIX: &str = "arbiter:cancel";

/// Reports and statuses expire after 24 hours
pub const RESULT_TTL_SECONDS: u64 = 86400;

/// Terminal statuses for submissions that never produce a report
pub const STATUS_CANCELLED: &str = "cancelled";
pub const STATUS_UNKNOWN_PROBLEM: &str = "unknown_problem";

/// Generate deterministic queue name for a language
pub fn queue_name(language: &Language) -> String {
    format!("{}:{}", QUEUE_PREFIX, language)
}

/// Generate report key for a submission
pub fn result_key(submission_id: &uuid::Uuid) -> String {
    format!("{}:{}", RESULT_PREFIX, submission_id)
}

/// Generate verdict key for a submission
pub fn status_key(submission_id: &uuid::Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, submission_id)
}

/// Generate cancellation marker key for a submission
pub fn cancel_key(submission_id: &uuid::Uuid) -> String {
    format!("{}:{}", CANCEL_PREFIX, submission_id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

/// Push a submission to its language queue (RPUSH, FIFO with BLPOP)
pub async fn push_job(
    conn: &mut redis::aio::ConnectionManager,
    job: &SubmissionJob,
) -> RedisResult<()> {
    let queue = queue_name(&job.language);
    let payload = serde_json::to_string(job).map_err(serialization_error)?;

    conn.rpush(&queue, payload).await
}

/// Pop a submission from the language queue.
/// BLPOP with a timeout so the worker loop can notice shutdown.
pub async fn pop_job(
    conn: &mut redis::aio::ConnectionManager,
    language: &Language,
    timeout_seconds: f64,
) -> RedisResult<Option<SubmissionJob>> {
    let queue = queue_name(language);
    let result: Option<(String, String)> = conn.blpop(&queue, timeout_seconds).await?;

    match result {
        Some((_key, payload)) => {
            let job: SubmissionJob = serde_json::from_str(&payload).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(job))
        }
        None => Ok(None),
    }
}

/// Store a judge report and its verdict for the progress service
pub async fn store_report(
    conn: &mut redis::aio::ConnectionManager,
    report: &JudgeReport,
) -> RedisResult<()> {
    let key = result_key(&report.submission_id);
    let payload = serde_json::to_string(report).map_err(serialization_error)?;
    let _: () = conn.set_ex(&key, payload, RESULT_TTL_SECONDS).await?;

    // Verdict stored separately for cheap polling
    store_status(conn, &report.submission_id, report.verdict.as_str()).await
}

/// Store a submission's terminal status on its own
pub async fn store_status(
    conn: &mut redis::aio::ConnectionManager,
    submission_id: &uuid::Uuid,
    status: &str,
) -> RedisResult<()> {
    conn.set_ex(status_key(submission_id), status, RESULT_TTL_SECONDS)
        .await
}

/// Read a submission's status, if one was stored
pub async fn get_status(
    conn: &mut redis::aio::ConnectionManager,
    submission_id: &uuid::Uuid,
) -> RedisResult<Option<String>> {
    conn.get(status_key(submission_id)).await
}

/// Retrieve a stored judge report
pub async fn get_report(
    conn: &mut redis::aio::ConnectionManager,
    submission_id: &uuid::Uuid,
) -> RedisResult<Option<JudgeReport>> {
    let key = result_key(submission_id);
    let payload: Option<String> = conn.get(&key).await?;

    match payload {
        Some(data) => {
            let report: JudgeReport = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(report))
        }
        None => Ok(None),
    }
}

/// Whether the submitter withdrew this submission before it was judged
pub async fn is_job_cancelled(
    conn: &mut redis::aio::ConnectionManager,
    submission_id: &uuid::Uuid,
) -> RedisResult<bool> {
    conn.exists(cancel_key(submission_id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use uuid::Uuid;

    #[test]
    fn test_queue_naming() {
        assert_eq!(queue_name(&Language::Python), "arbiter:queue:python");
        assert_eq!(queue_name(&Language::Java), "arbiter:queue:java");
        assert_eq!(queue_name(&Language::Cpp), "arbiter:queue:cpp");
    }

    #[test]
    fn test_result_key_deterministic() {
        let id = Uuid::new_v4();
        let key1 = result_key(&id);
        let key2 = result_key(&id);
        assert_eq!(key1, key2);
        assert!(key1.starts_with("arbiter:result:"));
    }

    #[test]
    fn test_status_and_cancel_key_format() {
        let id = Uuid::new_v4();
        assert!(status_key(&id).starts_with("arbiter:status:"));
        assert!(cancel_key(&id).ends_with(&id.to_string()));
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_queue_and_report_round_trip() {
        use crate::types::{Judgement, Submission, Verdict};

        let client = redis::Client::open("redis://127.0.0.1:6379").unwrap();
        let mut conn = client.get_connection_manager().await.unwrap();
        let job = SubmissionJob::new(Submission {
            problem_id: "two-sum".to_string(),
            language: Language::Cpp,
            source_code: "int twoSum() { return 0; }".to_string(),
        });

        push_job(&mut conn, &job).await.unwrap();
        let popped = pop_job(&mut conn, &Language::Cpp, 1.0).await.unwrap().unwrap();
        assert_eq!(popped.id, job.id);
        assert_eq!(popped.source_code, job.source_code);

        assert!(get_report(&mut conn, &job.id).await.unwrap().is_none());
        let report = JudgeReport::new(&popped, Judgement::from_results(Vec::new()));
        store_report(&mut conn, &report).await.unwrap();

        let stored = get_report(&mut conn, &job.id).await.unwrap().unwrap();
        assert_eq!(stored.submission_id, job.id);
        assert_eq!(stored.verdict, Verdict::Accepted);
        assert_eq!(
            get_status(&mut conn, &job.id).await.unwrap().as_deref(),
            Some("accepted")
        );
    }
}
