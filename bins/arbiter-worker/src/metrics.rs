// Prometheus metrics for the worker, served next to a health probe
use anyhow::{Context, Result};
use arbiter_common::types::{Actual, FaultKind, Judgement, Language};
use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

const JUDGE_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref SUBMISSIONS_JUDGED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "arbiter_submissions_judged_total",
            "Submissions judged, by language and verdict"
        ),
        &["language", "verdict"]
    )
    .expect("metric definition is valid");
    pub static ref CASES_EXECUTED: IntCounterVec = IntCounterVec::new(
        Opts::new("arbiter_cases_executed_total", "Test cases executed, by outcome"),
        &["outcome"]
    )
    .expect("metric definition is valid");
    pub static ref JUDGE_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "arbiter_judge_duration_seconds",
            "Wall-clock time to judge one submission"
        )
        .buckets(JUDGE_DURATION_BUCKETS.to_vec()),
        &["language"]
    )
    .expect("metric definition is valid");
    pub static ref JOBS_IN_FLIGHT: IntGauge =
        IntGauge::new("arbiter_jobs_in_flight", "Submissions currently being judged")
            .expect("metric definition is valid");
    pub static ref JOBS_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("arbiter_jobs_skipped_total", "Jobs dropped without a verdict, by reason"),
        &["reason"]
    )
    .expect("metric definition is valid");
}

/// Register every metric with the worker registry; call once at boot
pub fn register() -> Result<()> {
    REGISTRY
        .register(Box::new(SUBMISSIONS_JUDGED.clone()))
        .context("Failed to register submissions metric")?;
    REGISTRY
        .register(Box::new(CASES_EXECUTED.clone()))
        .context("Failed to register cases metric")?;
    REGISTRY
        .register(Box::new(JUDGE_DURATION.clone()))
        .context("Failed to register duration metric")?;
    REGISTRY
        .register(Box::new(JOBS_IN_FLIGHT.clone()))
        .context("Failed to register in-flight metric")?;
    REGISTRY
        .register(Box::new(JOBS_SKIPPED.clone()))
        .context("Failed to register skipped metric")?;
    Ok(())
}

/// Outcome label of one case
pub fn case_outcome(passed: bool, actual: &Actual) -> &'static str {
    match actual.fault().map(|f| f.kind()) {
        None if passed => "passed",
        None => "wrong_answer",
        Some(FaultKind::Timeout) => "timeout",
        Some(FaultKind::Runtime) | Some(FaultKind::Arity) => "runtime_error",
        Some(FaultKind::Extraction) | Some(FaultKind::Syntax) => "compilation_error",
    }
}

pub fn record_judgement(language: Language, judgement: &Judgement, elapsed: Duration) {
    let language = language.to_string();
    SUBMISSIONS_JUDGED
        .with_label_values(&[&language, judgement.verdict.as_str()])
        .inc();
    JUDGE_DURATION
        .with_label_values(&[&language])
        .observe(elapsed.as_secs_f64());
    for result in &judgement.results {
        CASES_EXECUTED
            .with_label_values(&[case_outcome(result.passed, &result.actual)])
            .inc();
    }
}

/// Prometheus text exposition of the worker registry
pub fn encode() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

async fn metrics_handler() -> (StatusCode, String) {
    match encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
}

/// Serve `/health` and `/metrics` until the process exits
pub async fn serve(addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener on {}", addr))?;
    info!(addr = %addr, "Metrics server listening");
    axum::serve(listener, router())
        .await
        .context("Metrics server error")
}
