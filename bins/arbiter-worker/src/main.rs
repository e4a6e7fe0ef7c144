mod config;
mod executor;
mod metrics;

use anyhow::Context;
use arbiter_common::catalog::{JsonCatalog, ProblemCatalog};
use arbiter_common::config::Config;
use arbiter_common::redis;
use arbiter_common::types::Language;
use arbiter_judge::Judge;
use config::LanguageConfigManager;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Config::from_env();
    init_tracing(settings.json_logs);

    info!("Arbiter Worker booting...");

    let config_manager = LanguageConfigManager::load(&settings.languages_path).map_err(|e| {
        error!("Failed to load language configurations: {}", e);
        error!("Make sure {} exists", settings.languages_path.display());
        e
    })?;
    info!("Loaded language configurations for: {:?}", config_manager.list_languages());

    let language_str = std::env::var("WORKER_LANGUAGE").unwrap_or_else(|_| "python".to_string());
    let language: Language = language_str
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Valid options for WORKER_LANGUAGE: java, python, cpp")?;

    let judge_config = config_manager
        .judge_config(&language)
        .with_context(|| format!("Language '{}' is not configured", language))?;
    let queue_name = config_manager.get_queue_name(&language)?;
    info!(
        language = %language,
        queue = %queue_name,
        timeout_ms = judge_config.timeout_ms,
        "Worker configured"
    );

    let catalog = JsonCatalog::load(&settings.catalog_path).with_context(|| {
        format!(
            "Failed to load problem catalog {}",
            settings.catalog_path.display()
        )
    })?;
    info!(problems = catalog.len(), "Problem catalog loaded");
    let catalog: Arc<dyn ProblemCatalog> = Arc::new(catalog);

    metrics::register()?;
    let metrics_addr = settings.metrics_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(&metrics_addr).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    let client = ::redis::Client::open(settings.redis_url.as_str())?;
    let redis_conn = ::redis::aio::ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Connected to Redis: {}", settings.redis_url);

    let judge = Arc::new(Judge::new(judge_config));
    let permits = Arc::new(Semaphore::new(settings.max_parallel_jobs));

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        warn!("Received shutdown signal, stopping intake...");
    };

    tokio::select! {
        _ = worker_loop(redis_conn, language, catalog, judge, Arc::clone(&permits)) => {},
        _ = shutdown => {},
    }

    // let in-flight submissions finish and persist
    let _drained = permits
        .acquire_many(settings.max_parallel_jobs as u32)
        .await
        .context("Worker semaphore closed")?;
    info!("Worker shutdown complete");
    Ok(())
}

#[instrument(skip(redis_conn, catalog, judge, permits), fields(language = %language))]
async fn worker_loop(
    mut redis_conn: ::redis::aio::ConnectionManager,
    language: Language,
    catalog: Arc<dyn ProblemCatalog>,
    judge: Arc<Judge>,
    permits: Arc<Semaphore>,
) {
    loop {
        // bounded parallelism: wait for a slot before taking work off the queue
        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        // BLPOP with 5 second timeout for graceful shutdown
        match redis::pop_job(&mut redis_conn, &language, 5.0).await {
            Ok(Some(job)) => {
                info!(
                    submission_id = %job.id,
                    problem_id = %job.problem_id,
                    source_size = job.source_code.len(),
                    "Received submission"
                );

                let mut conn = redis_conn.clone();
                let catalog = Arc::clone(&catalog);
                let judge = Arc::clone(&judge);
                tokio::spawn(async move {
                    metrics::JOBS_IN_FLIGHT.inc();
                    let executed =
                        executor::execute_job(&job, catalog.as_ref(), &judge, &mut conn).await;
                    if let Err(e) = executed {
                        error!(
                            submission_id = %job.id,
                            error = %e,
                            "Failed to complete submission"
                        );
                    }
                    metrics::JOBS_IN_FLIGHT.dec();
                    drop(permit);
                });
            }
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Redis error");
                tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
            }
        }
    }
}
