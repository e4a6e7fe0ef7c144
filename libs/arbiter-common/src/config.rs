// Process-level configuration shared by the worker and the CLI.
// Everything comes from the environment with local-development defaults.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub catalog_path: PathBuf,
    pub languages_path: PathBuf,
    pub metrics_addr: String,
    pub max_parallel_jobs: usize,
    pub json_logs: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (lets tests avoid touching the process env)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let max_parallel_jobs = lookup("MAX_PARALLEL_JOBS")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(4);

        Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            catalog_path: lookup("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/problems.json")),
            languages_path: lookup("LANGUAGES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config/languages.json")),
            metrics_addr: lookup("METRICS_ADDR").unwrap_or_else(|| "0.0.0.0:9100".to_string()),
            max_parallel_jobs,
            json_logs: lookup("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.catalog_path, PathBuf::from("config/problems.json"));
        assert_eq!(config.max_parallel_jobs, 4);
        assert!(!config.json_logs);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(|key| match key {
            "MAX_PARALLEL_JOBS" => Some("8".to_string()),
            "LOG_FORMAT" => Some("JSON".to_string()),
            _ => None,
        });
        assert_eq!(config.max_parallel_jobs, 8);
        assert!(config.json_logs);
    }

    #[test]
    fn test_zero_parallelism_falls_back() {
        let config =
            Config::from_lookup(|key| (key == "MAX_PARALLEL_JOBS").then(|| "0".to_string()));
        assert_eq!(config.max_parallel_jobs, 4);
    }
}
