//! Limits applied to every judging run

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 1_000_000;
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 64 * 1024;
pub const DEFAULT_STACK_SIZE_BYTES: usize = 256 * 1024 * 1024;
pub const DEFAULT_GRACE_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgeConfig {
    /// Per-case wall-clock budget, unless the problem overrides it
    pub timeout_ms: u64,
    pub max_call_depth: usize,
    pub max_collection_len: usize,
    pub max_source_bytes: usize,
    /// Stack of each execution thread; deep recursion in submissions lands here
    pub stack_size_bytes: usize,
    /// Extra time the harness waits for a unit to notice its own deadline
    pub grace_ms: u64,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            stack_size_bytes: DEFAULT_STACK_SIZE_BYTES,
            grace_ms: DEFAULT_GRACE_MS,
        }
    }
}

impl JudgeConfig {
    /// Budget for one case, honouring a per-problem override
    pub fn case_timeout(&self, problem_limit_ms: Option<u64>) -> Duration {
        Duration::from_millis(problem_limit_ms.filter(|ms| *ms > 0).unwrap_or(self.timeout_ms))
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JudgeConfig::default();
        assert_eq!(config.timeout_ms, 2000);
        assert_eq!(config.max_call_depth, 512);
        assert_eq!(config.max_collection_len, 1_000_000);
        assert_eq!(config.max_source_bytes, 65536);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: JudgeConfig = serde_json::from_str(r#"{"timeout_ms": 500}"#).unwrap();
        assert_eq!(config.timeout_ms, 500);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
    }

    #[test]
    fn test_problem_override() {
        let config = JudgeConfig::default();
        assert_eq!(config.case_timeout(None), Duration::from_millis(2000));
        assert_eq!(config.case_timeout(Some(100)), Duration::from_millis(100));
        assert_eq!(config.case_timeout(Some(0)), Duration::from_millis(2000));
    }
}
