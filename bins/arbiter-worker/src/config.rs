// Per-language judging limits for the Arbiter worker
use anyhow::{bail, Context, Result};
use arbiter_common::types::Language;
use arbiter_judge::JudgeConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: String,
    pub queue_name: String,
    pub timeout_ms: u64,
    pub max_call_depth: usize,
    pub max_collection_len: usize,
    pub max_source_bytes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<String, LanguageConfig>,
}

impl LanguageConfigManager {
    /// Load language configurations from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson =
            serde_json::from_str(content).context("Failed to parse languages.json")?;

        let mut configs = HashMap::new();
        for lang in languages_json.languages {
            let parsed: Language = lang
                .name
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .with_context(|| format!("Invalid language entry '{}'", lang.name))?;
            if lang.timeout_ms == 0 {
                bail!("Language '{}' has a zero timeout", parsed);
            }
            configs.insert(parsed.to_string(), lang);
        }

        Ok(Self { configs })
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Result<&LanguageConfig> {
        let lang_name = language.to_string();
        self.configs
            .get(&lang_name)
            .ok_or_else(|| anyhow::anyhow!("No configuration found for language: {}", lang_name))
    }

    /// Get queue name for a language
    pub fn get_queue_name(&self, language: &Language) -> Result<String> {
        Ok(self.get_config(language)?.queue_name.clone())
    }

    /// Engine limits for a language; stack size and grace stay at their defaults
    pub fn judge_config(&self, language: &Language) -> Result<JudgeConfig> {
        let config = self.get_config(language)?;
        Ok(JudgeConfig {
            timeout_ms: config.timeout_ms,
            max_call_depth: config.max_call_depth,
            max_collection_len: config.max_collection_len,
            max_source_bytes: config.max_source_bytes,
            ..JudgeConfig::default()
        })
    }

    /// List all configured languages
    pub fn list_languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANGUAGES: &str = r#"{
        "languages": [
            {"name": "python", "queue_name": "arbiter:queue:python", "timeout_ms": 3000,
             "max_call_depth": 400, "max_collection_len": 1000, "max_source_bytes": 4096},
            {"name": "cpp", "queue_name": "arbiter:queue:cpp", "timeout_ms": 2000,
             "max_call_depth": 512, "max_collection_len": 1000000, "max_source_bytes": 65536}
        ]
    }"#;

    #[test]
    fn test_load_config() {
        let manager = LanguageConfigManager::from_json(LANGUAGES).unwrap();
        assert_eq!(manager.list_languages(), vec!["cpp".to_string(), "python".to_string()]);
        assert_eq!(
            manager.get_queue_name(&Language::Python).unwrap(),
            "arbiter:queue:python"
        );
        assert!(manager.get_config(&Language::Java).is_err());
    }

    #[test]
    fn test_judge_config_from_language() {
        let manager = LanguageConfigManager::from_json(LANGUAGES).unwrap();
        let config = manager.judge_config(&Language::Python).unwrap();
        assert_eq!(config.timeout_ms, 3000);
        assert_eq!(config.max_call_depth, 400);
        assert_eq!(config.stack_size_bytes, JudgeConfig::default().stack_size_bytes);
    }

    #[test]
    fn test_unknown_language_rejected() {
        let bad = LANGUAGES.replace("\"cpp\"", "\"rust\"");
        assert!(LanguageConfigManager::from_json(&bad).is_err());
    }

    #[test]
    fn test_repository_languages_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/languages.json");
        let manager = LanguageConfigManager::load(&path).unwrap();
        for language in Language::ALL {
            assert_eq!(
                manager.get_queue_name(&language).unwrap(),
                arbiter_common::redis::queue_name(&language)
            );
        }
    }
}
