use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::ClassifierConfig;
use crate::evaluation::{HarnessConfig, RetrySettings};
use crate::rag::reranking::scorer::DEFAULT_SCALE_MAX;
use crate::rag::{ContextConfig, ReRankConfig};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
}

/// Generation model endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub ollama_url: String,
    pub name: String,
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://127.0.0.1:11434".to_string(),
            name: "qwen2.5:7b-instruct".to_string(),
            timeout_secs: 120,
            temperature: 0.0,
        }
    }
}

/// Structured engine and passage index endpoints
///
/// `corpus_path` takes precedence over `passage_index_url` and loads an
/// in-memory index from a JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    pub structured_url: String,
    pub passage_index_url: Option<String>,
    pub corpus_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            structured_url: "http://127.0.0.1:8000".to_string(),
            passage_index_url: Some("http://127.0.0.1:8001".to_string()),
            corpus_path: None,
            timeout_secs: 30,
        }
    }
}

/// Which relevance scorer the re-ranker uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Ask the language model
    Llm,
    /// Term overlap, no model calls
    Keyword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankerConfig {
    pub k: usize,
    pub overfetch: usize,
    /// On the `scale_max` scale; recalibrate per dataset
    pub relevance_threshold: f32,
    pub max_entities: usize,
    pub scale_max: f32,
    pub scorer: ScorerKind,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        let rerank = ReRankConfig::default();
        Self {
            k: rerank.k,
            overfetch: rerank.overfetch,
            relevance_threshold: rerank.relevance_threshold,
            max_entities: rerank.max_entities,
            scale_max: DEFAULT_SCALE_MAX,
            scorer: ScorerKind::Llm,
        }
    }
}

impl RerankerConfig {
    pub fn to_rerank_config(&self) -> ReRankConfig {
        ReRankConfig {
            k: self.k,
            overfetch: self.overfetch,
            relevance_threshold: self.relevance_threshold,
            max_entities: self.max_entities,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub concurrency: usize,
    pub request_timeout_secs: u64,
    /// Defaults to `~/.courtside/checkpoints/<dataset stem>.jsonl`
    pub checkpoint_path: Option<PathBuf>,
    pub retry: RetrySettings,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        let harness = HarnessConfig::default();
        Self {
            concurrency: harness.concurrency,
            request_timeout_secs: harness.request_timeout_ms / 1000,
            checkpoint_path: None,
            retry: RetrySettings::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn to_harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            concurrency: self.concurrency,
            request_timeout_ms: self.request_timeout_secs.saturating_mul(1000),
        }
    }

    /// Checkpoint location for a dataset file
    pub fn checkpoint_for(&self, dataset: &Path) -> Result<PathBuf> {
        if let Some(path) = &self.checkpoint_path {
            return Ok(path.clone());
        }
        let stem = dataset
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset");
        Ok(Config::home_dir()?
            .join("checkpoints")
            .join(format!("{}.jsonl", stem)))
    }
}

impl Config {
    /// Load configuration from `path`, or the default location
    ///
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            if path.is_some() {
                bail!("Config file {} does not exist", config_path.display());
            }
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// `~/.courtside`
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".courtside"))
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let r = &self.reranker;
        if r.k == 0 {
            bail!("reranker.k must be at least 1");
        }
        if r.scale_max.is_nan() || r.scale_max <= 0.0 {
            bail!("reranker.scale_max must be positive");
        }
        if !(0.0..=r.scale_max).contains(&r.relevance_threshold) {
            bail!(
                "reranker.relevance_threshold {} is outside 0..={}",
                r.relevance_threshold,
                r.scale_max
            );
        }
        if !(0.0..=1.0).contains(&self.classifier.heuristic_threshold) {
            bail!("classifier.heuristic_threshold must be within 0..=1");
        }
        if self.evaluation.concurrency == 0 {
            bail!("evaluation.concurrency must be at least 1");
        }
        if self.evaluation.retry.max_attempts == 0 {
            bail!("evaluation.retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.reranker.relevance_threshold, 7.0);
        assert_eq!(config.reranker.max_entities, 2);
        assert_eq!(config.reranker.scale_max, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [reranker]
            relevance_threshold = 6.5
            scorer = "keyword"

            [evaluation.retry]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.reranker.relevance_threshold, 6.5);
        assert_eq!(config.reranker.scorer, ScorerKind::Keyword);
        assert_eq!(config.reranker.k, 3);
        assert_eq!(config.evaluation.retry.max_attempts, 3);
        assert_eq!(config.evaluation.retry.base_delay_ms, 1000);
        assert_eq!(config.model.name, "qwen2.5:7b-instruct");
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.model.name = "llama3.1:8b".to_string();
        config.evaluation.concurrency = 2;
        config.save_to(&path).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.model.name, "llama3.1:8b");
        assert_eq!(loaded.evaluation.concurrency, 2);
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_validate_rejects_threshold_off_scale() {
        let mut config = Config::default();
        config.reranker.relevance_threshold = 12.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_checkpoint_path() {
        let mut evaluation = EvaluationConfig::default();
        evaluation.checkpoint_path = Some(PathBuf::from("/tmp/run.jsonl"));
        assert_eq!(
            evaluation.checkpoint_for(Path::new("data/dev.jsonl")).unwrap(),
            PathBuf::from("/tmp/run.jsonl")
        );
    }
}
