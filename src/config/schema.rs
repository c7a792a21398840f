use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Providers used when a request does not name any.
    #[serde(default = "default_providers")]
    pub default_providers: Vec<String>,

    /// Candidates requested per provider when the request does not say.
    #[serde(default = "default_candidate_count")]
    pub candidate_count: usize,

    /// Fallback API key handed to providers without a dedicated env var.
    pub api_key: Option<String>,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub consistency: ConsistencyThresholds,

    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_providers() -> Vec<String> {
    vec!["pollinations".into()]
}

fn default_candidate_count() -> usize {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            default_providers: default_providers(),
            candidate_count: default_candidate_count(),
            api_key: None,
            oracle: OracleConfig::default(),
            scoring: ScoringConfig::default(),
            consistency: ConsistencyThresholds::default(),
            concurrency: ConcurrencyConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Load from an explicit path, or the default location when `None`.
    /// A missing file yields the built-in defaults rather than an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            let mut config = Self::default();
            config.config_path = config_path;
            return Ok(config);
        }

        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("reading config at {}", config_path.display()))?;
        let mut config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config at {}", config_path.display()))?;
        config.config_path = config_path;
        config.validate().map_err(anyhow::Error::from)?;
        Ok(config)
    }

    fn default_path() -> Result<PathBuf> {
        let dirs = UserDirs::new().context("could not determine home directory")?;
        Ok(dirs
            .home_dir()
            .join(".config")
            .join("bestshot")
            .join("config.toml"))
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.candidate_count == 0 {
            return Err(ConfigError::Validation(
                "candidate_count must be at least 1".into(),
            ));
        }
        self.scoring.weights.validate()?;
        self.consistency.validate()?;
        if self.concurrency.generation_parallelism == 0 || self.concurrency.scoring_parallelism == 0
        {
            return Err(ConfigError::Validation(
                "concurrency ceilings must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ── Scoring oracle ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_oracle_model")]
    pub model: String,

    /// Resolved from `ORACLE_API_KEY` / `ARK_API_KEY` when absent.
    pub api_key: Option<String>,

    #[serde(default = "default_oracle_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_oracle_backoff_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_oracle_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_oracle_endpoint() -> String {
    "https://ark.cn-beijing.volces.com/api/v3/chat/completions".into()
}

fn default_oracle_model() -> String {
    "doubao-seed-1-6-vision-250815".into()
}

fn default_oracle_attempts() -> u32 {
    3
}

fn default_oracle_backoff_ms() -> u64 {
    800
}

fn default_oracle_timeout_secs() -> u64 {
    30
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_oracle_endpoint(),
            model: default_oracle_model(),
            api_key: None,
            max_attempts: default_oracle_attempts(),
            backoff_base_ms: default_oracle_backoff_ms(),
            timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

// ── Scoring weights and fallback policy ───────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(flatten)]
    pub weights: crate::scoring::ScoringWeights,

    /// Keep the local fallback scorer in the chain behind the oracle.
    #[serde(default = "default_true")]
    pub local_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: crate::scoring::ScoringWeights::default(),
            local_fallback: true,
        }
    }
}

// ── Consistency thresholds ────────────────────────────────────────

/// Status boundaries for the subject-consistency verdict.
/// `score >= consistent` → consistent; `score >= uncertain` → uncertain;
/// anything lower → inconsistent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConsistencyThresholds {
    #[serde(default = "default_consistent_threshold")]
    pub consistent: f64,

    #[serde(default = "default_uncertain_threshold")]
    pub uncertain: f64,
}

fn default_consistent_threshold() -> f64 {
    0.8
}

fn default_uncertain_threshold() -> f64 {
    0.5
}

impl Default for ConsistencyThresholds {
    fn default() -> Self {
        Self {
            consistent: default_consistent_threshold(),
            uncertain: default_uncertain_threshold(),
        }
    }
}

impl ConsistencyThresholds {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.uncertain > self.consistent {
            return Err(ConfigError::Validation(
                "consistency.uncertain must not exceed consistency.consistent".into(),
            ));
        }
        Ok(())
    }
}

// ── Concurrency ceilings and timeouts ─────────────────────────────

/// Generation and scoring hit different upstreams with different rate
/// limits, so each class gets its own ceiling and deadline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_generation_parallelism")]
    pub generation_parallelism: usize,

    #[serde(default = "default_scoring_parallelism")]
    pub scoring_parallelism: usize,

    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_scoring_timeout_secs")]
    pub scoring_timeout_secs: u64,
}

fn default_generation_parallelism() -> usize {
    4
}

fn default_scoring_parallelism() -> usize {
    8
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_scoring_timeout_secs() -> u64 {
    30
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            generation_parallelism: default_generation_parallelism(),
            scoring_parallelism: default_scoring_parallelism(),
            generation_timeout_secs: default_generation_timeout_secs(),
            scoring_timeout_secs: default_scoring_timeout_secs(),
        }
    }
}

// ── Observability ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "log", "jsonl" or "none"/"noop".
    #[serde(default = "default_observability_backend")]
    pub backend: String,

    /// Event file for the jsonl backend.
    #[serde(default = "default_jsonl_path")]
    pub jsonl_path: PathBuf,
}

fn default_observability_backend() -> String {
    "log".into()
}

fn default_jsonl_path() -> PathBuf {
    PathBuf::from("logs/pipeline_events.jsonl")
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: default_observability_backend(),
            jsonl_path: default_jsonl_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.candidate_count, 3);
        assert_eq!(config.concurrency.generation_parallelism, 4);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let raw = r#"
            default_providers = ["openai", "seedream"]

            [concurrency]
            generation_parallelism = 2
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.default_providers, vec!["openai", "seedream"]);
        assert_eq!(config.concurrency.generation_parallelism, 2);
        // Untouched sections keep their defaults.
        assert_eq!(config.concurrency.scoring_parallelism, 8);
        assert!((config.consistency.consistent - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_inverted_consistency_thresholds() {
        let raw = r#"
            [consistency]
            consistent = 0.4
            uncertain = 0.6
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.default_providers, vec!["pollinations"]);
    }
}
