//! Configuration for Vigil.
//!
//! Loaded from .vigil.yml or ~/.config/vigil/vigil.yml. The config is an
//! explicit value passed into each component's constructor, scoped to the
//! run rather than held as a process-wide static.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Monitoring thresholds and limits.
    pub monitoring: MonitoringConfig,

    /// Generation parameters, recorded on each run but not interpreted here.
    pub generation: GenerationConfig,
}

impl Config {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .vigil.yml in current directory
    /// 3. ~/.config/vigil/vigil.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()));
        }

        // Try project config
        let project_config = PathBuf::from(".vigil.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    log::info!("Loaded config from .vigil.yml");
                    return Ok(config);
                }
                Err(e) => {
                    log::warn!("Failed to load .vigil.yml: {}", e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("vigil").join("vigil.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let m = &self.monitoring;
        if !m.drift_significance_level.is_finite()
            || m.drift_significance_level <= 0.0
            || m.drift_significance_level > 1.0
        {
            eyre::bail!("monitoring.drift_significance_level must be in (0, 1]");
        }
        if !m.retrieval_score_threshold.is_finite() {
            eyre::bail!("monitoring.retrieval_score_threshold must be finite");
        }
        if m.population_sample_limit == 0 {
            eyre::bail!("monitoring.population_sample_limit must be > 0");
        }
        if self.generation.n_results == 0 {
            eyre::bail!("generation.n_results must be > 0");
        }
        Ok(())
    }
}

/// Thresholds and limits for the monitoring layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Significance level for the drift decision rule.
    #[serde(rename = "drift-significance-level")]
    pub drift_significance_level: f64,

    /// Retrieval scores strictly below this are flagged.
    #[serde(rename = "retrieval-score-threshold")]
    pub retrieval_score_threshold: f64,

    /// Most-recent observations pulled for the drift sample.
    #[serde(rename = "population-sample-limit")]
    pub population_sample_limit: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            drift_significance_level: 0.05,
            retrieval_score_threshold: 0.3,
            population_sample_limit: 100,
        }
    }
}

/// Generation parameters recorded as run parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model used for summarization/analysis.
    #[serde(rename = "summarization-model")]
    pub summarization_model: String,

    /// Embedding model used by the retrieval stage.
    #[serde(rename = "embedding-model")]
    pub embedding_model: String,

    /// Documents requested per retrieval.
    #[serde(rename = "n-results")]
    pub n_results: u32,

    /// Sampling temperature.
    pub temperature: f64,

    /// Max tokens per generation.
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            summarization_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            n_results: 5,
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}
