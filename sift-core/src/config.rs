//! Configuration system for sift.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/sift/config.toml` and/or `.sift/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Top-level configuration for the sift pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub search: SearchConfig,
    pub analysis: AnalysisConfig,
    pub synthesis: SynthesisConfig,
    pub executor: ExecutorConfig,
    pub pipeline: PipelineConfig,
    pub http: HttpConfig,
}

/// Search execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results requested from the provider per query.
    pub results_per_query: usize,
    /// Fewer results than this marks a step as insufficient.
    pub min_sufficient_results: usize,
    /// A step is insufficient when more than this share of results is low quality.
    pub low_quality_ratio: f64,
    /// Upper bound on query variations tried per insufficient step.
    pub max_variations: usize,
    /// Maximum search steps in flight at once.
    pub max_concurrent_steps: usize,
    /// Timeout applied to each provider call.
    pub provider_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_per_query: 10,
            min_sufficient_results: 3,
            low_quality_ratio: 0.5,
            max_variations: 5,
            max_concurrent_steps: 4,
            provider_timeout_secs: 20,
        }
    }
}

/// Content analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of results selected for full-content analysis.
    pub top_n: usize,
    /// Maximum concurrent content fetches.
    pub max_concurrent_fetches: usize,
    /// Timeout applied to each fetch.
    pub fetch_timeout_secs: u64,
    /// Extracted text beyond this many characters is discarded.
    pub max_content_chars: usize,
    /// Year used as "now" for recency scoring. Defaults to the current UTC year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_year: Option<i32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            max_concurrent_fetches: 4,
            fetch_timeout_secs: 15,
            max_content_chars: 20_000,
            reference_year: None,
        }
    }
}

/// Fact triangulation and response generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Shared-word overlap required to group two statements.
    pub similarity_threshold: f64,
    /// Facts above this confidence feed the narrative templates.
    pub high_confidence: f64,
    /// Sources above this reliability feed the narrative templates.
    pub high_reliability: f64,
    /// Spread of reported durations (minutes) that counts as a conflict.
    pub conflict_threshold_minutes: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            high_confidence: 0.7,
            high_reliability: 70.0,
            conflict_threshold_minutes: 30.0,
        }
    }
}

/// How the dependency-batched executor reacts to a dependency cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Force the first unvisited step into the next batch and keep going.
    #[default]
    BreakArbitrarily,
    /// Stop scheduling, mark the remaining steps skipped, and end in error.
    FailFast,
}

/// Dependency-batched executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Default timeout per step in seconds.
    pub step_timeout_secs: u64,
    /// Maximum steps of one batch running concurrently.
    pub max_concurrency: usize,
    pub cycle_policy: CyclePolicy,
    /// Skip steps whose dependencies failed instead of running them anyway.
    pub skip_dependents_of_failed: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 60,
            max_concurrency: 8,
            cycle_policy: CyclePolicy::BreakArbitrarily,
            skip_dependents_of_failed: false,
        }
    }
}

impl ExecutorConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}

/// Whole-pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Global deadline for one query across all stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

/// Settings for the bundled HTTP collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    /// HTML search endpoint; the query is appended as the `q` parameter.
    pub search_endpoint: String,
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("sift/{}", env!("CARGO_PKG_VERSION")),
            search_endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_redirects: 5,
        }
    }
}

impl SiftConfig {
    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.top_n == 0 {
            return Err(ConfigError::Invalid {
                message: "analysis.top_n must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.synthesis.similarity_threshold) {
            return Err(ConfigError::Invalid {
                message: "synthesis.similarity_threshold must be within [0, 1]".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.search.low_quality_ratio) {
            return Err(ConfigError::Invalid {
                message: "search.low_quality_ratio must be within [0, 1]".into(),
            });
        }
        if self.executor.step_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "executor.step_timeout_secs must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SIFT_`)
/// 3. Workspace-local config (`.sift/config.toml`)
/// 4. User config (`~/.config/sift/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SiftConfig>,
) -> Result<SiftConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SiftConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "sift", "sift") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".sift").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // SIFT_SEARCH__MAX_VARIATIONS, SIFT_PIPELINE__DEADLINE_SECS, etc.
    figment = figment.merge(Env::prefixed("SIFT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: SiftConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SiftConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.top_n, 5);
        assert_eq!(config.executor.step_timeout(), Duration::from_secs(60));
        assert_eq!(config.executor.cycle_policy, CyclePolicy::BreakArbitrarily);
        assert!((config.synthesis.similarity_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_rejects_zero_top_n() {
        let mut config = SiftConfig::default();
        config.analysis.top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_workspace_config_layering() {
        let dir = tempfile::tempdir().unwrap();
        let sift_dir = dir.path().join(".sift");
        std::fs::create_dir_all(&sift_dir).unwrap();
        std::fs::write(
            sift_dir.join("config.toml"),
            "[analysis]\ntop_n = 3\n\n[executor]\ncycle_policy = \"fail_fast\"\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.analysis.top_n, 3);
        assert_eq!(config.executor.cycle_policy, CyclePolicy::FailFast);
        // Untouched sections keep their defaults.
        assert_eq!(config.search.max_variations, 5);
    }

    #[test]
    fn test_invalid_workspace_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sift_dir = dir.path().join(".sift");
        std::fs::create_dir_all(&sift_dir).unwrap();
        std::fs::write(
            sift_dir.join("config.toml"),
            "[synthesis]\nsimilarity_threshold = 1.5\n",
        )
        .unwrap();

        assert!(load_config(Some(dir.path()), None).is_err());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = SiftConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: SiftConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.search.results_per_query, config.search.results_per_query);
    }
}
