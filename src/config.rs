use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MnemaConfig {
    pub agent: AgentConfig,
    pub capture: CaptureConfig,
    pub retrieval: RetrievalConfig,
    pub jobs: JobConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub log_level: String,
}

/// Knobs for the adaptive capture loop.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    /// Tick interval while the user is actively interacting (ms).
    pub poll_high_ms: u64,
    /// Tick interval at normal activity (ms).
    pub poll_normal_ms: u64,
    /// Tick interval when the user has gone quiet (ms).
    pub poll_low_ms: u64,
    /// Minimum spacing between two captures (ms).
    pub min_capture_spacing_ms: u64,
    /// How long unchanged content must sit in front of an idle user before
    /// it is captured anyway (ms).
    pub idle_dwell_ms: u64,
    /// Token-overlap similarity below which content counts as changed.
    pub similarity_floor: f64,
    /// Length of the `content_snippet` field in outbound captures (chars).
    pub snippet_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Base URL of the memory store's search/answer endpoint.
    pub endpoint: String,
    /// Bearer token. Usually supplied via `MNEMA_TOKEN` rather than the file.
    pub api_token: Option<String>,
    /// Quiet period after the last keystroke before a query fires (ms).
    pub debounce_ms: u64,
    /// Minimum query length worth retrieving for.
    pub min_query_len: usize,
    /// Maximum number of results to request.
    pub limit: usize,
    /// Ask the endpoint for raw context instead of a generated answer.
    pub context_only: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct JobConfig {
    /// Give up on a job stream after this long without a terminal event (s).
    pub timeout_secs: u64,
}

impl Default for MnemaConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            capture: CaptureConfig::default(),
            retrieval: RetrievalConfig::default(),
            jobs: JobConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_high_ms: 10_000,
            poll_normal_ms: 20_000,
            poll_low_ms: 60_000,
            min_capture_spacing_ms: 10_000,
            idle_dwell_ms: 30_000,
            similarity_floor: 0.9,
            snippet_chars: 500,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8787".into(),
            api_token: None,
            debounce_ms: 1_500,
            min_query_len: 3,
            limit: 5,
            context_only: true,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

impl CaptureConfig {
    pub fn min_capture_spacing(&self) -> Duration {
        Duration::from_millis(self.min_capture_spacing_ms)
    }

    pub fn idle_dwell(&self) -> Duration {
        Duration::from_millis(self.idle_dwell_ms)
    }
}

impl RetrievalConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl JobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Returns `~/.mnema/`
pub fn default_mnema_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mnema")
}

/// Returns the default config file path: `~/.mnema/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnema_dir().join("config.toml")
}

impl MnemaConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemaConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMA_ENDPOINT, MNEMA_TOKEN,
    /// MNEMA_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMA_ENDPOINT") {
            self.retrieval.endpoint = val;
        }
        if let Ok(val) = std::env::var("MNEMA_TOKEN") {
            self.retrieval.api_token = Some(val);
        }
        if let Ok(val) = std::env::var("MNEMA_LOG_LEVEL") {
            self.agent.log_level = val;
        }
    }
}
