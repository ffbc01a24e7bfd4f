use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::fingerprint::FingerprintPolicy;
use crate::flow::FlowSettings;
use crate::scheduler::{
    BatchConfig, DEFAULT_BATCH_SIZE, DEFAULT_INTER_BATCH_DELAY, DEFAULT_MAX_CONCURRENT,
};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "INSIGHTS_CONFIG";
/// Config file picked up from the working directory
pub const LOCAL_CONFIG_FILE: &str = "insights.toml";

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub discovery: DiscoveryConfig,
    pub forecast: ForecastConfig,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a cached result stays valid
    pub ttl_secs: u64,
    pub fingerprint_policy: FingerprintPolicy,
    /// Sled directory for the persistent cache
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            fingerprint_policy: FingerprintPolicy::Identity,
            path: PathBuf::from("./data/insights-cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub max_concurrent: usize,
    pub inter_batch_delay_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            inter_batch_delay_ms: u64::try_from(DEFAULT_INTER_BATCH_DELAY.as_millis())
                .unwrap_or(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Tickets forwarded to discovery and targeted analysis
    pub sample_size: usize,
    /// Free-text fields are truncated to this many characters after scrubbing
    pub max_text_chars: usize,
    pub max_messages_per_ticket: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sample_size: 200,
            max_text_chars: 500,
            max_messages_per_ticket: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Most recent tickets forwarded per agent
    pub recent_tickets: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self { recent_tickets: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Bearer token; `INSIGHTS_API_KEY` takes precedence
    pub api_key: Option<String>,
    /// Tool names advertised to targeted analysis
    pub available_tools: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8090/v1/analyze".to_string(),
            timeout_secs: 60,
            api_key: None,
            available_tools: vec![
                "ticket_search".to_string(),
                "trend_analysis".to_string(),
                "segment_comparison".to_string(),
            ],
        }
    }
}

impl InsightsConfig {
    /// Load using the standard search order, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from {CONFIG_ENV_VAR}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV_VAR}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV_VAR} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file. Unknown keys are logged, not rejected.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every range; all problems are reported together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.cache.ttl_secs == 0 {
            errors.push("cache.ttl_secs must be > 0".to_string());
        }
        if self.scheduler.batch_size == 0 {
            errors.push("scheduler.batch_size must be >= 1".to_string());
        }
        if self.scheduler.max_concurrent == 0 {
            errors.push("scheduler.max_concurrent must be >= 1".to_string());
        }
        if self.discovery.sample_size == 0 {
            errors.push("discovery.sample_size must be >= 1".to_string());
        }
        if self.discovery.max_text_chars == 0 {
            errors.push("discovery.max_text_chars must be >= 1".to_string());
        }
        if self.forecast.recent_tickets == 0 {
            errors.push("forecast.recent_tickets must be >= 1".to_string());
        }
        if self.inference.timeout_secs == 0 {
            errors.push("inference.timeout_secs must be > 0".to_string());
        }
        if !self.inference.endpoint.starts_with("http://")
            && !self.inference.endpoint.starts_with("https://")
        {
            errors.push(format!(
                "inference.endpoint '{}' must be an http(s) URL",
                self.inference.endpoint
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_secs)
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig::new(
            self.scheduler.batch_size,
            self.scheduler.max_concurrent,
            Duration::from_millis(self.scheduler.inter_batch_delay_ms),
        )
    }

    pub fn flow_settings(&self) -> FlowSettings {
        FlowSettings {
            fingerprint_policy: self.cache.fingerprint_policy,
            batch: self.batch_config(),
            sample_size: self.discovery.sample_size,
            forecast_recent_tickets: self.forecast.recent_tickets,
            available_tools: self.inference.available_tools.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({0:?}): {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("Config parse error ({0:?}): {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("Config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}
