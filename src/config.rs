//! Configuration for the device telemetry agent.

use crate::host::AuthorizationStatus;
use crate::snapshot::{DEFAULT_PROBE_SCHEME, DEFAULT_SETTINGS_TIMEOUT};
use crate::submit::{CollectorEndpoint, DEFAULT_COLLECTOR_URL};
use crate::trigger::{DEFAULT_SCHEDULE_ID, DEFAULT_SCHEDULE_INTERVAL};
use crate::window::DEFAULT_WINDOW_BUDGET;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Delay between a manual trigger and the pipeline run.
pub const DEFAULT_MANUAL_DELAY: Duration = Duration::from_secs(6);

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the collector (the device data path is appended)
    pub collector_url: String,

    /// Timeout for a single submission request
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Identifier of the recurring schedule
    pub schedule_id: String,

    /// Interval of the recurring schedule
    #[serde(with = "duration_serde")]
    pub schedule_interval: Duration,

    /// Delay before a manual run starts
    #[serde(with = "duration_serde")]
    pub manual_delay: Duration,

    /// Bound on the notification settings wait (null waits indefinitely)
    #[serde(with = "optional_duration_serde")]
    pub settings_timeout: Option<Duration>,

    /// Background execution budget per window (null for no deadline)
    #[serde(with = "optional_duration_serde")]
    pub window_budget: Option<Duration>,

    /// URL scheme of the third-party app to probe for
    pub probe_scheme: String,

    /// Report this notification status instead of asking the system
    pub notification_override: Option<AuthorizationStatus>,

    /// Port of the local wake listener (disabled when unset)
    pub wake_port: Option<u16>,

    /// Path for the installation identifier and activity stats
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("device-telemetry-agent");

        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            schedule_id: DEFAULT_SCHEDULE_ID.to_string(),
            schedule_interval: DEFAULT_SCHEDULE_INTERVAL,
            manual_delay: DEFAULT_MANUAL_DELAY,
            settings_timeout: Some(DEFAULT_SETTINGS_TIMEOUT),
            window_budget: Some(DEFAULT_WINDOW_BUDGET),
            probe_scheme: DEFAULT_PROBE_SCHEME.to_string(),
            notification_override: None,
            wake_port: None,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("device-telemetry-agent")
            .join("config.json")
    }

    /// Where activity counters are persisted.
    pub fn activity_path(&self) -> PathBuf {
        self.data_path.join("activity.json")
    }

    /// Check the values that would otherwise only fail at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        CollectorEndpoint::parse(&self.collector_url)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.schedule_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "schedule_interval must be positive".to_string(),
            ));
        }
        if self.schedule_id.trim().is_empty() {
            return Err(ConfigError::Invalid("schedule_id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration (whole seconds).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Option<Duration> (whole seconds or null).
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
