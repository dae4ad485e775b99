use crate::domain::DeviceType;
use crate::supervisor::{AlertStoreConfig, RegistryConfig, SupervisorConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub supervisor: SupervisorSettings,
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Health server port (default: 9100)
    #[serde(default)]
    pub health_port: Option<u16>,
    /// Device families probed over TCP
    #[serde(default)]
    pub families: Vec<FamilyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSettings {
    /// Seconds between probe cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Per-family timeout for client acquisition and probing
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    /// Consecutive failures before an alarm
    #[serde(default = "default_alarm_threshold")]
    pub alarm_threshold: u32,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_alarm_threshold() -> u32 {
    3
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            probe_timeout_secs: default_probe_timeout(),
            alarm_threshold: default_alarm_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertSettings {
    /// Alert buffer capacity
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Query limit when none is given
    #[serde(default = "default_query_limit")]
    pub default_query_limit: usize,
}

fn default_capacity() -> usize {
    1000
}

fn default_query_limit() -> usize {
    100
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            default_query_limit: default_query_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// One device family probed by the TCP adapter
#[derive(Debug, Clone, Deserialize)]
pub struct FamilyConfig {
    /// Family name, e.g. "camera"
    pub family: String,
    pub device_type: DeviceType,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Stable device id, e.g. "camera_frontdoor"
    pub id: String,
    /// Display name
    pub name: String,
    /// `ip:port`
    pub address: String,
}

impl AppConfig {
    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("supervisor.poll_interval_secs", 60)?
            .set_default("supervisor.probe_timeout_secs", 5)?
            .set_default("supervisor.alarm_threshold", 3)?
            .set_default("alerts.capacity", 1000)?
            .set_default("alerts.default_query_limit", 100)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("DEVWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (DEVWATCH_SUPERVISOR__POLL_INTERVAL_SECS, etc.)
            .add_source(
                Environment::with_prefix("DEVWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: Duration::from_secs(self.supervisor.poll_interval_secs),
            probe_timeout: Duration::from_secs(self.supervisor.probe_timeout_secs),
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            alarm_threshold: self.supervisor.alarm_threshold,
            poll_interval: Duration::from_secs(self.supervisor.poll_interval_secs),
            probe_timeout: Duration::from_secs(self.supervisor.probe_timeout_secs),
        }
    }

    pub fn alert_store_config(&self) -> AlertStoreConfig {
        AlertStoreConfig {
            capacity: self.alerts.capacity,
            default_query_limit: self.alerts.default_query_limit,
        }
    }

    pub fn health_port(&self) -> u16 {
        self.health_port.unwrap_or(9100)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.supervisor.poll_interval_secs == 0 {
            errors.push("poll_interval_secs must be positive".to_string());
        }

        if self.supervisor.probe_timeout_secs == 0 {
            errors.push("probe_timeout_secs must be positive".to_string());
        }

        if self.supervisor.probe_timeout_secs >= self.supervisor.poll_interval_secs {
            errors.push("probe_timeout_secs should be less than poll_interval_secs".to_string());
        }

        if self.supervisor.alarm_threshold == 0 {
            errors.push("alarm_threshold must be at least 1".to_string());
        }

        if self.alerts.capacity == 0 {
            errors.push("alerts.capacity must be positive".to_string());
        }

        let mut families = HashSet::new();
        let mut ids = HashSet::new();
        for family in &self.families {
            if !families.insert(family.family.as_str()) {
                errors.push(format!("duplicate family: {}", family.family));
            }
            for target in &family.targets {
                if !ids.insert(target.id.as_str()) {
                    errors.push(format!("duplicate device id: {}", target.id));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
