use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broadcast::registry::{DEFAULT_OUTBOX_CAPACITY, DEFAULT_SEND_TIMEOUT};
use crate::monitoring::prober::{DEFAULT_SLOW_THRESHOLD_MS, DEFAULT_TIMEOUT};
use crate::monitoring::scheduler::{DEFAULT_MAX_CONCURRENT_PROBES, DEFAULT_SWEEP_DELAY, SchedulerConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("Failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseFailed(String),
    #[error("No config path available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub database: DatabaseConfig,
    pub monitoring: Monitoring,
    pub broadcast: Broadcast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: String,
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    pub sweep_delay_seconds: u64,
    pub timeout_seconds: u64,
    pub slow_threshold_ms: u64,
    pub max_concurrent_probes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Broadcast {
    pub send_timeout_ms: u64,
    pub outbox_capacity: usize,
}

impl Default for Server {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8000, shutdown_timeout_seconds: 10 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "beacon.db".into() }
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            sweep_delay_seconds: DEFAULT_SWEEP_DELAY.as_secs(),
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl Default for Broadcast {
    fn default() -> Self {
        Self {
            send_timeout_ms: DEFAULT_SEND_TIMEOUT.as_millis() as u64,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl Monitoring {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            sweep_delay: Duration::from_secs(self.sweep_delay_seconds),
            max_concurrent_probes: self.max_concurrent_probes,
        }
    }
}

impl Broadcast {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/beacon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("beacon/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_1(f, "Shutdown Timeout (s)", &self.server.shutdown_timeout_seconds)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Sweep Delay (s)", &self.monitoring.sweep_delay_seconds)?;
        write_1(f, "Probe Timeout (s)", &self.monitoring.timeout_seconds)?;
        write_1(f, "Slow Threshold (ms)", &self.monitoring.slow_threshold_ms)?;
        write_1(f, "Max Concurrent Probes", &self.monitoring.max_concurrent_probes)?;
        write_title_1(f, "Broadcast")?;
        write_1(f, "Send Timeout (ms)", &self.broadcast.send_timeout_ms)?;
        write_1(f, "Outbox Capacity", &self.broadcast.outbox_capacity)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/beacon/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(ConfigError::ReadFailed)?;
            Self::from_toml(&raw_string)?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|err| ConfigError::ParseFailed(err.to_string()))
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String =
            toml::to_string_pretty(self).map_err(|err| ConfigError::ParseFailed(err.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(ConfigError::WriteFailed)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        const MIN_TIMEOUT: u64 = 1;
        const MAX_TIMEOUT: u64 = 300; // 5 minutes

        let m = &self.monitoring;
        if !(MIN_TIMEOUT..=MAX_TIMEOUT).contains(&m.timeout_seconds) {
            return Err(ConfigError::Invalid(format!(
                "monitoring.timeout_seconds must be between {MIN_TIMEOUT} and {MAX_TIMEOUT}, got {}",
                m.timeout_seconds
            )));
        }
        if m.sweep_delay_seconds == 0 {
            return Err(ConfigError::Invalid("monitoring.sweep_delay_seconds must be at least 1".into()));
        }
        if m.max_concurrent_probes == 0 {
            return Err(ConfigError::Invalid("monitoring.max_concurrent_probes must be at least 1".into()));
        }
        if self.broadcast.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid("broadcast.send_timeout_ms must be at least 1".into()));
        }
        if self.broadcast.outbox_capacity == 0 {
            return Err(ConfigError::Invalid("broadcast.outbox_capacity must be at least 1".into()));
        }

        Ok(())
    }
}
