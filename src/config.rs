// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Loads the target address and tuning knobs from a TOML file, with the
//! address overridable from the `MAC_ADDRESS` environment variable. All
//! validation happens here, before the monitor starts.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::bluetooth::{Address, AddressError};

/// Environment variable that overrides the configured address.
pub const ADDRESS_ENV: &str = "MAC_ADDRESS";

const APP_DIR: &str = "bt-keeper";

/// Fatal configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("MAC_ADDRESS is not set (config file or environment)")]
    MissingAddress,

    #[error("MAC_ADDRESS '{value}' is not a valid XX:XX:XX:XX:XX:XX address: {source}")]
    InvalidAddress { value: String, source: AddressError },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raw target address as written by the operator.
    #[serde(rename = "MAC_ADDRESS", alias = "mac_address")]
    pub mac_address: String,

    /// Validated target address. Filled in by [`Config::validate`].
    #[serde(skip)]
    pub address: Option<Address>,

    /// Singleton lock artifact.
    pub lock_file: PathBuf,

    /// Reconnect cadence and backoff.
    pub monitor: MonitorConfig,

    /// Device control backend settings.
    pub control: ControlConfig,

    /// Log sinks.
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between cycles.
    pub poll_interval_secs: u64,

    /// Consecutive connect failures before the long backoff.
    pub max_failures: u32,

    /// Length of the long backoff in seconds.
    pub backoff_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            max_failures: 5,
            backoff_secs: 120,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

/// Which implementation talks to the Bluetooth subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Bluetoothctl,
    Bluez,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub backend: Backend,

    /// Control tool for the `bluetoothctl` backend.
    pub program: String,

    pub query_timeout_secs: u64,
    pub power_timeout_secs: u64,
    pub pair_timeout_secs: u64,
    pub trust_timeout_secs: u64,
    pub connect_timeout_secs: u64,

    /// Refuse to start unless the bluetooth service is active.
    pub require_service: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Bluetoothctl,
            program: "bluetoothctl".to_string(),
            query_timeout_secs: 10,
            power_timeout_secs: 5,
            pair_timeout_secs: 30,
            trust_timeout_secs: 5,
            connect_timeout_secs: 15,
            require_service: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when RUST_LOG is unset.
    pub level: String,

    /// Preferred directory for the log file.
    pub directory: PathBuf,

    pub file_name: String,

    /// Write to stdout.
    pub console: bool,

    /// Write to the log file.
    pub file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("logs"),
            file_name: format!("{}.log", APP_DIR),
            console: true,
            file: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mac_address: String::new(),
            address: None,
            lock_file: std::env::temp_dir().join(format!("{}.lock", APP_DIR)),
            monitor: MonitorConfig::default(),
            control: ControlConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Load configuration, apply the environment override, and validate.
    ///
    /// An explicitly given path must exist; the default path may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        let mut config = if required || config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
                    path: config_path.clone(),
                    source,
                })?;
            Self::from_toml_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a key-value lookup (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ADDRESS_ENV).filter(|v| !v.trim().is_empty()) {
            self.mac_address = value;
        }
    }

    /// Check every setting and resolve the target address.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        let raw = self.mac_address.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingAddress);
        }

        let address = raw
            .parse::<Address>()
            .map_err(|source| ConfigError::InvalidAddress {
                value: raw.to_string(),
                source,
            })?;

        if self.monitor.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "monitor.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.monitor.max_failures == 0 {
            return Err(ConfigError::Invalid(
                "monitor.max_failures must be at least 1".to_string(),
            ));
        }
        if self.control.program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "control.program must not be empty".to_string(),
            ));
        }

        self.address = Some(address);
        Ok(())
    }

    /// Validated target address.
    pub fn target(&self) -> Result<Address, ConfigError> {
        self.address.ok_or(ConfigError::MissingAddress)
    }
}
