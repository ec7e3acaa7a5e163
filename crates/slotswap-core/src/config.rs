// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agent configuration.
//!
//! Loaded from a YAML file, then overridden from the environment:
//!
//! - `GITHUB_TOKEN` replaces `github_token` when non-empty
//! - `VERIFY_CHECKSUMS=true` (or `1`) enables checksum verification

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default poll interval in seconds.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Default overall health check timeout in seconds.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 30;

/// Ledger file name used when `state_file` is not set.
pub const DEFAULT_STATE_FILE: &str = "state.yaml";

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Release feed repository, `owner/name`.
    #[serde(default)]
    pub repo: String,
    /// Suffix selecting the asset to deploy (empty = first asset).
    #[serde(default)]
    pub asset_suffix: String,
    /// Seconds between deployment checks.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Directory holding the `blue` and `green` slot directories.
    #[serde(default)]
    pub install_dir: PathBuf,
    /// Live entry point symlink.
    #[serde(default)]
    pub current_symlink: PathBuf,
    /// Install command run inside the staged slot directory.
    #[serde(default)]
    pub run_command: Option<String>,
    /// Command run after a successful switch.
    #[serde(default)]
    pub post_deploy_script: Option<String>,
    /// Ledger path; defaults to `<install_dir>/state.yaml`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// Token for the release feed.
    #[serde(default)]
    pub github_token: Option<String>,
    /// Release feed API base URL.
    #[serde(default)]
    pub github_api_url: Option<String>,
    /// Health endpoint polled before a cutover.
    #[serde(default)]
    pub health_check_url: Option<String>,
    /// Overall health check deadline in seconds.
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout: u64,
    /// Require checksum verification of downloaded assets.
    #[serde(default)]
    pub verify_checksums: bool,
    /// Kill hooks running longer than this many seconds.
    #[serde(default)]
    pub hook_timeout_seconds: Option<u64>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Append logs to this file instead of stdout.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_health_check_timeout() -> u64 {
    DEFAULT_HEALTH_CHECK_TIMEOUT_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load, override from the environment, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML without environment overrides or validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Apply `GITHUB_TOKEN` and `VERIFY_CHECKSUMS`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            if !token.is_empty() {
                self.github_token = Some(token);
            }
        }

        if std::env::var("VERIFY_CHECKSUMS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
        {
            self.verify_checksums = true;
        }
    }

    /// Check required fields and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repo.trim().is_empty() {
            return Err(ConfigError::Missing("repo"));
        }
        if !self.repo.contains('/') {
            return Err(ConfigError::Invalid(
                "repo",
                format!("expected owner/name, got '{}'", self.repo),
            ));
        }
        if self.install_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("install_dir"));
        }
        if self.current_symlink.as_os_str().is_empty() {
            return Err(ConfigError::Missing("current_symlink"));
        }
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "check_interval_seconds",
                "must be greater than 0".to_string(),
            ));
        }
        if self.health_check_url.is_some() && self.health_check_timeout == 0 {
            return Err(ConfigError::Invalid(
                "health_check_timeout",
                "must be greater than 0".to_string(),
            ));
        }
        if self.hook_timeout_seconds == Some(0) {
            return Err(ConfigError::Invalid(
                "hook_timeout_seconds",
                "must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Ledger path.
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.install_dir.join(DEFAULT_STATE_FILE))
    }

    /// Time between deployment checks.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Overall health check deadline.
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout)
    }

    /// Hook timeout, if any.
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_seconds.map(Duration::from_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid YAML for this schema.
    #[error("Failed to parse config: {0}")]
    Parse(#[source] serde_yaml::Error),
    /// A required field is missing or empty.
    #[error("Missing required config field: {0}")]
    Missing(&'static str),
    /// A field has an invalid value.
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
