use clap::Parser;
use lib_common::core::{ManagerOptions, SchedulerPolicy, TickSchedule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "server_sse.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Live stock price push server (Server-Sent Events)", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "SSE_PORT", help = "Port to listen on for client connections.")]
    pub port: Option<u16>,

    #[clap(long, env = "SSE_HOST", help = "Interface or host name to bind to.")]
    pub host: Option<String>,

    #[clap(long, env = "SSE_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "SSE_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "SSE_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error, off).")]
    pub log_level: Option<String>,

    #[clap(long, env = "SSE_API_ROOT", help = "Path prefix of the API routes.")]
    pub api_root: Option<String>,

    #[clap(long, env = "SSE_MIN_DELAY_MS", help = "Shortest delay in milliseconds between two price updates.")]
    pub min_delay_ms: Option<u64>,

    #[clap(long, env = "SSE_MAX_DELAY_MS", help = "Exclusive upper bound in milliseconds of the delay between updates.")]
    pub max_delay_ms: Option<u64>,

    #[clap(long, env = "SSE_SEED", help = "Seed for a replayable sequence of updates.")]
    pub seed: Option<i64>,

    #[clap(long, env = "SSE_STOP_WHEN_IDLE", help = "Stop updating prices while nobody is subscribed (true/false).")]
    pub stop_when_idle: Option<bool>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            host: other.host.or(self.host),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            api_root: other.api_root.or(self.api_root),
            min_delay_ms: other.min_delay_ms.or(self.min_delay_ms),
            max_delay_ms: other.max_delay_ms.or(self.max_delay_ms),
            seed: other.seed.or(self.seed),
            stop_when_idle: other.stop_when_idle.or(self.stop_when_idle),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(8080),
            host: Some("127.0.0.1".to_string()),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            api_root: Some("/api/v1".to_string()),
            min_delay_ms: Some(5_000),
            max_delay_ms: Some(10_000),
            stop_when_idle: Some(true),
            ..Default::default()
        }
    }

    /// Validates the merged configuration.
    pub fn into_settings(self) -> Result<Settings, ConfigError> {
        let defaults = Config::defaults();
        let merged = defaults.merge(self);

        let min_delay_ms = merged.min_delay_ms.unwrap_or(5_000);
        let max_delay_ms = merged.max_delay_ms.unwrap_or(10_000);
        if min_delay_ms >= max_delay_ms {
            return Err(ConfigError::InvalidDelays { min_delay_ms, max_delay_ms });
        }

        let api_root = merged.api_root.unwrap_or_default();
        let trimmed = api_root.trim_end_matches('/');
        if !trimmed.starts_with('/') {
            return Err(ConfigError::InvalidApiRoot(api_root));
        }

        let host = merged.host.unwrap_or_default();
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        let policy = if merged.stop_when_idle.unwrap_or(true) {
            SchedulerPolicy::StopWhenIdle
        } else {
            SchedulerPolicy::KeepAlive
        };

        Ok(Settings {
            host,
            port: merged.port.unwrap_or(8080),
            log_dir: merged.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: merged.log_level.unwrap_or_else(|| "info".to_string()),
            api_root: trimmed.to_string(),
            schedule: TickSchedule::new(Duration::from_millis(min_delay_ms), Duration::from_millis(max_delay_ms)),
            policy,
            seed: merged.seed,
        })
    }
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("minDelayMs ({min_delay_ms}) must be below maxDelayMs ({max_delay_ms})")]
    InvalidDelays { min_delay_ms: u64, max_delay_ms: u64 },
    #[error("apiRoot must start with '/' and name at least one segment, got {0:?}")]
    InvalidApiRoot(String),
    #[error("host must not be empty")]
    EmptyHost,
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_dir: PathBuf,
    pub log_level: String,
    /// Without a trailing slash, e.g. `/api/v1`.
    pub api_root: String,
    pub schedule: TickSchedule,
    pub policy: SchedulerPolicy,
    pub seed: Option<i64>,
}

impl Settings {
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            schedule: self.schedule,
            policy: self.policy,
            seed: self.seed,
        }
    }
}

pub fn load_config() -> Config {
    load_config_from(Config::parse())
}

/// Layers defaults, then the JSON config file, then `cli` (which already
/// carries environment variables).
pub fn load_config_from(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current_config = Config::defaults();

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => log::warn!(
                    "Failed to parse config file: {} ({}). Falling back to other sources.",
                    config_file_path.display(),
                    e
                ),
            },
            Err(e) => log::warn!(
                "Failed to read config file: {} ({}). Falling back to other sources.",
                config_file_path.display(),
                e
            ),
        }
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    current_config.merge(cli)
}
