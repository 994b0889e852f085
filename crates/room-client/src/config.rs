//! Room client configuration.
//!
//! Configuration is loaded from environment variables. Nothing here is
//! sensitive, so `Debug` is derived.

use crate::media::DeviceInfo;
use common::config::{ObservabilityConfig, DEFAULT_LOG_FILTER};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default grace delay between leaving the room and closing signaling.
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 250;

/// Default lifetime of info notices.
pub const DEFAULT_NOTICE_TIMEOUT_MS: u64 = 3000;

/// Default lifetime of error notices.
pub const DEFAULT_ERROR_NOTICE_TIMEOUT_MS: u64 = 5000;

/// Default device descriptor flag.
pub const DEFAULT_DEVICE_FLAG: &str = "rust";

/// Default device descriptor name.
pub const DEFAULT_DEVICE_NAME: &str = "room-client";

/// Length of generated peer names.
const PEER_NAME_LENGTH: usize = 8;

/// Room client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Room identifier.
    pub room_id: String,

    /// Stable name of the local peer (random when not configured).
    pub peer_name: String,

    /// Display name override. When `None` the stored preference is used,
    /// falling back to `"Guest"`.
    pub display_name: Option<String>,

    /// Device descriptor announced when joining.
    pub device: DeviceInfo,

    /// Whether local producers are created during join (default: true).
    pub produce: bool,

    /// Delay between leaving the room and closing signaling (default: 250ms).
    pub close_grace: Duration,

    /// Lifetime of info notices (default: 3s).
    pub notice_timeout: Duration,

    /// Lifetime of error notices (default: 5s).
    pub error_notice_timeout: Duration,

    /// JSON preference file. When `None` preferences are kept in memory.
    pub preferences_path: Option<PathBuf>,

    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let room_id = vars
            .get("ROOM_ID")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("ROOM_ID".to_string()))?
            .clone();

        let peer_name = vars
            .get("ROOM_PEER_NAME")
            .cloned()
            .unwrap_or_else(generate_peer_name);

        let display_name = vars.get("ROOM_DISPLAY_NAME").cloned();

        let device = DeviceInfo {
            flag: vars
                .get("ROOM_DEVICE_FLAG")
                .cloned()
                .unwrap_or_else(|| DEFAULT_DEVICE_FLAG.to_string()),
            name: vars
                .get("ROOM_DEVICE_NAME")
                .cloned()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
            version: vars
                .get("ROOM_DEVICE_VERSION")
                .cloned()
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        };

        let produce = parse_bool(vars, "ROOM_PRODUCE", true)?;

        let close_grace = parse_millis(vars, "ROOM_CLOSE_GRACE_MS", DEFAULT_CLOSE_GRACE_MS)?;
        let notice_timeout =
            parse_millis(vars, "ROOM_NOTICE_TIMEOUT_MS", DEFAULT_NOTICE_TIMEOUT_MS)?;
        let error_notice_timeout = parse_millis(
            vars,
            "ROOM_ERROR_NOTICE_TIMEOUT_MS",
            DEFAULT_ERROR_NOTICE_TIMEOUT_MS,
        )?;

        let preferences_path = vars.get("ROOM_PREFERENCES_PATH").map(PathBuf::from);

        let observability = ObservabilityConfig {
            log_filter: vars
                .get("ROOM_LOG_FILTER")
                .cloned()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            json_logs: parse_bool(vars, "ROOM_LOG_JSON", false)?,
        };

        Ok(Config {
            room_id,
            peer_name,
            display_name,
            device,
            produce,
            close_grace,
            notice_timeout,
            error_notice_timeout,
            preferences_path,
            observability,
        })
    }

    /// Minimal configuration for the given room with every default applied.
    #[must_use]
    pub fn for_room(room_id: impl Into<String>) -> Self {
        Config {
            room_id: room_id.into(),
            peer_name: generate_peer_name(),
            display_name: None,
            device: DeviceInfo::default(),
            produce: true,
            close_grace: Duration::from_millis(DEFAULT_CLOSE_GRACE_MS),
            notice_timeout: Duration::from_millis(DEFAULT_NOTICE_TIMEOUT_MS),
            error_notice_timeout: Duration::from_millis(DEFAULT_ERROR_NOTICE_TIMEOUT_MS),
            preferences_path: None,
            observability: ObservabilityConfig::default(),
        }
    }
}

fn generate_peer_name() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PEER_NAME_LENGTH)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn parse_bool(
    vars: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match vars.get(key).map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!("{key}={v}"))),
        },
    }
}

fn parse_millis(
    vars: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match vars.get(key) {
        None => Ok(Duration::from_millis(default)),
        Some(v) => v
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={v}"))),
    }
}
