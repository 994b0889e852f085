//! Common configuration types for the room client crates.

use serde::{Deserialize, Serialize};

/// Default tracing filter when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "room_client=debug";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing filter directive (e.g. `room_client=debug,info`)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}
