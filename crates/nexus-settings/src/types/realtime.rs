//! Realtime channel settings.

use nexus_core::constants::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};

/// Settings for the realtime task update channel.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeSettings {
    /// Socket URL without the token query parameter.
    pub url: String,
    /// Whether involuntary closes trigger automatic reconnect.
    pub reconnect: bool,
    /// Reconnect budget.
    pub max_reconnect_attempts: u32,
    /// Delay before each automatic reconnect, in milliseconds.
    pub reconnect_interval_ms: u64,
    /// Application-level ping interval, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Number of events kept in memory.
    pub history_capacity: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".to_string(),
            reconnect: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}
