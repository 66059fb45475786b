//! Session configuration.

use std::time::Duration;

use nexus_core::constants::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_HISTORY_CAPACITY, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_RECONNECT_INTERVAL_MS,
};
use nexus_settings::RealtimeSettings;
use url::Url;

/// Configuration for one [`RealtimeClient`](crate::RealtimeClient).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Socket URL without the token query parameter.
    pub url: Url,
    /// Whether involuntary closes trigger automatic reconnect.
    pub reconnect: bool,
    /// Reconnect budget.
    pub max_reconnect_attempts: u32,
    /// Fixed delay before each automatic reconnect.
    pub reconnect_interval: Duration,
    /// Interval between application-level pings.
    pub heartbeat_interval: Duration,
    /// Number of events kept in the in-memory history. Clamped to at least 1.
    pub history_capacity: usize,
}

impl RealtimeConfig {
    /// Defaults for everything but the URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect: true,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &RealtimeSettings) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(&settings.url)?,
            reconnect: settings.reconnect,
            max_reconnect_attempts: settings.max_reconnect_attempts,
            reconnect_interval: Duration::from_millis(settings.reconnect_interval_ms),
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            history_capacity: settings.history_capacity,
        })
    }

    /// Disable automatic reconnect.
    #[must_use]
    pub fn without_reconnect(mut self) -> Self {
        self.reconnect = false;
        self
    }

    /// Override the reconnect budget and delay.
    #[must_use]
    pub fn with_reconnect(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.reconnect = true;
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_interval = interval;
        self
    }

    /// Override the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override the history capacity.
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }
}
