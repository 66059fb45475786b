//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the keys it overrides.

mod client;
mod realtime;

pub use client::*;
pub use realtime::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Nexus client.
///
/// ```json
/// {
///   "realtime": { "url": "wss://nexus.example.com/ws" },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NexusSettings {
    /// Realtime channel settings.
    pub realtime: RealtimeSettings,
    /// REST API settings.
    pub api: ApiSettings,
    /// Credential storage settings.
    pub auth: AuthSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let settings: NexusSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.realtime.max_reconnect_attempts, 5);
        assert_eq!(settings.api.timeout_ms, 30_000);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let settings: NexusSettings =
            serde_json::from_str(r#"{"realtime": {"reconnect": false}}"#).unwrap();
        assert!(!settings.realtime.reconnect);
        assert_eq!(settings.realtime.reconnect_interval_ms, 3_000);
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(NexusSettings::default()).unwrap();
        assert!(value["realtime"]["maxReconnectAttempts"].is_number());
        assert!(value["api"]["baseUrl"].is_string());
        assert!(value["auth"]["credentialFile"].is_string());
    }
}
