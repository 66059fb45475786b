//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`NexusSettings::default()`]
//! 2. If `~/.nexus/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `NEXUS_*` environment variable overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::NexusSettings;

/// Accepted `realtime.reconnectIntervalMs` values.
pub const RECONNECT_INTERVAL_MS: RangeInclusive<u64> = 100..=600_000;

/// Accepted `realtime.heartbeatIntervalMs` values.
pub const HEARTBEAT_INTERVAL_MS: RangeInclusive<u64> = 1_000..=600_000;

/// Resolve the Nexus data directory (`~/.nexus`).
pub fn nexus_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".nexus")
}

/// Resolve the path to the settings file (`~/.nexus/settings.json`).
pub fn settings_path() -> PathBuf {
    nexus_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<NexusSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values are
/// errors.
pub fn load_settings_from_path(path: &Path) -> Result<NexusSettings> {
    let defaults = serde_json::to_value(NexusSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: NexusSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Resolve the credential file path, relative to `~/.nexus` unless absolute.
pub fn credential_path(settings: &NexusSettings) -> PathBuf {
    let file = Path::new(&settings.auth.credential_file);
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        nexus_home().join(file)
    }
}

/// Reject settings the client cannot run with.
pub fn validate(settings: &NexusSettings) -> Result<()> {
    let rt = &settings.realtime;
    if rt.history_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "realtime.historyCapacity must be greater than 0".into(),
        ));
    }
    check_range(
        "realtime.reconnectIntervalMs",
        rt.reconnect_interval_ms,
        &RECONNECT_INTERVAL_MS,
    )?;
    check_range(
        "realtime.heartbeatIntervalMs",
        rt.heartbeat_interval_ms,
        &HEARTBEAT_INTERVAL_MS,
    )?;
    if !(rt.url.starts_with("ws://") || rt.url.starts_with("wss://")) {
        return Err(SettingsError::InvalidValue(format!(
            "realtime.url must be a ws:// or wss:// URL, got {}",
            rt.url
        )));
    }
    if settings.auth.credential_key.is_empty() {
        return Err(SettingsError::InvalidValue(
            "auth.credentialKey must not be empty".into(),
        ));
    }
    Ok(())
}

fn check_range(key: &str, value: u64, range: &RangeInclusive<u64>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(SettingsError::InvalidValue(format!(
        "{key} must be within {}..={}, got {value}",
        range.start(),
        range.end()
    )))
}

/// Apply `NEXUS_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut NexusSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are ignored with a warning and the file/default value is
/// kept.
pub fn apply_overrides_with(settings: &mut NexusSettings, lookup: impl Fn(&str) -> Option<String>) {
    // ── Realtime ────────────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "NEXUS_WS_URL") {
        settings.realtime.url = v;
    }
    if let Some(v) = read_parsed(&lookup, "NEXUS_RECONNECT", parse_bool) {
        settings.realtime.reconnect = v;
    }
    if let Some(v) = read_parsed(&lookup, "NEXUS_MAX_RECONNECT_ATTEMPTS", |s| {
        parse_u32_range(s, 0, 100)
    }) {
        settings.realtime.max_reconnect_attempts = v;
    }
    if let Some(v) = read_parsed(&lookup, "NEXUS_RECONNECT_INTERVAL_MS", |s| {
        parse_u64_range(s, *RECONNECT_INTERVAL_MS.start(), *RECONNECT_INTERVAL_MS.end())
    }) {
        settings.realtime.reconnect_interval_ms = v;
    }
    if let Some(v) = read_parsed(&lookup, "NEXUS_HEARTBEAT_INTERVAL_MS", |s| {
        parse_u64_range(s, *HEARTBEAT_INTERVAL_MS.start(), *HEARTBEAT_INTERVAL_MS.end())
    }) {
        settings.realtime.heartbeat_interval_ms = v;
    }

    // ── REST / logging ──────────────────────────────────────────────
    if let Some(v) = read_string(&lookup, "NEXUS_API_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_string(&lookup, "NEXUS_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

fn read_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = lookup(name)?;
    let parsed = parse(&val);
    if parsed.is_none() {
        warn!(key = name, value = %val, "invalid env var, ignoring");
    }
    parsed
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
