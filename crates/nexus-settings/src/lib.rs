//! # nexus-settings
//!
//! Configuration management with layered sources for the Nexus client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`NexusSettings::default()`]
//! 2. **User file** — `~/.nexus/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `NEXUS_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, apply_overrides_with, credential_path, deep_merge, load_settings,
    load_settings_from_path, nexus_home, settings_path, validate,
};
pub use types::*;
