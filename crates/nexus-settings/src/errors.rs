//! Errors raised while loading `~/.nexus/settings.json`.

use thiserror::Error;

/// Why the client settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read nexus settings: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON or does not match the schema.
    #[error("malformed nexus settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A value the realtime client cannot run with.
    #[error("unusable nexus setting: {0}")]
    InvalidValue(String),
}

/// `Result` with [`SettingsError`].
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("historyCapacity must be > 0".into());
        assert_eq!(
            err.to_string(),
            "unusable nexus setting: historyCapacity must be > 0"
        );
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: SettingsError = json_err.into();
        assert!(err.to_string().starts_with("malformed nexus settings"));
    }
}
