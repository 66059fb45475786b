//! Credential store errors.

/// Why the credential slot could not be written or cleared.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential file could not be encoded.
    #[error("credential file encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The credential file could not be written or removed.
    #[error("credential file access failed: {0}")]
    Io(#[from] std::io::Error),

    /// An empty credential cannot be stored.
    #[error("credential is empty")]
    EmptyCredential,
}
