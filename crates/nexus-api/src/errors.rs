//! REST client error types.

/// Errors returned by [`ApiClient`](crate::ApiClient).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("unexpected response body: {0}")]
    Json(#[from] serde_json::Error),

    /// No credential is stored; the user must log in.
    #[error("no credential available")]
    NoCredential,

    /// The server rejected the credential; it has been cleared.
    #[error("credential rejected by server")]
    Unauthorized,

    /// Any other non-success status.
    #[error("request failed ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
}

impl ApiError {
    /// Whether the caller must re-authenticate before retrying.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::NoCredential | Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        let err = ApiError::Status {
            status: 404,
            body: "task not found".into(),
        };
        assert_eq!(err.to_string(), "request failed (404): task not found");
    }

    #[test]
    fn login_required_classification() {
        assert!(ApiError::Unauthorized.requires_login());
        assert!(ApiError::NoCredential.requires_login());
        assert!(
            !ApiError::Status {
                status: 500,
                body: String::new()
            }
            .requires_login()
        );
    }
}
