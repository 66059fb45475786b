//! Opaque bearer credential.

use std::fmt;

/// Opaque bearer token.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token. Returns `None` for blank input.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == token.len() {
            Some(Self(token))
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// The raw token.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value.
    #[must_use]
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} chars>)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(Credential::new("").is_none());
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(Credential::new(" tok \n").unwrap().expose(), "tok");
    }

    #[test]
    fn debug_is_redacted() {
        let c = Credential::new("super-secret").unwrap();
        let debug = format!("{c:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("12 chars"));
    }

    #[test]
    fn bearer_header_format() {
        assert_eq!(Credential::new("tok").unwrap().bearer_header(), "Bearer tok");
    }
}
