//! Observable connection state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection state of a realtime session.
///
/// Only the session mutates this value; consumers observe it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket is open. Initial state.
    #[default]
    Disconnected,
    /// A socket has been requested and is handshaking.
    Connecting,
    /// The socket is open and the session is live.
    Connected,
    /// The socket reported an error; a close follows.
    Error,
}

impl ConnectionState {
    /// Whether the session can currently transmit frames.
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Wire/log name of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
