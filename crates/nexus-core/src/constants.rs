//! Protocol constants shared by the realtime crates.

/// Current version of the Nexus client (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query parameter that carries the credential on the socket URL.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Close code sent on a deliberate client disconnect.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close reason sent on a deliberate client disconnect.
pub const CLOSE_REASON_CLIENT: &str = "Client disconnect";

/// Close code reported when a socket drops without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code reported when a close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Default number of events kept in the in-memory history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default ceiling on automatic reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Default delay before an automatic reconnect, in milliseconds.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;

/// Default interval between application-level pings, in milliseconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
