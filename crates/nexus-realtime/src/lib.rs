//! # nexus-realtime
//!
//! The realtime task update channel: a token-authenticated, long-lived
//! socket that streams task and agent lifecycle events to in-process
//! consumers.
//!
//! Components, leaves first:
//!
//! - [`transport`]: the full-duplex frame socket ([`WsTransport`] over
//!   `tokio-tungstenite`, [`testing::MockTransport`] for tests)
//! - [`machine`]: the pure connection state machine and reconnect budget
//! - [`heartbeat`]: periodic application-level ping timer
//! - [`router`]: frame parsing, bounded [`history`], and listener fan-out
//! - [`subscriptions`]: server-side subscription intent and reconcile
//! - [`client`]: [`RealtimeClient`], the shared session handle that runs
//!   everything above on one serialized context
//! - [`view`]: [`TaskView`], a per-consumer view holding a [`task_log`]

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod heartbeat;
pub mod history;
pub mod machine;
pub mod router;
pub mod subscriptions;
pub mod task_log;
pub mod testing;
pub mod transport;
pub mod view;

pub use client::{RealtimeClient, SessionNotice};
pub use config::RealtimeConfig;
pub use machine::{ReconnectState, SessionMachine};
pub use router::EventStream;
pub use task_log::{AgentSnapshot, TaskEventLog};
pub use transport::ws::WsTransport;
pub use transport::{Socket, Transport, TransportError, TransportEvent, TransportSink};
pub use view::TaskView;

pub use nexus_core::{ClientFrame, ConnectionState, Event, EventType, TaskId};
