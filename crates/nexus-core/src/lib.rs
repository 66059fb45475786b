//! # nexus-core
//!
//! Shared vocabulary for the Nexus realtime task update channel.
//!
//! - **Events**: [`events::EventType`] (closed enumeration) and [`events::Event`]
//!   parsed from inbound server frames
//! - **Frames**: [`frames::ClientFrame`] for client → server actions
//! - **IDs**: [`ids::TaskId`], an opaque task identifier
//! - **State**: [`state::ConnectionState`] observable by consumers
//! - **Errors**: [`errors::ParseError`] for inbound frame parsing

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod events;
pub mod frames;
pub mod ids;
pub mod state;

pub use errors::ParseError;
pub use events::{Event, EventType};
pub use frames::ClientFrame;
pub use ids::TaskId;
pub use state::ConnectionState;
