//! # nexus-auth
//!
//! The bearer credential shared by the REST client and the realtime channel.
//!
//! The credential is an opaque string kept in a durable single slot under a
//! well-known key. It is read at connect/request time and cleared when the
//! REST peer rejects it.

#![deny(unsafe_code)]

pub mod credential;
pub mod errors;
pub mod store;

pub use credential::Credential;
pub use errors::AuthError;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
