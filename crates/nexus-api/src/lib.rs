//! # nexus-api
//!
//! REST collaborator of the realtime channel.
//!
//! Every request carries `Authorization: Bearer <credential>` read from the
//! shared [`CredentialStore`](nexus_auth::CredentialStore). A 401 response
//! clears the store and is published on [`ApiClient::unauthorized`] so the
//! host can tear down its realtime session.

#![deny(unsafe_code)]

pub mod client;
pub mod errors;

pub use client::ApiClient;
pub use errors::ApiError;
