//! Full-duplex frame transport.
//!
//! A [`Transport`] opens one [`Socket`] per connection attempt. The socket
//! reports upward through a [`TransportSink`]: `opened`, `message`,
//! `closed(code, reason)`, and `error`. Transports do not parse payloads,
//! retry, or heartbeat.

pub mod ws;

use nexus_auth::Credential;
use nexus_core::constants::TOKEN_QUERY_PARAM;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::client::Signal;

/// Errors raised by a transport.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The socket is not in the open state.
    #[error("socket is not open")]
    NotOpen,
    /// The connection or handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The socket failed after opening.
    #[error("socket error: {0}")]
    Protocol(String),
}

/// Something a socket reports upward.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed.
    Opened,
    /// One inbound text frame.
    Message(String),
    /// The socket closed. Final for this socket.
    Closed {
        /// Close code (1006 when the socket dropped without a close frame).
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The socket failed. A `Closed` follows.
    Error(TransportError),
}

/// Upward channel handed to a socket when it is opened.
///
/// Every report is tagged with the epoch of the connection attempt, so
/// reports from a socket the session has already abandoned are ignored.
#[derive(Clone, Debug)]
pub struct TransportSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<Signal>,
}

impl TransportSink {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { epoch, tx }
    }

    /// Report the handshake completed.
    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    /// Report one inbound frame.
    pub fn message(&self, frame: impl Into<String>) {
        self.emit(TransportEvent::Message(frame.into()));
    }

    /// Report the socket closed.
    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    /// Report a socket failure.
    pub fn error(&self, err: TransportError) {
        self.emit(TransportEvent::Error(err));
    }

    /// Whether the session is still listening.
    pub fn is_attached(&self) -> bool {
        !self.tx.is_closed()
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(Signal::Socket {
            epoch: self.epoch,
            event,
        });
    }
}

/// Opens sockets.
pub trait Transport: Send + Sync + 'static {
    /// Open a socket to `url`, authenticating with `credential`.
    ///
    /// Must not block; the handshake proceeds in the background and is
    /// reported through `sink`.
    fn open(&self, url: &Url, credential: &Credential, sink: TransportSink) -> Box<dyn Socket>;
}

/// One underlying socket.
pub trait Socket: Send {
    /// Queue one outbound frame.
    fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Close with a close frame. The socket reports nothing further that the
    /// session acts on.
    fn close(&self, code: u16, reason: &str);

    /// Whether the socket is in the open state.
    fn is_open(&self) -> bool;
}

/// `url` with the credential carried in the `token` query parameter.
///
/// Other query parameters are kept; an existing `token` is replaced.
pub fn authenticated_url(url: &Url, credential: &Credential) -> Url {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != TOKEN_QUERY_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut authed = url.clone();
    authed.set_query(None);
    {
        let mut query = authed.query_pairs_mut();
        for (k, v) in &retained {
            let _ = query.append_pair(k, v);
        }
        let _ = query.append_pair(TOKEN_QUERY_PARAM, credential.expose());
    }
    authed
}
