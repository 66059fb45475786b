//! In-memory transport for tests.
//!
//! [`MockTransport`] records every socket it opens. Tests drive each socket
//! from the server side (`accept`, `deliver`, `fail`, `drop_connection`) and
//! inspect what the client sent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use nexus_auth::Credential;
use parking_lot::Mutex;
use serde_json::Value;
use url::Url;

use crate::transport::{Socket, Transport, TransportError, TransportSink, authenticated_url};

#[derive(Debug)]
struct MockSocketState {
    url: Url,
    sink: TransportSink,
    open: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
    close_request: Arc<Mutex<Option<(u16, String)>>>,
}

/// Transport whose sockets are driven by the test.
#[derive(Clone, Debug, Default)]
pub struct MockTransport {
    sockets: Arc<Mutex<Vec<MockSocketState>>>,
}

impl MockTransport {
    /// No sockets opened yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sockets opened so far.
    pub fn open_count(&self) -> usize {
        self.sockets.lock().len()
    }

    /// Full URL (token included) of socket `index`.
    pub fn url(&self, index: usize) -> Option<Url> {
        self.sockets.lock().get(index).map(|s| s.url.clone())
    }

    /// Full URL of the most recent socket.
    pub fn last_url(&self) -> Option<Url> {
        self.sockets.lock().last().map(|s| s.url.clone())
    }

    /// Complete the handshake of the most recent socket.
    pub fn accept(&self) -> bool {
        self.with_last(|s| {
            s.open.store(true, Ordering::SeqCst);
            s.sink.opened();
        })
    }

    /// Deliver one inbound frame on the most recent socket.
    pub fn deliver(&self, frame: impl Into<String>) -> bool {
        let frame = frame.into();
        self.with_last(|s| s.sink.message(frame))
    }

    /// Deliver a JSON value as one inbound frame.
    pub fn deliver_json(&self, value: &Value) -> bool {
        self.deliver(value.to_string())
    }

    /// Fail the most recent socket: an error report followed by a 1006 close.
    pub fn fail(&self, message: &str) -> bool {
        self.with_last(|s| {
            s.open.store(false, Ordering::SeqCst);
            s.sink.error(TransportError::Protocol(message.to_owned()));
            s.sink.closed(nexus_core::constants::CLOSE_ABNORMAL, "");
        })
    }

    /// Close the most recent socket from the server side.
    pub fn drop_connection(&self, code: u16, reason: &str) -> bool {
        let Some(index) = self.open_count().checked_sub(1) else {
            return false;
        };
        self.drop_connection_on(index, code, reason)
    }

    /// Close socket `index` from the server side.
    pub fn drop_connection_on(&self, index: usize, code: u16, reason: &str) -> bool {
        let sockets = self.sockets.lock();
        let Some(s) = sockets.get(index) else {
            return false;
        };
        s.open.store(false, Ordering::SeqCst);
        s.sink.closed(code, reason);
        true
    }

    /// Frames sent on the most recent socket.
    pub fn sent(&self) -> Vec<String> {
        self.sockets
            .lock()
            .last()
            .map(|s| s.sent.lock().clone())
            .unwrap_or_default()
    }

    /// Frames sent on socket `index`.
    pub fn sent_on(&self, index: usize) -> Vec<String> {
        self.sockets
            .lock()
            .get(index)
            .map(|s| s.sent.lock().clone())
            .unwrap_or_default()
    }

    /// Frames sent on every socket, in socket order.
    pub fn all_sent(&self) -> Vec<String> {
        self.sockets
            .lock()
            .iter()
            .flat_map(|s| s.sent.lock().clone())
            .collect()
    }

    /// Frames sent on the most recent socket, parsed as JSON.
    pub fn sent_json(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .filter_map(|frame| serde_json::from_str(frame).ok())
            .collect()
    }

    /// Close code and reason the client sent on socket `index`, if it closed it.
    pub fn close_request(&self, index: usize) -> Option<(u16, String)> {
        self.sockets
            .lock()
            .get(index)
            .and_then(|s| s.close_request.lock().clone())
    }

    fn with_last(&self, f: impl FnOnce(&MockSocketState)) -> bool {
        let sockets = self.sockets.lock();
        match sockets.last() {
            Some(s) => {
                f(s);
                true
            }
            None => false,
        }
    }
}

impl Transport for MockTransport {
    fn open(&self, url: &Url, credential: &Credential, sink: TransportSink) -> Box<dyn Socket> {
        let open = Arc::new(AtomicBool::new(false));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let close_request = Arc::new(Mutex::new(None));
        self.sockets.lock().push(MockSocketState {
            url: authenticated_url(url, credential),
            sink,
            open: Arc::clone(&open),
            sent: Arc::clone(&sent),
            close_request: Arc::clone(&close_request),
        });
        Box::new(MockSocket {
            open,
            sent,
            close_request,
        })
    }
}

struct MockSocket {
    open: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
    close_request: Arc<Mutex<Option<(u16, String)>>>,
}

impl Socket for MockSocket {
    fn send(&self, frame: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.sent.lock().push(frame.to_owned());
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        self.open.store(false, Ordering::SeqCst);
        let mut request = self.close_request.lock();
        if request.is_none() {
            *request = Some((code, reason.to_owned()));
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
