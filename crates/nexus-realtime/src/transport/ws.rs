//! `tokio-tungstenite` socket transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use nexus_auth::Credential;
use nexus_core::constants::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::{Socket, Transport, TransportError, TransportSink, authenticated_url};

/// How long a closing socket waits for the server's close reply.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// WebSocket transport. Each `open` spawns one socket task on the current
/// tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsTransport;

impl WsTransport {
    /// Create the transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &Url, credential: &Credential, sink: TransportSink) -> Box<dyn Socket> {
        let target = authenticated_url(url, credential);
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        debug!(host = target.host_str().unwrap_or_default(), path = target.path(), "opening socket");
        let _ = tokio::spawn(run_socket(
            target,
            rx,
            sink,
            Arc::clone(&open),
            cancel.clone(),
        ));

        Box::new(WsSocket { tx, open, cancel })
    }
}

enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

struct WsSocket {
    tx: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Socket for WsSocket {
    fn send(&self, frame: &str) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.tx
            .send(Outgoing::Text(frame.to_owned()))
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&self, code: u16, reason: &str) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.tx.send(Outgoing::Close {
                code,
                reason: reason.to_owned(),
            });
        } else {
            // Still connecting: abandon the handshake.
            self.cancel.cancel();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

impl Drop for WsSocket {
    fn drop(&mut self) {
        if !self.open.load(Ordering::Acquire) {
            self.cancel.cancel();
        }
    }
}

async fn run_socket(
    target: Url,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    sink: TransportSink,
    open: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        result = connect_async(target.as_str()) => result,
        () = cancel.cancelled() => {
            debug!("socket abandoned before handshake");
            return;
        }
    };

    let ws = match connected {
        Ok((ws, _response)) => ws,
        Err(e) => {
            warn!(error = %e, "socket connect failed");
            sink.error(TransportError::Connect(e.to_string()));
            sink.closed(CLOSE_ABNORMAL, "");
            return;
        }
    };

    let (mut ws_tx, mut ws_rx) = ws.split();
    open.store(true, Ordering::Release);
    sink.opened();

    let mut close_reported = false;
    loop {
        tokio::select! {
            out = outgoing.recv() => {
                let frame = match out {
                    Some(Outgoing::Text(text)) => Message::text(text),
                    Some(Outgoing::Close { code, reason }) => close_message(code, reason),
                    None => close_message(nexus_core::constants::CLOSE_NORMAL, String::new()),
                };
                let closing = matches!(frame, Message::Close(_));
                if let Err(e) = ws_tx.send(frame).await {
                    sink.error(TransportError::Protocol(e.to_string()));
                    break;
                }
                if closing {
                    open.store(false, Ordering::Release);
                    drain_until_closed(&mut ws_rx).await;
                    return;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => sink.message(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => sink.message(text),
                        Err(_) => debug!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        open.store(false, Ordering::Release);
                        let (code, reason) = frame.map_or((CLOSE_NO_STATUS, String::new()), |f| {
                            (u16::from(f.code), f.reason.as_str().to_owned())
                        });
                        sink.closed(code, reason);
                        close_reported = true;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        if !close_reported {
                            sink.error(TransportError::Protocol(e.to_string()));
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    open.store(false, Ordering::Release);
    if !close_reported {
        sink.closed(CLOSE_ABNORMAL, "");
    }
}

fn close_message(code: u16, reason: String) -> Message {
    Message::Close(Some(CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    }))
}

async fn drain_until_closed<S>(ws_rx: &mut S)
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let drained = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, async {
        while let Some(Ok(msg)) = ws_rx.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
    if drained.is_err() {
        debug!("server did not answer close frame");
    }
}
