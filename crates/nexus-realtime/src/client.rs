//! The realtime session handle.
//!
//! [`RealtimeClient`] is a cheap `Clone` handle over one session. All
//! session state lives in a single `SessionCore` behind a mutex. Public
//! operations lock it directly; socket reports, heartbeat beats, and
//! reconnect timer firings arrive as [`Signal`]s on one channel that a
//! single pump task drains, so every mutation runs to completion before the
//! next begins.
//!
//! Reports from an abandoned socket and firings of a cancelled timer are
//! recognised by epoch/generation counters and ignored.

use std::sync::{Arc, Weak};

use nexus_auth::{Credential, CredentialStore};
use nexus_core::constants::{CLOSE_NORMAL, CLOSE_REASON_CLIENT};
use nexus_core::{ClientFrame, ConnectionState, Event, TaskId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::RealtimeConfig;
use crate::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::machine::{ReconnectState, SessionEffect, SessionInput, SessionMachine};
use crate::router::{EventStream, Router};
use crate::subscriptions::{FrameSink, SubscriptionManager};
use crate::transport::{Socket, Transport, TransportEvent, TransportSink};
use crate::view::TaskView;

/// Capacity of the [`SessionNotice`] broadcast channel.
const NOTICE_CAPACITY: usize = 256;

/// Lifecycle notifications for observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionNotice {
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// The socket opened.
    Connected,
    /// The socket closed or was closed.
    Disconnected {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// The transport failed.
    Error(String),
    /// A raw inbound frame, before parsing.
    Message(Arc<str>),
}

/// Work queued for the pump task.
#[derive(Debug)]
pub(crate) enum Signal {
    /// A socket report tagged with its connection epoch.
    Socket { epoch: u64, event: TransportEvent },
    /// The reconnect timer of `generation` fired.
    ReconnectDue { generation: u64 },
    /// The heartbeat started for `epoch` ticked.
    Heartbeat { epoch: u64 },
}

/// The current socket, if any, and the epoch its reports carry.
struct Link {
    socket: Option<Box<dyn Socket>>,
    epoch: u64,
}

impl FrameSink for Link {
    fn send_frame(&mut self, frame: &ClientFrame) -> bool {
        let Some(socket) = self.socket.as_ref() else {
            return false;
        };
        let json = match frame.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, action = %frame.action, "failed to encode frame");
                return false;
            }
        };
        match socket.send(&json) {
            Ok(()) => {
                trace!(action = %frame.action, "frame sent");
                true
            }
            Err(e) => {
                debug!(error = %e, action = %frame.action, "frame not sent");
                false
            }
        }
    }
}

struct SessionCore {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    machine: SessionMachine,
    link: Link,
    subscriptions: SubscriptionManager,
    router: Router,
    signals: mpsc::UnboundedSender<Signal>,
    heartbeat: Option<CancellationToken>,
    reconnect_timer: Option<JoinHandle<()>>,
    reconnect_generation: u64,
    state_tx: watch::Sender<ConnectionState>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionCore {
    fn connect(&mut self) {
        if self.machine.state() != ConnectionState::Disconnected {
            debug!(state = %self.machine.state(), "connect ignored, session already active");
            return;
        }
        let Some(credential) = self.credentials.load() else {
            warn!("no credential available, refusing to connect");
            return;
        };
        self.apply(SessionInput::Connect, Some(&credential));
    }

    fn disconnect(&mut self) {
        self.apply(SessionInput::Disconnect, None);
    }

    fn is_connected(&self) -> bool {
        self.machine.state().is_connected()
    }

    fn send(&mut self, frame: &ClientFrame) -> bool {
        if !self.is_connected() {
            debug!(action = %frame.action, state = %self.machine.state(), "send while not connected");
            return false;
        }
        self.link.send_frame(frame)
    }

    fn subscribe(&mut self, task_id: TaskId) -> bool {
        let sink: Option<&mut dyn FrameSink> = if self.is_connected() {
            Some(&mut self.link)
        } else {
            None
        };
        self.subscriptions.subscribe(task_id, sink)
    }

    fn unsubscribe(&mut self, task_id: TaskId) -> bool {
        let sink: Option<&mut dyn FrameSink> = if self.is_connected() {
            Some(&mut self.link)
        } else {
            None
        };
        self.subscriptions.unsubscribe(task_id, sink)
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Socket { epoch, event } => {
                if epoch != self.link.epoch {
                    trace!(epoch, current = self.link.epoch, "ignoring stale socket report");
                    return;
                }
                match event {
                    TransportEvent::Opened => self.apply(SessionInput::Opened, None),
                    TransportEvent::Message(frame) => self.on_message(frame),
                    TransportEvent::Closed { code, reason } => {
                        self.apply(SessionInput::Closed { code, reason }, None);
                    }
                    TransportEvent::Error(e) => self.apply(
                        SessionInput::Errored {
                            message: e.to_string(),
                        },
                        None,
                    ),
                }
            }
            Signal::ReconnectDue { generation } => {
                if generation != self.reconnect_generation {
                    trace!(generation, "ignoring cancelled reconnect timer");
                    return;
                }
                self.reconnect_timer = None;
                if let Some(credential) = self.credentials.load() {
                    info!(
                        attempt = self.machine.reconnect().attempts,
                        max = self.machine.reconnect().max_attempts,
                        "reconnecting"
                    );
                    self.apply(SessionInput::ReconnectDue, Some(&credential));
                } else {
                    warn!("credential cleared before reconnect, staying disconnected");
                    self.apply(SessionInput::Disconnect, None);
                }
            }
            Signal::Heartbeat { epoch } => {
                if epoch == self.link.epoch && self.is_connected() {
                    let _ = self.link.send_frame(&ClientFrame::ping());
                }
            }
        }
    }

    fn on_message(&mut self, frame: String) {
        if !self.is_connected() {
            debug!(state = %self.machine.state(), "dropping frame received outside Connected");
            return;
        }
        let _ = self.notices.send(SessionNotice::Message(Arc::from(frame.as_str())));
        let _ = self.router.route(&frame);
    }

    fn apply(&mut self, input: SessionInput, credential: Option<&Credential>) {
        let effects = self.machine.handle(input);
        self.publish_state();
        for effect in effects {
            self.execute(effect, credential);
        }
    }

    fn publish_state(&self) {
        let state = self.machine.state();
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            debug!(%state, "connection state changed");
            let _ = self.notices.send(SessionNotice::StateChanged(state));
        }
    }

    fn execute(&mut self, effect: SessionEffect, credential: Option<&Credential>) {
        match effect {
            SessionEffect::OpenTransport => match credential {
                Some(credential) => self.open_transport(credential),
                None => warn!("open requested without a credential"),
            },
            SessionEffect::CloseTransport { code, reason } => {
                if let Some(socket) = self.link.socket.take() {
                    socket.close(code, &reason);
                }
                self.link.epoch += 1;
            }
            SessionEffect::ReleaseTransport => {
                self.link.socket = None;
                self.link.epoch += 1;
            }
            SessionEffect::StartHeartbeat => self.start_heartbeat(),
            SessionEffect::StopHeartbeat => {
                if let Some(token) = self.heartbeat.take() {
                    token.cancel();
                }
            }
            SessionEffect::ScheduleReconnect(delay) => self.schedule_reconnect(delay),
            SessionEffect::CancelReconnect => self.cancel_reconnect(),
            SessionEffect::Reconcile => {
                let _ = self.subscriptions.reconcile(&mut self.link);
            }
            SessionEffect::NotifyConnected => {
                info!(url = %self.config.url, "realtime channel connected");
                let _ = self.notices.send(SessionNotice::Connected);
            }
            SessionEffect::NotifyDisconnected { code, reason } => {
                info!(code, reason = %reason, "realtime channel disconnected");
                let _ = self.notices.send(SessionNotice::Disconnected { code, reason });
            }
            SessionEffect::NotifyError(message) => {
                warn!(error = %message, "realtime channel error");
                let _ = self.notices.send(SessionNotice::Error(message));
            }
        }
    }

    fn open_transport(&mut self, credential: &Credential) {
        if let Some(stale) = self.link.socket.take() {
            stale.close(CLOSE_NORMAL, CLOSE_REASON_CLIENT);
        }
        self.link.epoch += 1;
        debug!(epoch = self.link.epoch, "opening transport");
        let sink = TransportSink::new(self.link.epoch, self.signals.clone());
        self.link.socket = Some(self.transport.open(&self.config.url, credential, sink));
    }

    fn start_heartbeat(&mut self) {
        if let Some(previous) = self.heartbeat.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        let epoch = self.link.epoch;
        let signals = self.signals.clone();
        let interval = self.config.heartbeat_interval;
        let cancel = token.clone();
        let _ = tokio::spawn(async move {
            let result = run_heartbeat(interval, cancel, || {
                signals.send(Signal::Heartbeat { epoch }).is_ok()
            })
            .await;
            if result == HeartbeatResult::SinkClosed {
                debug!(epoch, "heartbeat stopped, session gone");
            }
        });
        self.heartbeat = Some(token);
    }

    fn schedule_reconnect(&mut self, delay: std::time::Duration) {
        self.cancel_reconnect();
        let generation = self.reconnect_generation;
        let signals = self.signals.clone();
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt = self.machine.reconnect().attempts,
            "scheduling reconnect"
        );
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(Signal::ReconnectDue { generation });
        }));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.reconnect_generation += 1;
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if let Some(token) = self.heartbeat.take() {
            token.cancel();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(socket) = self.link.socket.take() {
            socket.close(CLOSE_NORMAL, CLOSE_REASON_CLIENT);
        }
    }
}

struct Inner {
    core: Mutex<SessionCore>,
    state_rx: watch::Receiver<ConnectionState>,
    notices: broadcast::Sender<SessionNotice>,
}

/// Shared handle to one realtime session.
///
/// Clones share the session. The session shuts down, closing its socket and
/// cancelling its timers, when the last clone is dropped.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RealtimeClient {
    /// Create a disconnected session.
    ///
    /// Must be called from within a tokio runtime; the session's pump task
    /// is spawned on it.
    pub fn new(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let core = SessionCore {
            machine: SessionMachine::new(
                config.reconnect,
                config.max_reconnect_attempts,
                config.reconnect_interval,
            ),
            router: Router::new(config.history_capacity),
            config,
            transport,
            credentials,
            link: Link {
                socket: None,
                epoch: 0,
            },
            subscriptions: SubscriptionManager::new(),
            signals,
            heartbeat: None,
            reconnect_timer: None,
            reconnect_generation: 0,
            state_tx,
            notices: notices.clone(),
        };

        let inner = Arc::new(Inner {
            core: Mutex::new(core),
            state_rx,
            notices,
        });
        let _ = tokio::spawn(pump(Arc::downgrade(&inner), signal_rx));
        Self { inner }
    }

    /// Open the channel using the stored credential.
    ///
    /// Without a credential this logs a warning and does nothing. Ignored
    /// unless `Disconnected`.
    pub fn connect(&self) {
        self.inner.core.lock().connect();
    }

    /// Close the channel with code 1000, cancel any pending reconnect, and
    /// stop the heartbeat. Automatic reconnect stays off until the next
    /// [`connect`](Self::connect). Idempotent.
    pub fn disconnect(&self) {
        self.inner.core.lock().disconnect();
    }

    /// Send `{action, ..data}`. Returns `false` unless `Connected`.
    pub fn send(&self, action: &str, data: Option<Value>) -> bool {
        self.inner.core.lock().send(&ClientFrame::new(action, data))
    }

    /// Subscribe to a task. Returns whether a frame was sent now; otherwise
    /// the subscription is sent on the next connect.
    pub fn subscribe(&self, task_id: TaskId) -> bool {
        self.inner.core.lock().subscribe(task_id)
    }

    /// Unsubscribe from a task. Returns whether a frame was sent.
    pub fn unsubscribe(&self, task_id: TaskId) -> bool {
        self.inner.core.lock().unsubscribe(task_id)
    }

    /// Subscribed tasks, ascending.
    pub fn subscriptions(&self) -> Vec<TaskId> {
        self.inner.core.lock().subscriptions.tasks()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Watch the connection state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// Current reconnect budget.
    pub fn reconnect_state(&self) -> ReconnectState {
        self.inner.core.lock().machine.reconnect()
    }

    /// Whether a reconnect timer is armed.
    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.core.lock().reconnect_timer.is_some()
    }

    /// Whether the heartbeat timer is running.
    pub fn is_heartbeat_running(&self) -> bool {
        self.inner.core.lock().heartbeat.is_some()
    }

    /// Event history, oldest first.
    pub fn messages(&self) -> Vec<Arc<Event>> {
        self.inner.core.lock().router.history()
    }

    /// Empty the event history. The latest event is kept.
    pub fn clear_messages(&self) {
        self.inner.core.lock().router.clear_history();
    }

    /// Most recently received event.
    pub fn last_message(&self) -> Option<Arc<Event>> {
        self.inner.core.lock().router.latest()
    }

    /// Watch the most recently received event.
    pub fn watch_last_message(&self) -> watch::Receiver<Option<Arc<Event>>> {
        self.inner.core.lock().router.watch_latest()
    }

    /// Listen to every event.
    pub fn listen(&self) -> EventStream {
        self.inner.core.lock().router.listen()
    }

    /// Listen to one task's events.
    pub fn listen_task(&self, task_id: TaskId) -> EventStream {
        self.inner.core.lock().router.listen_task(task_id)
    }

    /// A view over one task's events with derived agent state.
    pub fn task_view(&self, task_id: TaskId) -> TaskView {
        TaskView::new(self.clone(), task_id)
    }

    /// Lifecycle notifications.
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.inner.notices.subscribe()
    }

    /// Session configuration.
    pub fn config(&self) -> RealtimeConfig {
        self.inner.core.lock().config.clone()
    }
}

async fn pump(inner: Weak<Inner>, mut signals: mpsc::UnboundedReceiver<Signal>) {
    while let Some(signal) = signals.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.core.lock().handle_signal(signal);
    }
    trace!("session pump stopped");
}
