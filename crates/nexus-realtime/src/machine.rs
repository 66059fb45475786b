//! Connection state machine.
//!
//! [`SessionMachine`] is a pure value: it consumes a [`SessionInput`] and
//! returns the [`SessionEffect`]s the runtime must carry out, in order. It
//! owns the [`ConnectionState`] and the reconnect budget and performs no I/O.
//!
//! ```text
//!                connect / reconnect due
//!  Disconnected ────────────────────────▶ Connecting
//!       ▲  ▲                                │    │
//!       │  │ closed                 opened  │    │ error
//!       │  └───────── Connected ◀───────────┘    ▼
//!       │                 │ error               Error
//!       │                 ▼                      │
//!       └──────────────── Error ◀────────────────┘
//!             closed                 (closed folds Error into Disconnected)
//! ```

use std::time::Duration;

use nexus_core::ConnectionState;
use nexus_core::constants::{CLOSE_NORMAL, CLOSE_REASON_CLIENT};

/// Reconnect budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectState {
    /// Automatic reconnects scheduled since the last successful open.
    pub attempts: u32,
    /// Ceiling on `attempts`.
    pub max_attempts: u32,
    /// Delay before each automatic reconnect.
    pub interval: Duration,
}

impl ReconnectState {
    /// Whether the budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Something that happened to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionInput {
    /// Explicit `connect()` with a credential present.
    Connect,
    /// The reconnect timer fired with a credential present.
    ReconnectDue,
    /// The transport completed its handshake.
    Opened,
    /// The transport reported a failure.
    Errored {
        /// Failure description.
        message: String,
    },
    /// The transport closed.
    Closed {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Explicit `disconnect()`.
    Disconnect,
}

/// Work the runtime performs in response to an input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEffect {
    /// Open a new socket.
    OpenTransport,
    /// Close the current socket with a close frame and drop it.
    CloseTransport {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Drop the current socket; it has already closed.
    ReleaseTransport,
    /// Start the heartbeat timer.
    StartHeartbeat,
    /// Stop the heartbeat timer.
    StopHeartbeat,
    /// Arm the reconnect timer.
    ScheduleReconnect(Duration),
    /// Disarm the reconnect timer.
    CancelReconnect,
    /// Re-send a subscribe frame for every subscribed task.
    Reconcile,
    /// Tell observers the session connected.
    NotifyConnected,
    /// Tell observers the session disconnected.
    NotifyDisconnected {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// Tell observers the transport failed.
    NotifyError(String),
}

/// The session's connection state machine.
#[derive(Clone, Debug)]
pub struct SessionMachine {
    state: ConnectionState,
    reconnect_enabled: bool,
    reconnect: ReconnectState,
    reconnect_pending: bool,
    heartbeat_running: bool,
}

impl SessionMachine {
    /// A machine in `Disconnected` with a fresh budget.
    pub fn new(reconnect_enabled: bool, max_attempts: u32, interval: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_enabled,
            reconnect: ReconnectState {
                attempts: 0,
                max_attempts,
                interval,
            },
            reconnect_pending: false,
            heartbeat_running: false,
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Current reconnect budget.
    pub fn reconnect(&self) -> ReconnectState {
        self.reconnect
    }

    /// Whether a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Whether the heartbeat timer is running.
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat_running
    }

    /// Apply one input.
    pub fn handle(&mut self, input: SessionInput) -> Vec<SessionEffect> {
        match input {
            SessionInput::Connect => self.on_connect(),
            SessionInput::ReconnectDue => self.on_reconnect_due(),
            SessionInput::Opened => self.on_opened(),
            SessionInput::Errored { message } => self.on_error(message),
            SessionInput::Closed { code, reason } => self.on_closed(code, reason),
            SessionInput::Disconnect => self.on_disconnect(),
        }
    }

    fn on_connect(&mut self) -> Vec<SessionEffect> {
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(SessionEffect::CancelReconnect);
        }
        // An explicit connect re-arms a spent budget.
        if self.reconnect.is_exhausted() {
            self.reconnect.attempts = 0;
        }
        self.state = ConnectionState::Connecting;
        effects.push(SessionEffect::OpenTransport);
        effects
    }

    fn on_reconnect_due(&mut self) -> Vec<SessionEffect> {
        if !self.reconnect_pending || self.state != ConnectionState::Disconnected {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.state = ConnectionState::Connecting;
        vec![SessionEffect::OpenTransport]
    }

    fn on_opened(&mut self) -> Vec<SessionEffect> {
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        self.reconnect.attempts = 0;
        self.heartbeat_running = true;
        vec![
            SessionEffect::NotifyConnected,
            SessionEffect::StartHeartbeat,
            SessionEffect::Reconcile,
        ]
    }

    fn on_error(&mut self, message: String) -> Vec<SessionEffect> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                self.state = ConnectionState::Error;
                let mut effects = Vec::new();
                if self.heartbeat_running {
                    self.heartbeat_running = false;
                    effects.push(SessionEffect::StopHeartbeat);
                }
                effects.push(SessionEffect::NotifyError(message));
                effects
            }
            ConnectionState::Disconnected | ConnectionState::Error => Vec::new(),
        }
    }

    fn on_closed(&mut self, code: u16, reason: String) -> Vec<SessionEffect> {
        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        self.state = ConnectionState::Disconnected;
        let mut effects = vec![SessionEffect::ReleaseTransport];
        if self.heartbeat_running {
            self.heartbeat_running = false;
            effects.push(SessionEffect::StopHeartbeat);
        }
        effects.push(SessionEffect::NotifyDisconnected { code, reason });

        if self.reconnect_enabled && code != CLOSE_NORMAL && !self.reconnect.is_exhausted() {
            self.reconnect.attempts += 1;
            self.reconnect_pending = true;
            effects.push(SessionEffect::ScheduleReconnect(self.reconnect.interval));
        }
        effects
    }

    fn on_disconnect(&mut self) -> Vec<SessionEffect> {
        let mut effects = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(SessionEffect::CancelReconnect);
        }
        if self.heartbeat_running {
            self.heartbeat_running = false;
            effects.push(SessionEffect::StopHeartbeat);
        }
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            effects.push(SessionEffect::CloseTransport {
                code: CLOSE_NORMAL,
                reason: CLOSE_REASON_CLIENT.to_string(),
            });
            effects.push(SessionEffect::NotifyDisconnected {
                code: CLOSE_NORMAL,
                reason: CLOSE_REASON_CLIENT.to_string(),
            });
        }
        self.reconnect.attempts = self.reconnect.max_attempts;
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEffect as E;
    use SessionInput as I;

    fn machine() -> SessionMachine {
        SessionMachine::new(true, 5, Duration::from_millis(3000))
    }

    fn closed(code: u16) -> SessionInput {
        I::Closed {
            code,
            reason: String::new(),
        }
    }

    fn connected() -> SessionMachine {
        let mut m = machine();
        let _ = m.handle(I::Connect);
        let _ = m.handle(I::Opened);
        m
    }

    #[test]
    fn starts_disconnected() {
        let m = machine();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.reconnect().attempts, 0);
        assert!(!m.reconnect_pending());
        assert!(!m.heartbeat_running());
    }

    #[test]
    fn connect_opens_transport() {
        let mut m = machine();
        assert_eq!(m.handle(I::Connect), vec![E::OpenTransport]);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn connect_while_connecting_or_connected_is_ignored() {
        let mut m = machine();
        let _ = m.handle(I::Connect);
        assert!(m.handle(I::Connect).is_empty());
        let _ = m.handle(I::Opened);
        assert!(m.handle(I::Connect).is_empty());
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn opened_enters_connected() {
        let mut m = machine();
        let _ = m.handle(I::Connect);
        assert_eq!(
            m.handle(I::Opened),
            vec![E::NotifyConnected, E::StartHeartbeat, E::Reconcile]
        );
        assert_eq!(m.state(), ConnectionState::Connected);
        assert!(m.heartbeat_running());
    }

    #[test]
    fn opened_outside_connecting_is_ignored() {
        let mut m = machine();
        assert!(m.handle(I::Opened).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn abnormal_close_schedules_reconnect() {
        let mut m = connected();
        let effects = m.handle(closed(1006));
        assert_eq!(
            effects,
            vec![
                E::ReleaseTransport,
                E::StopHeartbeat,
                E::NotifyDisconnected {
                    code: 1006,
                    reason: String::new()
                },
                E::ScheduleReconnect(Duration::from_millis(3000)),
            ]
        );
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.reconnect().attempts, 1);
        assert!(m.reconnect_pending());
    }

    #[test]
    fn normal_close_does_not_reconnect() {
        let mut m = connected();
        let effects = m.handle(closed(1000));
        assert!(!effects.iter().any(|e| matches!(e, E::ScheduleReconnect(_))));
        assert_eq!(m.reconnect().attempts, 0);
    }

    #[test]
    fn reconnect_disabled_does_not_reconnect() {
        let mut m = SessionMachine::new(false, 5, Duration::from_secs(3));
        let _ = m.handle(I::Connect);
        let _ = m.handle(I::Opened);
        let effects = m.handle(closed(1006));
        assert!(!effects.iter().any(|e| matches!(e, E::ScheduleReconnect(_))));
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn reconnect_due_reopens() {
        let mut m = connected();
        let _ = m.handle(closed(1006));
        assert_eq!(m.handle(I::ReconnectDue), vec![E::OpenTransport]);
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert!(!m.reconnect_pending());
        let _ = m.handle(I::Opened);
        assert_eq!(m.reconnect().attempts, 0);
    }

    #[test]
    fn reconnect_due_without_pending_timer_is_ignored() {
        let mut m = machine();
        assert!(m.handle(I::ReconnectDue).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn budget_exhausts_after_max_attempts() {
        let mut m = connected();
        let _ = m.handle(closed(1006));
        for attempt in 2..=5 {
            let _ = m.handle(I::ReconnectDue);
            let effects = m.handle(closed(1006));
            assert!(effects.contains(&E::ScheduleReconnect(Duration::from_millis(3000))));
            assert_eq!(m.reconnect().attempts, attempt);
        }
        let _ = m.handle(I::ReconnectDue);
        let effects = m.handle(closed(1006));
        assert!(!effects.iter().any(|e| matches!(e, E::ScheduleReconnect(_))));
        assert_eq!(m.reconnect().attempts, 5);
        assert!(m.reconnect().is_exhausted());
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn explicit_connect_rearms_spent_budget() {
        let mut m = connected();
        let _ = m.handle(I::Disconnect);
        assert!(m.reconnect().is_exhausted());
        let _ = m.handle(I::Connect);
        assert_eq!(m.reconnect().attempts, 0);
        let effects = m.handle(closed(1006));
        assert!(effects.contains(&E::ScheduleReconnect(Duration::from_millis(3000))));
    }

    #[test]
    fn error_then_close_folds_into_disconnected() {
        let mut m = machine();
        let _ = m.handle(I::Connect);
        assert_eq!(
            m.handle(I::Errored {
                message: "refused".into()
            }),
            vec![E::NotifyError("refused".into())]
        );
        assert_eq!(m.state(), ConnectionState::Error);
        assert!(m.handle(I::Connect).is_empty());
        let effects = m.handle(closed(1006));
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(effects.contains(&E::ScheduleReconnect(Duration::from_millis(3000))));
    }

    #[test]
    fn error_while_connected_stops_heartbeat() {
        let mut m = connected();
        assert_eq!(
            m.handle(I::Errored {
                message: "reset".into()
            }),
            vec![E::StopHeartbeat, E::NotifyError("reset".into())]
        );
        assert!(!m.heartbeat_running());
        let effects = m.handle(closed(1006));
        assert!(!effects.contains(&E::StopHeartbeat));
    }

    #[test]
    fn error_while_disconnected_is_ignored() {
        let mut m = machine();
        assert!(
            m.handle(I::Errored {
                message: "late".into()
            })
            .is_empty()
        );
    }

    #[test]
    fn disconnect_closes_and_inhibits_reconnect() {
        let mut m = connected();
        assert_eq!(
            m.handle(I::Disconnect),
            vec![
                E::StopHeartbeat,
                E::CloseTransport {
                    code: 1000,
                    reason: "Client disconnect".into()
                },
                E::NotifyDisconnected {
                    code: 1000,
                    reason: "Client disconnect".into()
                },
            ]
        );
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.reconnect().attempts, 5);
    }

    #[test]
    fn disconnect_cancels_pending_reconnect() {
        let mut m = connected();
        let _ = m.handle(closed(1006));
        assert_eq!(m.handle(I::Disconnect), vec![E::CancelReconnect]);
        assert!(!m.reconnect_pending());
        assert!(m.handle(I::ReconnectDue).is_empty());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut m = connected();
        let _ = m.handle(I::Disconnect);
        assert!(m.handle(I::Disconnect).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn close_after_disconnect_is_ignored() {
        let mut m = connected();
        let _ = m.handle(I::Disconnect);
        assert!(m.handle(closed(1000)).is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn input() -> impl Strategy<Value = SessionInput> {
            prop_oneof![
                Just(I::Connect),
                Just(I::ReconnectDue),
                Just(I::Opened),
                Just(I::Errored {
                    message: "boom".into()
                }),
                prop_oneof![Just(1000u16), Just(1001u16), Just(1006u16), Just(4001u16)]
                    .prop_map(|code| I::Closed {
                        code,
                        reason: String::new()
                    }),
                Just(I::Disconnect),
            ]
        }

        fn allowed(from: ConnectionState, input: &SessionInput, to: ConnectionState) -> bool {
            use ConnectionState::{Connected, Connecting, Disconnected, Error};
            if from == to {
                return true;
            }
            matches!(
                (from, input, to),
                (Disconnected, I::Connect | I::ReconnectDue, Connecting)
                    | (Connecting, I::Opened, Connected)
                    | (Connecting | Connected, I::Errored { .. }, Error)
                    | (_, I::Closed { .. } | I::Disconnect, Disconnected)
            )
        }

        proptest! {
            #[test]
            fn transitions_follow_the_state_machine(
                inputs in prop::collection::vec(input(), 0..64),
                max in 0u32..8,
            ) {
                let mut m = SessionMachine::new(true, max, Duration::from_secs(3));
                for input in inputs {
                    let before = m.state();
                    let _ = m.handle(input.clone());
                    prop_assert!(allowed(before, &input, m.state()), "{before:?} --{input:?}--> {:?}", m.state());
                }
            }

            #[test]
            fn attempts_stay_within_budget(
                inputs in prop::collection::vec(input(), 0..64),
                max in 0u32..8,
            ) {
                let mut m = SessionMachine::new(true, max, Duration::from_secs(3));
                for input in inputs {
                    let was_connecting = m.state() == ConnectionState::Connecting;
                    let opened = input == I::Opened;
                    let _ = m.handle(input);
                    prop_assert!(m.reconnect().attempts <= max);
                    if was_connecting && opened {
                        prop_assert_eq!(m.reconnect().attempts, 0);
                    }
                }
            }

            #[test]
            fn disconnect_leaves_nothing_running(
                inputs in prop::collection::vec(input(), 0..64),
            ) {
                let mut m = machine();
                for input in inputs {
                    let _ = m.handle(input);
                }
                let _ = m.handle(I::Disconnect);
                prop_assert_eq!(m.state(), ConnectionState::Disconnected);
                prop_assert!(!m.reconnect_pending());
                prop_assert!(!m.heartbeat_running());
                prop_assert!(m.handle(I::Disconnect).is_empty());
            }

            #[test]
            fn heartbeat_runs_only_while_connected(
                inputs in prop::collection::vec(input(), 0..64),
            ) {
                let mut m = machine();
                for input in inputs {
                    let _ = m.handle(input);
                    prop_assert_eq!(
                        m.heartbeat_running(),
                        m.state() == ConnectionState::Connected
                    );
                }
            }
        }
    }
}
