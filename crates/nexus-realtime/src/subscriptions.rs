//! Server-side subscription intent.
//!
//! The set records which tasks the client wants events for, independent of
//! whether a socket is open. Frames go out immediately when a sink is
//! available; otherwise the intent waits for [`SubscriptionManager::reconcile`]
//! on the next successful connect.

use std::collections::BTreeSet;

use nexus_core::{ClientFrame, TaskId};
use tracing::debug;

/// Somewhere to send client frames.
pub trait FrameSink {
    /// Send one frame. Returns whether it was handed to an open socket.
    fn send_frame(&mut self, frame: &ClientFrame) -> bool;
}

/// Keeps the server's subscription set in step with the client's intent.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionManager {
    intent: BTreeSet<TaskId>,
}

impl SubscriptionManager {
    /// Empty subscription set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `task_id` and, when `sink` is given, transmit `subscribe_task`.
    ///
    /// Returns whether a frame was transmitted.
    pub fn subscribe(&mut self, task_id: TaskId, sink: Option<&mut dyn FrameSink>) -> bool {
        let sent = match sink {
            Some(sink) => sink.send_frame(&ClientFrame::subscribe_task(&task_id)),
            None => {
                debug!(%task_id, "subscription deferred until connected");
                false
            }
        };
        let _ = self.intent.insert(task_id);
        sent
    }

    /// Remove `task_id` and, when `sink` is given, transmit `unsubscribe_task`.
    ///
    /// Returns whether a frame was transmitted.
    pub fn unsubscribe(&mut self, task_id: TaskId, sink: Option<&mut dyn FrameSink>) -> bool {
        let _ = self.intent.remove(&task_id);
        sink.is_some_and(|sink| sink.send_frame(&ClientFrame::unsubscribe_task(&task_id)))
    }

    /// Re-send `subscribe_task` for every subscribed task, in ascending order.
    ///
    /// Returns the number of frames transmitted.
    pub fn reconcile(&self, sink: &mut dyn FrameSink) -> usize {
        let sent = self
            .intent
            .iter()
            .filter(|task_id| sink.send_frame(&ClientFrame::subscribe_task(task_id)))
            .count();
        debug!(sent, total = self.intent.len(), "reconciled subscriptions");
        sent
    }

    /// Whether `task_id` is subscribed.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.intent.contains(task_id)
    }

    /// Subscribed tasks, ascending.
    pub fn tasks(&self) -> Vec<TaskId> {
        self.intent.iter().cloned().collect()
    }

    /// Number of subscribed tasks.
    pub fn len(&self) -> usize {
        self.intent.len()
    }

    /// Whether nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.intent.is_empty()
    }
}
