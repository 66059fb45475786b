//! Inbound frame routing.
//!
//! Every frame is parsed into an [`Event`], appended to the bounded
//! [`EventHistory`], published to the latest-event slot, then fanned out to
//! global listeners and to listeners registered for the event's task.
//! Malformed frames are logged and dropped without touching any of that.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use nexus_core::{Event, TaskId};
use tokio::sync::{mpsc, watch};
use tracing::{trace, warn};

use crate::history::EventHistory;

type Listener = mpsc::UnboundedSender<Arc<Event>>;

/// Receiving half of a listener registration.
///
/// Dropping the stream unregisters it; the router prunes it at the next
/// dispatch.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Arc<Event>>,
}

impl EventStream {
    /// Wait for the next event. `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.rx.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.rx.try_recv().ok()
    }

    /// Every event already queued.
    pub fn drain(&mut self) -> Vec<Arc<Event>> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl futures::Stream for EventStream {
    type Item = Arc<Event>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Parses, records, and dispatches inbound frames.
#[derive(Debug)]
pub struct Router {
    history: EventHistory,
    latest: watch::Sender<Option<Arc<Event>>>,
    global: Vec<Listener>,
    by_task: HashMap<TaskId, Vec<Listener>>,
}

impl Router {
    /// Router with a history of `history_capacity` events.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: EventHistory::new(history_capacity),
            latest: watch::Sender::new(None),
            global: Vec::new(),
            by_task: HashMap::new(),
        }
    }

    /// Route one raw frame. Returns the parsed event, or `None` when the
    /// frame was dropped.
    pub fn route(&mut self, frame: &str) -> Option<Arc<Event>> {
        let event = match Event::parse(frame) {
            Ok(event) => Arc::new(event),
            Err(e) => {
                warn!(error = %e, len = frame.len(), "dropping malformed frame");
                return None;
            }
        };
        trace!(event_type = %event.event_type, task_id = ?event.task_id, "routing event");

        self.history.push(Arc::clone(&event));
        let _ = self.latest.send_replace(Some(Arc::clone(&event)));

        self.global.retain(|tx| tx.send(Arc::clone(&event)).is_ok());
        if let Some(task_id) = &event.task_id {
            if let Some(listeners) = self.by_task.get_mut(task_id) {
                listeners.retain(|tx| tx.send(Arc::clone(&event)).is_ok());
                if listeners.is_empty() {
                    let _ = self.by_task.remove(task_id);
                }
            }
        }
        Some(event)
    }

    /// Register a listener for every event.
    pub fn listen(&mut self) -> EventStream {
        self.global.retain(|tx| !tx.is_closed());
        let (tx, rx) = mpsc::unbounded_channel();
        self.global.push(tx);
        EventStream { rx }
    }

    /// Register a listener for one task's events.
    pub fn listen_task(&mut self, task_id: TaskId) -> EventStream {
        self.by_task.retain(|_, listeners| {
            listeners.retain(|tx| !tx.is_closed());
            !listeners.is_empty()
        });
        let (tx, rx) = mpsc::unbounded_channel();
        self.by_task.entry(task_id).or_default().push(tx);
        EventStream { rx }
    }

    /// History snapshot, oldest first.
    pub fn history(&self) -> Vec<Arc<Event>> {
        self.history.snapshot()
    }

    /// Number of events in the history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Empty the history. The latest-event slot is kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Most recently routed event.
    pub fn latest(&self) -> Option<Arc<Event>> {
        self.latest.borrow().clone()
    }

    /// Watch the latest-event slot.
    pub fn watch_latest(&self) -> watch::Receiver<Option<Arc<Event>>> {
        self.latest.subscribe()
    }

    /// Live global listener count.
    pub fn listener_count(&self) -> usize {
        self.global.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Live listener count for one task.
    pub fn task_listener_count(&self, task_id: &TaskId) -> usize {
        self.by_task
            .get(task_id)
            .map_or(0, |listeners| listeners.iter().filter(|tx| !tx.is_closed()).count())
    }
}
