//! Bounded in-memory event history.

use std::collections::VecDeque;
use std::sync::Arc;

use nexus_core::Event;

/// The most recent events, oldest first. The oldest is evicted on overflow.
#[derive(Debug)]
pub struct EventHistory {
    events: VecDeque<Arc<Event>>,
    capacity: usize,
}

impl EventHistory {
    /// Empty history holding at most `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest when full.
    pub fn push(&mut self, event: Arc<Event>) {
        if self.events.len() == self.capacity {
            let _ = self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Event>> {
        self.events.iter().cloned().collect()
    }

    /// Most recent event.
    pub fn last(&self) -> Option<&Arc<Event>> {
        self.events.back()
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of events held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
