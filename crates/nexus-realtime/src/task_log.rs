//! Per-view task event log with derived agent snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use nexus_core::{Event, TaskId};
use serde::Serialize;

/// Latest known state of one agent within a task.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AgentSnapshot {
    /// `data.status` of the latest agent event.
    pub status: Option<String>,
    /// `data.progress` of the latest agent event.
    pub progress: Option<f64>,
    /// `data.message` of the latest agent event.
    pub message: Option<String>,
    /// Timestamp of the latest agent event.
    pub timestamp: String,
}

impl AgentSnapshot {
    fn from_event(event: &Event) -> Self {
        Self {
            status: event.status().map(str::to_owned),
            progress: event.progress(),
            message: event.message().map(str::to_owned),
            timestamp: event.timestamp.clone(),
        }
    }
}

/// Events for one task in arrival order, plus the latest snapshot per agent.
#[derive(Clone, Debug)]
pub struct TaskEventLog {
    task_id: TaskId,
    events: Vec<Arc<Event>>,
    agents: BTreeMap<String, AgentSnapshot>,
}

impl TaskEventLog {
    /// Empty log for `task_id`.
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            events: Vec::new(),
            agents: BTreeMap::new(),
        }
    }

    /// Task this log follows.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Record one event. Events for other tasks are ignored.
    ///
    /// Returns whether the event was recorded.
    pub fn apply(&mut self, event: Arc<Event>) -> bool {
        if !event.is_for_task(&self.task_id) {
            return false;
        }
        if event.event_type.is_agent_lifecycle() {
            if let Some(name) = event.agent_name() {
                let _ = self
                    .agents
                    .insert(name.to_owned(), AgentSnapshot::from_event(&event));
            }
        }
        self.events.push(event);
        true
    }

    /// Follow a different task, discarding everything recorded.
    pub fn reset(&mut self, task_id: TaskId) {
        self.task_id = task_id;
        self.events.clear();
        self.agents.clear();
    }

    /// Events in arrival order.
    pub fn events(&self) -> &[Arc<Event>] {
        &self.events
    }

    /// Latest snapshot per agent name.
    pub fn agents(&self) -> &BTreeMap<String, AgentSnapshot> {
        &self.agents
    }

    /// Latest snapshot for one agent.
    pub fn agent(&self, name: &str) -> Option<&AgentSnapshot> {
        self.agents.get(name)
    }

    /// Most recent event.
    pub fn latest(&self) -> Option<&Arc<Event>> {
        self.events.last()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
