//! Server → client events.
//!
//! Every inbound frame is a JSON object carrying an `event_type` from a
//! closed enumeration. Frames about a task also carry `task_id`; agent
//! lifecycle frames carry `data.agent_name` and optionally `data.status`,
//! `data.progress`, and `data.message`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::errors::ParseError;
use crate::ids::TaskId;

/// Prefix shared by every agent lifecycle event type.
pub const AGENT_EVENT_PREFIX: &str = "agent_";

/// Prefix shared by every task lifecycle event type.
pub const TASK_EVENT_PREFIX: &str = "task_";

/// Closed enumeration of server event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A task was created.
    TaskCreated,
    /// A task began executing.
    TaskStarted,
    /// A task reported progress.
    TaskProgress,
    /// A task finished successfully.
    TaskCompleted,
    /// A task failed.
    TaskFailed,
    /// An agent started work within a task.
    AgentStarted,
    /// An agent reported progress.
    AgentProgress,
    /// An agent finished.
    AgentCompleted,
    /// An agent failed.
    AgentError,
    /// An agent emitted a message.
    AgentMessage,
    /// Sent by the server once per socket right after authentication.
    ConnectionEstablished,
    /// Server-side keepalive; informational only.
    Heartbeat,
    /// Server-reported error.
    Error,
}

/// Broad grouping of event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventCategory {
    /// `task_*` events.
    Task,
    /// `agent_*` events.
    Agent,
    /// Connection, heartbeat, and error events.
    System,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::TaskCreated,
        Self::TaskStarted,
        Self::TaskProgress,
        Self::TaskCompleted,
        Self::TaskFailed,
        Self::AgentStarted,
        Self::AgentProgress,
        Self::AgentCompleted,
        Self::AgentError,
        Self::AgentMessage,
        Self::ConnectionEstablished,
        Self::Heartbeat,
        Self::Error,
    ];

    /// Wire name of the event type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task_created",
            Self::TaskStarted => "task_started",
            Self::TaskProgress => "task_progress",
            Self::TaskCompleted => "task_completed",
            Self::TaskFailed => "task_failed",
            Self::AgentStarted => "agent_started",
            Self::AgentProgress => "agent_progress",
            Self::AgentCompleted => "agent_completed",
            Self::AgentError => "agent_error",
            Self::AgentMessage => "agent_message",
            Self::ConnectionEstablished => "connection_established",
            Self::Heartbeat => "heartbeat",
            Self::Error => "error",
        }
    }

    /// Category of the event type.
    #[must_use]
    pub fn category(self) -> EventCategory {
        let name = self.as_str();
        if name.starts_with(AGENT_EVENT_PREFIX) {
            EventCategory::Agent
        } else if name.starts_with(TASK_EVENT_PREFIX) {
            EventCategory::Task
        } else {
            EventCategory::System
        }
    }

    /// Whether this is an `agent_*` lifecycle event.
    #[must_use]
    pub fn is_agent_lifecycle(self) -> bool {
        self.category() == EventCategory::Agent
    }

    /// Whether this is a `task_*` lifecycle event.
    #[must_use]
    pub fn is_task_lifecycle(self) -> bool {
        self.category() == EventCategory::Task
    }

    /// Whether this marks the end of a task.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TaskCompleted | Self::TaskFailed)
    }
}

impl FromStr for EventType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseError::UnknownEventType(s.to_owned()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed inbound frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    /// Kind of event.
    pub event_type: EventType,
    /// Owning task, absent for system events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Server-assigned timestamp, as sent.
    pub timestamp: String,
    /// Event payload; `Null` when the frame carried none.
    pub data: Value,
}

impl Event {
    /// Parse one inbound frame.
    ///
    /// The result depends only on the frame text.
    pub fn parse(frame: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(frame)?;
        let Value::Object(mut map) = value else {
            return Err(ParseError::NotAnObject);
        };

        let event_type = match map.get("event_type") {
            Some(Value::String(name)) => name.parse::<EventType>()?,
            _ => return Err(ParseError::MissingEventType),
        };

        let task_id = match map.remove("task_id") {
            None | Some(Value::Null) => None,
            Some(value) => {
                let id = TaskId::from_value(&value);
                if id.is_none() {
                    warn!(event_type = %event_type, task_id = %value, "ignoring unusable task_id");
                }
                id
            }
        };

        let timestamp = match map.remove("timestamp") {
            Some(Value::String(s)) => s,
            None | Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
        };

        let data = map.remove("data").unwrap_or(Value::Null);

        Ok(Self {
            event_type,
            task_id,
            timestamp,
            data,
        })
    }

    /// Timestamp as a UTC instant, when it is valid RFC 3339.
    #[must_use]
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// `data.agent_name`, if present.
    #[must_use]
    pub fn agent_name(&self) -> Option<&str> {
        self.data.get("agent_name").and_then(Value::as_str)
    }

    /// `data.status`, if present.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.data.get("status").and_then(Value::as_str)
    }

    /// `data.progress`, if present and numeric.
    #[must_use]
    pub fn progress(&self) -> Option<f64> {
        self.data.get("progress").and_then(Value::as_f64)
    }

    /// `data.message`, if present.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }

    /// Whether the event belongs to the given task.
    #[must_use]
    pub fn is_for_task(&self, task_id: &TaskId) -> bool {
        self.task_id.as_ref() == Some(task_id)
    }
}
