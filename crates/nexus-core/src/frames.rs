//! Client → server frames.
//!
//! Every outbound frame is one JSON object with an `action` field; any other
//! fields sit next to it at the top level:
//!
//! ```json
//! {"action": "subscribe_task", "task_id": 42}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::TaskId;

/// Action name for a task subscription request.
pub const ACTION_SUBSCRIBE_TASK: &str = "subscribe_task";
/// Action name for cancelling a task subscription.
pub const ACTION_UNSUBSCRIBE_TASK: &str = "unsubscribe_task";
/// Action name for the application-level heartbeat.
pub const ACTION_PING: &str = "ping";

/// An outbound frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Action name.
    pub action: String,
    /// Additional top-level fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ClientFrame {
    /// Build a frame from an action and an optional payload.
    ///
    /// When `data` is an object its fields are merged next to `action`; a
    /// non-object payload is carried under `data`. An `action` key inside the
    /// payload is ignored.
    pub fn new(action: impl Into<String>, data: Option<Value>) -> Self {
        let fields = match data {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(mut map)) => {
                let _ = map.remove("action");
                map
            }
            Some(other) => {
                let mut map = Map::new();
                let _ = map.insert("data".into(), other);
                map
            }
        };
        Self {
            action: action.into(),
            fields,
        }
    }

    /// `{"action":"subscribe_task","task_id":<id>}`.
    pub fn subscribe_task(task_id: &TaskId) -> Self {
        Self::with_task(ACTION_SUBSCRIBE_TASK, task_id)
    }

    /// `{"action":"unsubscribe_task","task_id":<id>}`.
    pub fn unsubscribe_task(task_id: &TaskId) -> Self {
        Self::with_task(ACTION_UNSUBSCRIBE_TASK, task_id)
    }

    /// `{"action":"ping"}`.
    pub fn ping() -> Self {
        Self::new(ACTION_PING, None)
    }

    fn with_task(action: &str, task_id: &TaskId) -> Self {
        let mut fields = Map::new();
        let _ = fields.insert("task_id".into(), task_id.to_value());
        Self {
            action: action.to_owned(),
            fields,
        }
    }

    /// The `task_id` field, if the frame carries one.
    #[must_use]
    pub fn task_id(&self) -> Option<TaskId> {
        self.fields
            .get("task_id")
            .and_then(TaskId::from_value)
    }

    /// Serialize to the single-line JSON text sent on the socket.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_value(frame: &ClientFrame) -> Value {
        serde_json::from_str(&frame.to_json().unwrap()).unwrap()
    }

    #[test]
    fn subscribe_frame_shape() {
        let frame = ClientFrame::subscribe_task(&TaskId::new(42));
        assert_eq!(
            as_value(&frame),
            json!({"action": "subscribe_task", "task_id": 42})
        );
        assert_eq!(frame.task_id(), Some(TaskId::new(42)));
    }

    #[test]
    fn unsubscribe_frame_shape() {
        let frame = ClientFrame::unsubscribe_task(&TaskId::new(7));
        assert_eq!(
            as_value(&frame),
            json!({"action": "unsubscribe_task", "task_id": 7})
        );
    }

    #[test]
    fn text_task_id_is_sent_as_string() {
        let frame = ClientFrame::subscribe_task(&TaskId::text("a1b2-uuid"));
        assert_eq!(
            as_value(&frame),
            json!({"action": "subscribe_task", "task_id": "a1b2-uuid"})
        );
        assert_eq!(frame.task_id(), Some(TaskId::text("a1b2-uuid")));
    }

    #[test]
    fn ping_has_only_action() {
        assert_eq!(as_value(&ClientFrame::ping()), json!({"action": "ping"}));
        assert!(ClientFrame::ping().task_id().is_none());
    }

    #[test]
    fn object_payload_is_merged() {
        let frame = ClientFrame::new("cancel_task", Some(json!({"task_id": 5, "reason": "user"})));
        assert_eq!(
            as_value(&frame),
            json!({"action": "cancel_task", "task_id": 5, "reason": "user"})
        );
    }

    #[test]
    fn payload_cannot_override_action() {
        let frame = ClientFrame::new("ping", Some(json!({"action": "subscribe_task"})));
        assert_eq!(as_value(&frame), json!({"action": "ping"}));
    }

    #[test]
    fn scalar_payload_is_nested() {
        let frame = ClientFrame::new("echo", Some(json!("hi")));
        assert_eq!(as_value(&frame), json!({"action": "echo", "data": "hi"}));
    }

    #[test]
    fn frame_text_is_single_line() {
        let text = ClientFrame::subscribe_task(&TaskId::new(1)).to_json().unwrap();
        assert!(!text.contains('\n'));
    }
}
