//! Per-consumer task view.

use std::sync::Arc;

use nexus_core::{Event, TaskId};

use crate::client::RealtimeClient;
use crate::router::EventStream;
use crate::task_log::TaskEventLog;

/// Follows one task's events and keeps its own [`TaskEventLog`].
///
/// A view only listens; it does not subscribe the task on the server. Each
/// view owns its log, so two views on the same task are independent.
#[derive(Debug)]
pub struct TaskView {
    client: RealtimeClient,
    stream: EventStream,
    log: TaskEventLog,
}

impl TaskView {
    pub(crate) fn new(client: RealtimeClient, task_id: TaskId) -> Self {
        let stream = client.listen_task(task_id.clone());
        Self {
            client,
            stream,
            log: TaskEventLog::new(task_id),
        }
    }

    /// Task being followed.
    pub fn task_id(&self) -> &TaskId {
        self.log.task_id()
    }

    /// Wait for the next event, record it, and return it.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        let event = self.stream.recv().await?;
        let _ = self.log.apply(Arc::clone(&event));
        Some(event)
    }

    /// Record every event already queued. Returns how many were recorded.
    pub fn drain(&mut self) -> usize {
        self.stream
            .drain()
            .into_iter()
            .filter(|event| self.log.apply(Arc::clone(event)))
            .count()
    }

    /// Follow a different task. The log is discarded.
    pub fn set_task(&mut self, task_id: TaskId) {
        if &task_id == self.log.task_id() {
            return;
        }
        self.stream = self.client.listen_task(task_id.clone());
        self.log.reset(task_id);
    }

    /// The log recorded so far.
    pub fn log(&self) -> &TaskEventLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RealtimeConfig;
    use crate::testing::MockTransport;
    use nexus_auth::MemoryCredentialStore;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    async fn connected() -> (RealtimeClient, MockTransport) {
        let transport = MockTransport::new();
        let client = RealtimeClient::new(
            RealtimeConfig::new(Url::parse("ws://localhost/ws").unwrap()),
            Arc::new(transport.clone()),
            Arc::new(MemoryCredentialStore::with_token("tok")),
        );
        client.connect();
        let _ = transport.accept();
        tokio::time::sleep(Duration::from_millis(1)).await;
        (client, transport)
    }

    #[tokio::test(start_paused = true)]
    async fn view_records_only_its_task() {
        let (client, transport) = connected().await;
        let mut view = client.task_view(TaskId::new(42));
        let _ = transport.deliver_json(&json!({
            "event_type": "agent_progress", "task_id": 42,
            "data": {"agent_name": "coder", "progress": 0.25}
        }));
        let _ = transport.deliver_json(&json!({"event_type": "task_started", "task_id": 7}));
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(view.drain(), 1);
        assert_eq!(view.log().agent("coder").unwrap().progress, Some(0.25));
    }

    #[tokio::test(start_paused = true)]
    async fn set_task_resets_log() {
        let (client, transport) = connected().await;
        let mut view = client.task_view(TaskId::new(1));
        let _ = transport.deliver_json(&json!({"event_type": "task_started", "task_id": 1}));
        tokio::time::sleep(Duration::from_millis(1)).await;
        let event = view.recv().await.unwrap();
        assert_eq!(event.task_id, Some(TaskId::new(1)));
        assert_eq!(view.log().len(), 1);

        view.set_task(TaskId::new(2));
        assert_eq!(view.task_id(), &TaskId::new(2));
        assert!(view.log().is_empty());

        let _ = transport.deliver_json(&json!({"event_type": "task_started", "task_id": 1}));
        let _ = transport.deliver_json(&json!({"event_type": "task_started", "task_id": 2}));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(view.drain(), 1);
        assert_eq!(view.log().latest().unwrap().task_id, Some(TaskId::new(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn views_are_independent() {
        let (client, transport) = connected().await;
        let mut a = client.task_view(TaskId::new(3));
        let mut b = client.task_view(TaskId::new(3));
        let _ = transport.deliver_json(&json!({"event_type": "task_completed", "task_id": 3}));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(a.drain(), 1);
        b.set_task(TaskId::new(4));
        assert_eq!(b.drain(), 0);
        assert_eq!(a.log().len(), 1);
    }
}
