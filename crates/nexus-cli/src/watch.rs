//! The `watch` command loop.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use futures::stream::BoxStream;
use nexus_core::{ConnectionState, Event, TaskId};
use nexus_realtime::RealtimeClient;
use tokio::sync::watch;
use tracing::{info, warn};

/// Why the watch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// Interrupted by the user.
    Interrupted,
    /// The REST peer rejected the credential.
    Unauthorized,
}

/// One JSON line per event.
pub fn event_line(event: &Event) -> Result<String> {
    serde_json::to_string(event).context("failed to encode event")
}

fn event_stream(client: &RealtimeClient, tasks: &[TaskId], all: bool) -> BoxStream<'static, Arc<Event>> {
    if all || tasks.is_empty() {
        client.listen().boxed()
    } else {
        futures::stream::select_all(tasks.iter().map(|task| client.listen_task(task.clone()))).boxed()
    }
}

/// Subscribe, connect, and print events to `out` until `shutdown` resolves,
/// the credential is rejected, or the channel gives up reconnecting.
///
/// The session is disconnected before returning.
pub async fn run_watch<W, S>(
    client: &RealtimeClient,
    tasks: &[TaskId],
    all: bool,
    mut unauthorized: watch::Receiver<u64>,
    shutdown: S,
    out: &mut W,
) -> Result<WatchExit>
where
    W: Write,
    S: Future<Output = ()>,
{
    let mut events = event_stream(client, tasks, all);
    let mut state = client.watch_state();
    for task in tasks {
        let _ = client.subscribe(task.clone());
    }
    client.connect();
    if client.state() == ConnectionState::Disconnected {
        bail!("not logged in; run `nexus-watch login --token <TOKEN>` first");
    }

    tokio::pin!(shutdown);
    let mut auth_watch_open = true;
    let exit = loop {
        tokio::select! {
            () = &mut shutdown => break Ok(WatchExit::Interrupted),
            changed = unauthorized.changed(), if auth_watch_open => {
                if changed.is_ok() {
                    warn!("credential rejected by the API, disconnecting");
                    break Ok(WatchExit::Unauthorized);
                }
                auth_watch_open = false;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break Err(anyhow::anyhow!("realtime session ended"));
                }
                let current = *state.borrow_and_update();
                info!(state = %current, "connection state");
                if current == ConnectionState::Disconnected && !client.has_pending_reconnect() {
                    let budget = client.reconnect_state();
                    break Err(anyhow::anyhow!(
                        "realtime channel closed after {} reconnect attempts",
                        budget.attempts
                    ));
                }
            }
            event = events.next() => {
                let Some(event) = event else {
                    break Err(anyhow::anyhow!("event stream ended"));
                };
                writeln!(out, "{}", event_line(&event)?).context("failed to write event")?;
                out.flush().context("failed to flush output")?;
            }
        }
    };

    client.disconnect();
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use nexus_auth::{CredentialStore, MemoryCredentialStore};
    use nexus_realtime::RealtimeConfig;
    use nexus_realtime::testing::MockTransport;
    use serde_json::{Value, json};
    use tokio::sync::oneshot;
    use url::Url;

    fn client(credentials: Arc<dyn CredentialStore>) -> (RealtimeClient, MockTransport) {
        let transport = MockTransport::new();
        let client = RealtimeClient::new(
            RealtimeConfig::new(Url::parse("ws://localhost:8000/ws").unwrap()),
            Arc::new(transport.clone()),
            credentials,
        );
        (client, transport)
    }

    #[test]
    fn event_line_is_compact_json() {
        let event = Event::parse(r#"{"event_type":"task_started","task_id":"7","timestamp":"t"}"#).unwrap();
        let line = event_line(&event).unwrap();
        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(
            value,
            json!({"event_type": "task_started", "task_id": 7, "timestamp": "t", "data": null})
        );
    }

    #[tokio::test(start_paused = true)]
    async fn prints_task_events_until_interrupted() {
        let (client, transport) = client(Arc::new(MemoryCredentialStore::with_token("tok")));
        let (_unauth_tx, unauth_rx) = watch::channel(0);
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let driver = transport.clone();

        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = driver.accept();
            let _ = driver.deliver_json(&json!({"event_type": "task_progress", "task_id": 42}));
            let _ = driver.deliver_json(&json!({"event_type": "task_progress", "task_id": 7}));
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = stop_tx.send(());
        });

        let mut out = Vec::new();
        let exit = run_watch(
            &client,
            &[TaskId::new(42)],
            false,
            unauth_rx,
            async {
                let _ = stop_rx.await;
            },
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(exit, WatchExit::Interrupted);
        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["task_id"], 42);
        assert_eq!(
            transport.sent_json(),
            vec![json!({"action": "subscribe_task", "task_id": 42})]
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_disconnects() {
        let (client, transport) = client(Arc::new(MemoryCredentialStore::with_token("tok")));
        let (unauth_tx, unauth_rx) = watch::channel(0);
        let driver = transport.clone();

        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = driver.accept();
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = unauth_tx.send(1);
        });

        let mut out = Vec::new();
        let exit = run_watch(&client, &[], true, unauth_rx, std::future::pending(), &mut out)
            .await
            .unwrap();

        assert_eq!(exit, WatchExit::Unauthorized);
        assert_eq!(
            transport.close_request(0),
            Some((1000, "Client disconnect".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_without_credential() {
        let (client, transport) = client(Arc::new(MemoryCredentialStore::new()));
        let (_tx, rx) = watch::channel(0);
        let mut out = Vec::new();
        let err = run_watch(&client, &[], true, rx, std::future::pending(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not logged in"));
        assert_eq!(transport.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_reconnect_is_exhausted() {
        let transport = MockTransport::new();
        let client = RealtimeClient::new(
            RealtimeConfig::new(Url::parse("ws://localhost:8000/ws").unwrap()).without_reconnect(),
            Arc::new(transport.clone()),
            Arc::new(MemoryCredentialStore::with_token("tok")),
        );
        let (_tx, rx) = watch::channel(0);
        let driver = transport.clone();
        let _ = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = driver.accept();
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = driver.drop_connection(1006, "");
        });

        let mut out = Vec::new();
        let err = run_watch(&client, &[], true, rx, std::future::pending(), &mut out)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
