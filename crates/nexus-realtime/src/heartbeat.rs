//! Application-level heartbeat timer.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// The heartbeat was cancelled externally.
    Cancelled,
    /// `beat` reported the session can no longer send.
    SinkClosed,
}

/// Call `beat` every `interval` until cancelled.
///
/// The first beat fires one full `interval` after start. `beat` returns
/// `false` when the ping could not be handed to the session, which ends the
/// loop. A zero interval is treated as one millisecond.
pub async fn run_heartbeat<F>(interval: Duration, cancel: CancellationToken, mut beat: F) -> HeartbeatResult
where
    F: FnMut() -> bool,
{
    let interval = interval.max(Duration::from_millis(1));
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = ticker.tick() => {
                if !beat() {
                    return HeartbeatResult::SinkClosed;
                }
            }
        }
    }
}
