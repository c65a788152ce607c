//! Server keepalive.
//!
//! A background task pings every registered connection on a fixed
//! interval. A connection whose queue can no longer accept the ping is
//! dropped like any other failed send.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use topowatch_types::ServerMessage;

use crate::hub::SessionHub;

/// Smallest accepted keepalive period.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Spawn the keepalive loop. Abort the handle to stop it.
pub fn spawn_keepalive(hub: Arc<SessionHub>, interval: Duration) -> JoinHandle<()> {
    let period = interval.max(MIN_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let report = hub
                .broadcast(&ServerMessage::Ping {
                    timestamp: Some(Utc::now()),
                })
                .await;
            debug!(
                delivered = report.delivered,
                dropped = report.dropped,
                "keepalive ping sent"
            );
        }
    })
}
