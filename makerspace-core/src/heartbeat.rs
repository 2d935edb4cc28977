//! Presence heartbeat for a signed-in session.
//!
//! [`start`] spawns a task that upserts the session's presence row right away
//! and then on every interval until the returned [`HeartbeatHandle`] is stopped
//! or dropped. A failed or timed-out write is logged and retried on the next
//! tick; it never ends the task.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::presence::PresenceGateway;
use crate::session::Actor;
use crate::store::SharedStore;

/// `tokio::time::interval` rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// Upper bound for a single write.
    pub write_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        HeartbeatConfig {
            interval: Duration::from_secs(15),
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Owner of a running heartbeat. Dropping it cancels the schedule.
pub struct HeartbeatHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Cancel the schedule and wait for the task to finish.
    ///
    /// A write already in flight is allowed to complete.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "heartbeat task ended abnormally");
            }
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start heartbeating as `actor`.
///
/// Must be called from within a tokio runtime.
pub fn start(store: SharedStore, actor: &Actor, config: HeartbeatConfig) -> HeartbeatHandle {
    let cancel = CancellationToken::new();
    let gateway = PresenceGateway::new(store);
    let actor = actor.clone();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval(config.interval.max(MIN_INTERVAL));
        // A slow write pushes the next one back instead of bunching them up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures: u32 = 0;

        info!(user_id = %actor.user_id, interval = ?config.interval, "heartbeat started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if beat(&gateway, &actor, config.write_timeout).await {
                        if failures > 0 {
                            info!(user_id = %actor.user_id, failures, "heartbeat recovered");
                        }
                        failures = 0;
                    } else {
                        failures += 1;
                    }
                }
            }
        }

        info!(user_id = %actor.user_id, "heartbeat stopped");
    });

    HeartbeatHandle {
        cancel,
        task: Some(task),
    }
}

async fn beat(gateway: &PresenceGateway, actor: &Actor, write_timeout: Duration) -> bool {
    let write = gateway.heartbeat(&actor.user_id, &actor.username, Utc::now());
    match timeout(write_timeout, write).await {
        Ok(Ok(())) => {
            debug!(user_id = %actor.user_id, "heartbeat written");
            true
        }
        Ok(Err(e)) => {
            warn!(user_id = %actor.user_id, error = %e, "heartbeat write failed, retrying next tick");
            false
        }
        Err(_) => {
            warn!(user_id = %actor.user_id, timeout = ?write_timeout, "heartbeat write timed out, retrying next tick");
            false
        }
    }
}
