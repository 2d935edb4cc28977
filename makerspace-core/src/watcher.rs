//! Keeps an observer's view of the online set current.
//!
//! When the store has a change feed, every presence insert/update/delete
//! triggers a re-read and the refresh timer only re-filters the cached rows,
//! so users whose heartbeats stop still age out on time. Without a feed the
//! timer re-reads instead. A failed read keeps the last published set.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::presence::{PRESENCE_TABLE, PresenceGateway, PresenceRecord, online_users};
use crate::store::{Change, ChangeKind, SharedStore, Subscription};

const MIN_REFRESH: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub threshold: Duration,
    pub refresh_interval: Duration,
}

/// How the watcher learns about new heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Push,
    Poll,
}

/// Owner of a running watcher. Dropping it stops the timer and the subscription.
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    receiver: watch::Receiver<Vec<PresenceRecord>>,
    mode: WatchMode,
}

impl WatcherHandle {
    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    /// The most recently published online set.
    pub fn current(&self) -> Vec<PresenceRecord> {
        self.receiver.borrow().clone()
    }

    /// A receiver notified whenever the online set changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<PresenceRecord>> {
        self.receiver.clone()
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "presence watcher ended abnormally");
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start watching the online set against the wall clock.
pub async fn start(store: SharedStore, config: WatcherConfig) -> WatcherHandle {
    start_with_clock(store, config, Utc::now).await
}

/// Like [`start`], reading "now" from `clock`.
pub async fn start_with_clock<C>(store: SharedStore, config: WatcherConfig, clock: C) -> WatcherHandle
where
    C: Fn() -> DateTime<Utc> + Send + 'static,
{
    let subscription = match store.subscribe(PRESENCE_TABLE, &ChangeKind::ALL).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "presence subscription failed, polling instead");
            None
        }
    };
    let mode = if subscription.is_some() {
        WatchMode::Push
    } else {
        WatchMode::Poll
    };

    let gateway = PresenceGateway::new(store);
    let mut cached = read(&gateway).await.unwrap_or_default();
    let (sender, receiver) = watch::channel(online_users(&cached, clock(), config.threshold));

    let cancel = CancellationToken::new();
    let token = cancel.clone();

    info!(?mode, threshold = ?config.threshold, "presence watcher started");

    let task = tokio::spawn(async move {
        let mut subscription = subscription;
        let mut ticker = interval(config.refresh_interval.max(MIN_REFRESH));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; the initial read already happened.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                change = next_change(&mut subscription) => match change {
                    Some(change) => {
                        debug!(kind = ?change.kind, "presence changed");
                        if let Some(records) = read(&gateway).await {
                            cached = records;
                        }
                    }
                    None => {
                        info!("presence change feed closed, polling instead");
                        subscription = None;
                    }
                },
                _ = ticker.tick() => {
                    if subscription.is_none() {
                        if let Some(records) = read(&gateway).await {
                            cached = records;
                        }
                    }
                }
            }

            publish(&sender, &cached, clock(), config.threshold);
        }

        debug!("presence watcher stopped");
    });

    WatcherHandle {
        cancel,
        task: Some(task),
        receiver,
        mode,
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<Change> {
    match subscription {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn read(gateway: &PresenceGateway) -> Option<Vec<PresenceRecord>> {
    match gateway.snapshot().await {
        Ok(records) => Some(records),
        Err(e) => {
            warn!(error = %e, "presence read failed, keeping previous online set");
            None
        }
    }
}

/// Only wakes receivers when the set actually changed.
fn publish(
    sender: &watch::Sender<Vec<PresenceRecord>>,
    records: &[PresenceRecord],
    now: DateTime<Utc>,
    threshold: Duration,
) {
    let online = online_users(records, now, threshold);
    sender.send_if_modified(|current| {
        if *current == online {
            false
        } else {
            *current = online;
            true
        }
    });
}
