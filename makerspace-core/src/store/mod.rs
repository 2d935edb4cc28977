//! Access to the hosted relational store.
//!
//! The portal only needs a handful of table operations from its database
//! service: snapshot reads with simple filters, keyed upserts, plain
//! insert/update/delete, and an optional change feed. Anything offering those
//! can back the portal. [`MemoryStore`] keeps tables in process (tests and the
//! standalone server), [`RestStore`] talks to a PostgREST-style HTTP API.

mod filter;
mod memory;
mod rest;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::PortalResult;

pub use filter::Filter;
pub use memory::MemoryStore;
pub use rest::RestStore;

/// A table row as the store hands it out.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A store shared between tasks.
pub type SharedStore = Arc<dyn Store>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];
}

/// Notification that rows of `table` changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub table: String,
    pub kind: ChangeKind,
}

/// A filtered view over a store's change feed.
pub struct Subscription {
    table: String,
    kinds: Vec<ChangeKind>,
    receiver: broadcast::Receiver<Change>,
}

impl Subscription {
    pub fn new(table: &str, kinds: &[ChangeKind], receiver: broadcast::Receiver<Change>) -> Self {
        Subscription {
            table: table.to_string(),
            kinds: kinds.to_vec(),
            receiver,
        }
    }

    fn accepts(&self, change: &Change) -> bool {
        change.table == self.table && self.kinds.contains(&change.kind)
    }

    /// Wait for the next matching change. `None` once the feed is closed.
    ///
    /// If the subscriber fell behind, the missed notifications are collapsed
    /// into a single update so the caller still re-reads.
    pub async fn next(&mut self) -> Option<Change> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.accepts(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(table = %self.table, skipped, "change feed lagged");
                    return Some(Change {
                        table: self.table.clone(),
                        kind: ChangeKind::Update,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Generic query interface of the hosted database.
#[async_trait]
pub trait Store: Send + Sync {
    /// Snapshot read of every row matching all `filters`.
    async fn select(&self, table: &str, filters: &[Filter]) -> PortalResult<Vec<Row>>;

    /// Insert `row`, or overwrite the row with the same `conflict_key` value.
    async fn upsert(&self, table: &str, row: Row, conflict_key: &str) -> PortalResult<()>;

    /// Insert `row` and return it as stored (with generated columns).
    async fn insert(&self, table: &str, row: Row) -> PortalResult<Row>;

    /// Merge `patch` into every matching row. Returns the number of rows touched.
    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> PortalResult<u64>;

    /// Delete every matching row. Returns the number of rows removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> PortalResult<u64>;

    /// Subscribe to changes of `table`. `None` if the store has no change feed.
    async fn subscribe(
        &self,
        table: &str,
        kinds: &[ChangeKind],
    ) -> PortalResult<Option<Subscription>>;
}

/// Build the store selected in configuration.
pub fn connect(config: &StoreConfig) -> PortalResult<SharedStore> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::Rest => Ok(Arc::new(RestStore::from_config(config)?)),
    }
}
