//! Store doubles for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{PortalError, PortalResult};
use crate::store::{ChangeKind, Filter, MemoryStore, Row, Store, Subscription};

/// A memory store whose failures and change feed can be scripted.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    /// Upserts to fail before behaving normally.
    pub failing_upserts: AtomicUsize,
    pub upsert_attempts: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub reads: AtomicUsize,
    /// Pretend the backend has no change feed.
    pub without_feed: bool,
}

impl ScriptedStore {
    pub fn polling() -> Self {
        ScriptedStore {
            without_feed: true,
            ..Default::default()
        }
    }

    pub fn failing_upserts(count: usize) -> Self {
        ScriptedStore {
            failing_upserts: AtomicUsize::new(count),
            ..Default::default()
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for ScriptedStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> PortalResult<Vec<Row>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortalError::StoreRead("connection refused".into()));
        }
        self.inner.select(table, filters).await
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &str) -> PortalResult<()> {
        self.upsert_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_upserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_upserts.store(remaining - 1, Ordering::SeqCst);
            return Err(PortalError::StoreWrite("connection reset".into()));
        }
        self.inner.upsert(table, row, conflict_key).await
    }

    async fn insert(&self, table: &str, row: Row) -> PortalResult<Row> {
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> PortalResult<u64> {
        self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> PortalResult<u64> {
        self.inner.delete(table, filters).await
    }

    async fn subscribe(
        &self,
        table: &str,
        kinds: &[ChangeKind],
    ) -> PortalResult<Option<Subscription>> {
        if self.without_feed {
            return Ok(None);
        }
        self.inner.subscribe(table, kinds).await
    }
}
