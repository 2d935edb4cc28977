//! Live presence: who has been seen recently.
//!
//! Each signed-in session keeps one `presence` row fresh (see
//! [`crate::heartbeat`]). Observers read every row and keep those whose
//! `last_seen` is younger than a liveness threshold. Rows are never deleted;
//! stale ones simply drop out of the online set.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PortalError, PortalResult};
use crate::store::{Row, SharedStore};

/// Table holding one presence row per user.
pub const PRESENCE_TABLE: &str = "presence";

/// Unique column the heartbeat upserts on.
pub const PRESENCE_KEY: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub last_seen: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, last_seen: DateTime<Utc>) -> Self {
        PresenceRecord {
            user_id: user_id.into(),
            username: username.into(),
            last_seen,
        }
    }

    /// Online iff `now - last_seen < threshold`.
    ///
    /// A timestamp slightly in the future (clock skew between sessions) counts
    /// as online.
    pub fn is_online(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match (now - self.last_seen).to_std() {
            Ok(age) => age < threshold,
            Err(_) => true,
        }
    }

    fn to_row(&self) -> PortalResult<Row> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(row) => Ok(row),
            _ => Err(PortalError::Serialization(
                "Presence record did not serialize to an object".into(),
            )),
        }
    }
}

/// The records that count as online at `now`, most recently seen first.
pub fn online_users(
    records: &[PresenceRecord],
    now: DateTime<Utc>,
    threshold: Duration,
) -> Vec<PresenceRecord> {
    let mut online: Vec<PresenceRecord> = records
        .iter()
        .filter(|r| r.is_online(now, threshold))
        .cloned()
        .collect();
    online.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then_with(|| a.username.cmp(&b.username)));
    online
}

/// Typed access to the `presence` table.
#[derive(Clone)]
pub struct PresenceGateway {
    store: SharedStore,
}

impl PresenceGateway {
    pub fn new(store: SharedStore) -> Self {
        PresenceGateway { store }
    }

    /// Blind upsert of the caller's own row; last write wins.
    pub async fn heartbeat(
        &self,
        user_id: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> PortalResult<()> {
        let row = PresenceRecord::new(user_id, username, now).to_row()?;
        self.store.upsert(PRESENCE_TABLE, row, PRESENCE_KEY).await
    }

    /// Every presence row. Rows that do not decode are skipped.
    pub async fn snapshot(&self) -> PortalResult<Vec<PresenceRecord>> {
        let rows = self.store.select(PRESENCE_TABLE, &[]).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let user_id = row.get(PRESENCE_KEY).cloned();
                serde_json::from_value(serde_json::Value::Object(row))
                    .map_err(|e| {
                        warn!(user_id = ?user_id, error = %e, "skipping malformed presence row");
                    })
                    .ok()
            })
            .collect())
    }

    pub async fn online(
        &self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> PortalResult<Vec<PresenceRecord>> {
        Ok(online_users(&self.snapshot().await?, now, threshold))
    }

    /// Like [`PresenceGateway::online`], but a failed read is logged and
    /// shows as nobody online, the way the watcher treats it.
    pub async fn online_or_empty(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<PresenceRecord> {
        self.online(now, threshold).await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read presence");
            Vec::new()
        })
    }
}
