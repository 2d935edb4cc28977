//! In-process store with a change feed.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::error::{PortalError, PortalResult};
use crate::store::{Change, ChangeKind, Filter, Row, Store, Subscription};

const CHANGE_FEED_CAPACITY: usize = 256;

/// Tables held in memory. Every mutation is announced on the change feed.
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    changes: broadcast::Sender<Change>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        MemoryStore {
            tables: RwLock::new(HashMap::new()),
            changes,
        }
    }

    fn notify(&self, table: &str, kind: ChangeKind) {
        // No subscribers is fine; nobody is watching this table yet.
        let _ = self.changes.send(Change {
            table: table.to_string(),
            kind,
        });
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> PortalResult<Vec<Row>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_all(row, filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &str) -> PortalResult<()> {
        let key = row.get(conflict_key).cloned().ok_or_else(|| {
            PortalError::StoreWrite(format!(
                "Upsert into '{}' is missing conflict column '{}'",
                table, conflict_key
            ))
        })?;
        let same_key = Filter::Eq(conflict_key.to_string(), key);

        let kind = {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table.to_string()).or_default();
            match rows.iter_mut().find(|existing| same_key.matches(existing)) {
                Some(existing) => {
                    existing.extend(row);
                    ChangeKind::Update
                }
                None => {
                    rows.push(row);
                    ChangeKind::Insert
                }
            }
        };

        self.notify(table, kind);
        Ok(())
    }

    async fn insert(&self, table: &str, mut row: Row) -> PortalResult<Row> {
        {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table.to_string()).or_default();

            match row.get("id") {
                Some(id) => {
                    let same_id = Filter::Eq("id".to_string(), id.clone());
                    if rows.iter().any(|existing| same_id.matches(existing)) {
                        return Err(PortalError::StoreWrite(format!(
                            "Duplicate id {} in '{}'",
                            id, table
                        )));
                    }
                }
                None => {
                    row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
                }
            }

            rows.push(row.clone());
        }

        self.notify(table, ChangeKind::Insert);
        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> PortalResult<u64> {
        let touched = {
            let mut tables = self.tables.write().await;
            let mut touched = 0;
            if let Some(rows) = tables.get_mut(table) {
                for row in rows.iter_mut().filter(|row| matches_all(row, filters)) {
                    row.extend(patch.clone());
                    touched += 1;
                }
            }
            touched
        };

        if touched > 0 {
            self.notify(table, ChangeKind::Update);
        }
        Ok(touched)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> PortalResult<u64> {
        let removed = {
            let mut tables = self.tables.write().await;
            match tables.get_mut(table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|row| !matches_all(row, filters));
                    (before - rows.len()) as u64
                }
                None => 0,
            }
        };

        if removed > 0 {
            self.notify(table, ChangeKind::Delete);
        }
        Ok(removed)
    }

    async fn subscribe(
        &self,
        table: &str,
        kinds: &[ChangeKind],
    ) -> PortalResult<Option<Subscription>> {
        Ok(Some(Subscription::new(
            table,
            kinds,
            self.changes.subscribe(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected an object"),
        }
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row_with_later_value() {
        let store = MemoryStore::new();

        store
            .upsert(
                "presence",
                row(json!({ "user_id": "u1", "username": "ada", "last_seen": "2025-03-05T10:00:00Z" })),
                "user_id",
            )
            .await
            .expect("first upsert");
        store
            .upsert(
                "presence",
                row(json!({ "user_id": "u1", "username": "ada", "last_seen": "2025-03-05T10:00:15Z" })),
                "user_id",
            )
            .await
            .expect("second upsert");

        let rows = store.select("presence", &[]).await.expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["last_seen"], json!("2025-03-05T10:00:15Z"));
    }

    #[tokio::test]
    async fn test_upsert_without_conflict_column_fails() {
        let store = MemoryStore::new();
        let err = store
            .upsert("presence", row(json!({ "username": "ada" })), "user_id")
            .await
            .expect_err("Should reject");
        assert!(matches!(err, PortalError::StoreWrite(_)));
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let stored = store
            .insert("events", row(json!({ "title": "Standup" })))
            .await
            .expect("insert");
        let id = stored.get("id").cloned().expect("Should assign an id");

        let err = store
            .insert("events", row(json!({ "id": id, "title": "Again" })))
            .await
            .expect_err("Should reject duplicate id");
        assert!(matches!(err, PortalError::StoreWrite(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_report_affected_rows() {
        let store = MemoryStore::new();
        store
            .insert("events", row(json!({ "id": 1, "title": "A", "created_by": "u1" })))
            .await
            .expect("insert");
        store
            .insert("events", row(json!({ "id": 2, "title": "B", "created_by": "u2" })))
            .await
            .expect("insert");

        let touched = store
            .update("events", &[Filter::eq("id", "1")], row(json!({ "title": "A2" })))
            .await
            .expect("update");
        assert_eq!(touched, 1);

        let rows = store
            .select("events", &[Filter::eq("created_by", "u1")])
            .await
            .expect("select");
        assert_eq!(rows[0]["title"], json!("A2"));

        assert_eq!(store.delete("events", &[Filter::eq("id", 9)]).await.expect("delete"), 0);
        assert_eq!(store.delete("events", &[Filter::eq("id", 2)]).await.expect("delete"), 1);
        assert_eq!(store.select("events", &[]).await.expect("select").len(), 1);
    }

    #[tokio::test]
    async fn test_subscription_only_sees_its_table_and_kinds() {
        let store = MemoryStore::new();
        let mut sub = store
            .subscribe("presence", &[ChangeKind::Update])
            .await
            .expect("subscribe")
            .expect("Memory store has a change feed");

        store
            .insert("events", row(json!({ "title": "noise" })))
            .await
            .expect("insert");
        store
            .upsert("presence", row(json!({ "user_id": "u1" })), "user_id")
            .await
            .expect("insert via upsert");
        store
            .upsert("presence", row(json!({ "user_id": "u1", "username": "ada" })), "user_id")
            .await
            .expect("update via upsert");

        let change = sub.next().await.expect("Should receive a change");
        assert_eq!(
            change,
            Change {
                table: "presence".into(),
                kind: ChangeKind::Update
            }
        );
    }
}
