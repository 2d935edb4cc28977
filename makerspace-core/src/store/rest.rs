//! PostgREST-style HTTP adapter for the hosted database.
//!
//! Tables are addressed as `{url}/{table}`; filters become query parameters
//! (`user_id=eq.abc`). The service has no change feed over plain HTTP, so
//! [`Store::subscribe`] yields `None` and watchers fall back to polling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use tokio::time::timeout;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{PortalError, PortalResult};
use crate::store::{ChangeKind, Filter, Row, Store, Subscription};

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_REPRESENTATION: &str = "return=representation";

pub struct RestStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RestStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        RestStore {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(config: &StoreConfig) -> PortalResult<Self> {
        let url = config
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| PortalError::Config("store.url is required for the rest backend".into()))?;
        Ok(RestStore::new(url, config.api_key.clone(), config.timeout))
    }

    fn request(&self, method: Method, table: &str, filters: &[Filter]) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, table);
        let query: Vec<(String, String)> = filters.iter().map(Filter::to_query_pair).collect();

        let mut builder = self.client.request(method, url).query(&query);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key).bearer_auth(key);
        }
        builder
    }

    /// Send with the configured timeout; non-2xx responses become `on_error`.
    async fn send(
        &self,
        builder: RequestBuilder,
        on_error: fn(String) -> PortalError,
    ) -> PortalResult<Response> {
        let response = timeout(self.timeout, builder.send())
            .await
            .map_err(|_| PortalError::Timeout(self.timeout.as_secs()))?
            .map_err(|e| on_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(on_error(format!("{}: {}", status, body.trim())));
        }
        Ok(response)
    }

    async fn rows(response: Response, on_error: fn(String) -> PortalError) -> PortalResult<Vec<Row>> {
        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| on_error(format!("Failed to decode rows: {}", e)))
    }

    fn require_filters(table: &str, filters: &[Filter]) -> PortalResult<()> {
        if filters.is_empty() {
            return Err(PortalError::StoreWrite(format!(
                "Refusing to modify every row of '{}' without a filter",
                table
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RestStore {
    async fn select(&self, table: &str, filters: &[Filter]) -> PortalResult<Vec<Row>> {
        let builder = self
            .request(Method::GET, table, filters)
            .query(&[("select", "*")]);
        let response = self.send(builder, PortalError::StoreRead).await?;
        Self::rows(response, PortalError::StoreRead).await
    }

    async fn upsert(&self, table: &str, row: Row, conflict_key: &str) -> PortalResult<()> {
        let builder = self
            .request(Method::POST, table, &[])
            .query(&[("on_conflict", conflict_key)])
            .header("Prefer", PREFER_UPSERT)
            .json(&row);
        self.send(builder, PortalError::StoreWrite).await?;
        Ok(())
    }

    async fn insert(&self, table: &str, row: Row) -> PortalResult<Row> {
        let builder = self
            .request(Method::POST, table, &[])
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&row);
        let response = self.send(builder, PortalError::StoreWrite).await?;
        Self::rows(response, PortalError::StoreWrite)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::StoreWrite(format!("Insert into '{}' returned no row", table)))
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Row) -> PortalResult<u64> {
        Self::require_filters(table, filters)?;
        let builder = self
            .request(Method::PATCH, table, filters)
            .header("Prefer", PREFER_REPRESENTATION)
            .json(&patch);
        let response = self.send(builder, PortalError::StoreWrite).await?;
        Ok(Self::rows(response, PortalError::StoreWrite).await?.len() as u64)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> PortalResult<u64> {
        Self::require_filters(table, filters)?;
        let builder = self
            .request(Method::DELETE, table, filters)
            .header("Prefer", PREFER_REPRESENTATION);
        let response = self.send(builder, PortalError::StoreWrite).await?;
        Ok(Self::rows(response, PortalError::StoreWrite).await?.len() as u64)
    }

    async fn subscribe(
        &self,
        table: &str,
        _kinds: &[ChangeKind],
    ) -> PortalResult<Option<Subscription>> {
        debug!(table, "rest store has no change feed");
        Ok(None)
    }
}
