//! Presence endpoints

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use makerspace_core::config::parse_duration;
use makerspace_core::{PortalError, PresenceRecord};

use crate::routes::{AppError, require_actor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/presence/heartbeat", post(heartbeat))
        .route("/presence/online", get(online))
}

/// POST /presence/heartbeat - Mark the caller as seen now
async fn heartbeat(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, AppError> {
    let actor = require_actor(&headers)?;
    let write_timeout = state.config().presence.write_timeout;

    let presence = state.presence();
    let write = presence.heartbeat(&actor.user_id, &actor.username, Utc::now());
    tokio::time::timeout(write_timeout, write)
        .await
        .map_err(|_| PortalError::Timeout(write_timeout.as_secs()))??;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct OnlineQuery {
    /// e.g. `30s`; falls back to `presence.liveness_threshold`
    pub threshold: Option<String>,
}

/// GET /presence/online - Users seen within the threshold, most recent first
async fn online(
    State(state): State<AppState>,
    Query(query): Query<OnlineQuery>,
) -> Result<Json<Vec<PresenceRecord>>, AppError> {
    let explicit = query.threshold.as_deref().map(parse_duration).transpose()?;
    let threshold = state.config().liveness_threshold(explicit)?;

    // A failed read answers with nobody online instead of an error.
    Ok(Json(state.presence().online_or_empty(Utc::now(), threshold).await))
}
