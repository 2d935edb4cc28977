//! Calendar event endpoints

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
};
use serde::Deserialize;

use makerspace_core::{CalendarView, Category, DateRange, Event, EventDraft, EventFilter, EventId};

use crate::routes::{AppError, actor_from_headers, require_actor};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{id}", put(update_event).delete(delete_event))
}

/// Query parameters for listing events
#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    /// Comma separated, e.g. `Meeting,Workshop`
    pub category: Option<String>,
    #[serde(default)]
    pub mine: bool,
    pub search: Option<String>,
}

impl EventsQuery {
    fn categories(&self) -> Result<Vec<Category>, AppError> {
        let Some(list) = self.category.as_deref() else {
            return Ok(Vec::new());
        };
        Ok(list
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::parse::<Category>)
            .collect::<Result<_, _>>()?)
    }
}

/// GET /events - Expanded instances, filtered
async fn list_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Json<CalendarView>, AppError> {
    let viewer = actor_from_headers(&headers)?;
    let filter = EventFilter {
        categories: query.categories()?,
        only_mine: query.mine,
        search: query.search.clone(),
        range: DateRange::parse(query.from.as_deref(), query.to.as_deref())?,
    };

    let view = state.calendar().load().await;
    Ok(Json(CalendarView {
        instances: filter.apply(view.instances, viewer.as_ref()),
        diagnostics: view.diagnostics,
    }))
}

/// POST /events - Create an event owned by the caller
async fn create_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<EventDraft>,
) -> Result<(StatusCode, Json<Event>), AppError> {
    let actor = require_actor(&headers)?;
    let event = state.calendar().create(&actor, &draft).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /events/{id} - Replace an event's fields
async fn update_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<EventDraft>,
) -> Result<Json<Event>, AppError> {
    let actor = require_actor(&headers)?;
    let event = state.calendar().update(&actor, &EventId::new(id), &draft).await?;
    Ok(Json(event))
}

/// DELETE /events/{id} - Delete an event and all its instances
async fn delete_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let actor = require_actor(&headers)?;
    state.calendar().delete(&actor, &EventId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
