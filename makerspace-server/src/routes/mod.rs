pub mod events;
pub mod presence;

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use makerspace_core::{Actor, PortalError, Role};
use serde::Serialize;
use tracing::error;

use crate::state::AppState;

const USER_ID_HEADER: &str = "x-user-id";
const USERNAME_HEADER: &str = "x-username";
const ROLE_HEADER: &str = "x-user-role";

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(events::router())
        .merge(presence::router())
        .with_state(state)
}

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors become JSON bodies with a status derived from the portal error kind.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(err: &PortalError) -> StatusCode {
    match err {
        PortalError::NotFound(_) => StatusCode::NOT_FOUND,
        PortalError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortalError::Conflict(_) => StatusCode::CONFLICT,
        PortalError::Validation(_) | PortalError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PortalError::Config(_) => StatusCode::BAD_REQUEST,
        PortalError::StoreRead(_) | PortalError::StoreWrite(_) => StatusCode::BAD_GATEWAY,
        PortalError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        PortalError::Serialization(_) | PortalError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "request failed");
        }
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err: anyhow::Error = err.into();
        let status = err
            .downcast_ref::<PortalError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        AppError {
            status,
            message: err.to_string(),
        }
    }
}

/// The caller's identity, forwarded by the portal front end after sign-in.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Option<Actor>, AppError> {
    let header = |name: &str| -> Result<Option<String>, AppError> {
        match headers.get(name) {
            None => Ok(None),
            Some(value) => value
                .to_str()
                .map(|s| Some(s.trim().to_string()))
                .map_err(|_| AppError::bad_request(format!("Header {} is not valid text", name))),
        }
    };

    let Some(user_id) = header(USER_ID_HEADER)?.filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let username = header(USERNAME_HEADER)?.unwrap_or_else(|| user_id.clone());
    let role = match header(ROLE_HEADER)? {
        Some(role) => role.parse::<Role>()?,
        None => Role::Member,
    };

    Ok(Some(Actor::new(user_id, username, role)))
}

pub fn require_actor(headers: &HeaderMap) -> Result<Actor, AppError> {
    actor_from_headers(headers)?
        .ok_or_else(|| AppError::unauthorized(format!("Missing {} header", USER_ID_HEADER)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_headers() {
        let mut headers = HeaderMap::new();
        assert!(actor_from_headers(&headers).unwrap().is_none());
        assert!(require_actor(&headers).is_err());

        headers.insert(USER_ID_HEADER, "u1".parse().unwrap());
        let actor = require_actor(&headers).unwrap();
        assert_eq!(actor.username, "u1");
        assert_eq!(actor.role, Role::Member);

        headers.insert(ROLE_HEADER, "management".parse().unwrap());
        assert!(require_actor(&headers).unwrap().is_admin());

        headers.insert(ROLE_HEADER, "wizard".parse().unwrap());
        assert!(require_actor(&headers).is_err());
    }

    #[test]
    fn portal_errors_map_to_statuses() {
        let cases = [
            (PortalError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (PortalError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (PortalError::Conflict("x".into()), StatusCode::CONFLICT),
            (PortalError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (PortalError::StoreRead("x".into()), StatusCode::BAD_GATEWAY),
            (PortalError::Timeout(10), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }
}
