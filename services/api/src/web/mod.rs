pub mod groups;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use studysync_core::error::DomainError;
use studysync_core::ports::PortError;
use tracing::error;
use utoipa::ToSchema;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use middleware::require_auth;
pub use ws_handler::ws_handler;

/// The JSON body every failed request carries.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
}

/// Wraps a `DomainError` so handlers can use `?` and still produce the
/// status-code mapping of the error taxonomy: validation → 400, conflicts →
/// 409, missing things (including ownership mismatches) → 404, store
/// failures → 500. Nothing here ever tears the process down.
pub struct HttpError(pub DomainError);

impl From<DomainError> for HttpError {
    fn from(e: DomainError) -> Self {
        HttpError(e)
    }
}

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        HttpError(DomainError::Store(e))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::Validation(_) | DomainError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            DomainError::SessionAlreadyActive | DomainError::TaskAlreadyCompleted => {
                StatusCode::CONFLICT
            }
            DomainError::NoActiveSession
            | DomainError::TaskNotFound
            | DomainError::NotFound(_)
            | DomainError::Store(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            DomainError::Store(PortError::Conflict(_)) => StatusCode::CONFLICT,
            DomainError::Store(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            DomainError::Store(PortError::Unexpected(_)) => {
                error!("Request failed on a store error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorBody {
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: DomainError) -> StatusCode {
        HttpError(e).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_the_expected_status_codes() {
        assert_eq!(
            status_of(DomainError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(DomainError::InvalidAmount(-3)), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(DomainError::SessionAlreadyActive), StatusCode::CONFLICT);
        assert_eq!(status_of(DomainError::TaskAlreadyCompleted), StatusCode::CONFLICT);
        assert_eq!(status_of(DomainError::NoActiveSession), StatusCode::NOT_FOUND);
        assert_eq!(status_of(DomainError::TaskNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(DomainError::Store(PortError::Unexpected("db down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(DomainError::Store(PortError::Unauthorized)),
            StatusCode::UNAUTHORIZED
        );
    }
}
