use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ntc_core::CoreError;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("Seats already booked: {0:?}")]
    SeatsUnavailable(Vec<u32>),
    #[error("Bus is already assigned to trip {0} during this time")]
    ScheduleConflict(Uuid),
    #[error("{0}")]
    Busy(String),
    #[error("Rate limit exceeded")]
    TooManyRequests,
    #[error("{0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AppError::AuthenticationError(_) => (StatusCode::UNAUTHORIZED, json!({ "error": message })),
            AppError::AuthorizationError(_) => (StatusCode::FORBIDDEN, json!({ "error": message })),
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, json!({ "error": message })),
            AppError::NotFoundError(_) => (StatusCode::NOT_FOUND, json!({ "error": message })),
            AppError::SeatsUnavailable(seats) => (
                StatusCode::CONFLICT,
                json!({ "error": message, "booked_seats": seats }),
            ),
            AppError::ScheduleConflict(trip_id) => (
                StatusCode::CONFLICT,
                json!({ "error": message, "conflicting_trip_id": trip_id }),
            ),
            AppError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, json!({ "error": message })),
            AppError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, json!({ "error": message })),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "Internal Server Error" }))
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(_) | CoreError::InvalidWindow { .. } => {
                AppError::ValidationError(err.to_string())
            }
            CoreError::SeatsUnavailable { seats } => AppError::SeatsUnavailable(seats),
            CoreError::ScheduleConflict { trip_id } => AppError::ScheduleConflict(trip_id),
            CoreError::TicketNotFound(_) | CoreError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            CoreError::Forbidden(msg) => AppError::AuthorizationError(msg),
            CoreError::Busy(_) => AppError::Busy(err.to_string()),
            CoreError::InternalError(msg) => AppError::InternalServerError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_status_codes() {
        let cases = [
            (CoreError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::SeatsUnavailable { seats: vec![1] }, StatusCode::CONFLICT),
            (CoreError::ScheduleConflict { trip_id: Uuid::nil() }, StatusCode::CONFLICT),
            (CoreError::TicketNotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (CoreError::NotFound("bus".into()), StatusCode::NOT_FOUND),
            (CoreError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (CoreError::Busy("lock".into()), StatusCode::SERVICE_UNAVAILABLE),
            (CoreError::InternalError("db".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
