use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid appointment id: {0}")]
    InvalidAppointmentId(i64),

    #[error("service not found: {0}")]
    ServiceNotFound(i64),

    #[error("no appointments found for patient {0}")]
    NoAppointmentsFound(i64),

    #[error("the selected time is not within the doctor's schedule")]
    TimeNotInSchedule,

    #[error("the selected time is already taken")]
    TimeConflict,

    #[error("schedule slot overlaps an existing slot of the same doctor")]
    SlotOverlap,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("unauthorized")]
    Unauthorized,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_)
            | AppError::InvalidAppointmentId(_)
            | AppError::TimeNotInSchedule
            | AppError::TimeConflict
            | AppError::SlotOverlap => StatusCode::BAD_REQUEST,
            AppError::NotFound(_)
            | AppError::ServiceNotFound(_)
            | AppError::NoAppointmentsFound(_) => StatusCode::NOT_FOUND,
            AppError::DeadlineExceeded => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_conflicts_are_client_errors() {
        assert_eq!(AppError::TimeConflict.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::TimeNotInSchedule.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidAppointmentId(7).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_is_distinct_from_storage_error() {
        assert_eq!(AppError::NoAppointmentsFound(3).status(), StatusCode::NOT_FOUND);
        let storage = AppError::from(rusqlite::Error::InvalidQuery);
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
