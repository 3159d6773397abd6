use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::engine::EngineError;
use crate::store::StoreError;
use crate::tracker::TrackerError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Invalid(msg) => ApiError::BadRequest(msg),
            TrackerError::NotFound(msg) => ApiError::NotFound(msg),
            TrackerError::Engine(e @ EngineError::DuplicateDate(_)) => {
                ApiError::Conflict(format!("{}. Run /api/fix_cycle_days to repair the data", e))
            }
            TrackerError::Engine(e) => ApiError::BadRequest(e.to_string()),
            TrackerError::Store(StoreError::NotFound) => ApiError::NotFound("Record not found".into()),
            TrackerError::Store(e) => {
                tracing::error!("❌ Store error: {}", e);
                ApiError::Internal("Database error".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn maps_tracker_errors_to_status() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let cases = [
            (TrackerError::Invalid("bad".into()), StatusCode::BAD_REQUEST),
            (TrackerError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (TrackerError::Engine(EngineError::NoPeriodData), StatusCode::BAD_REQUEST),
            (TrackerError::Engine(EngineError::DuplicateDate(date)), StatusCode::CONFLICT),
            (TrackerError::Store(StoreError::NotFound), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn conflict_points_at_repair() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let err = ApiError::from(TrackerError::Engine(EngineError::DuplicateDate(date)));
        assert!(err.to_string().contains("2024-03-01"));
        assert!(err.to_string().contains("fix_cycle_days"));
    }
}
