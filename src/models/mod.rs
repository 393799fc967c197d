// Models for the workload reporting API
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::ServiceError;
use crate::events::models::{ActionType, WorkloadEvent};
use crate::service::aggregator::ApplyOutcome;

/// Response for an accepted workload report
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportWorkloadResponse {
    /// Transaction id carried by the dispatched event
    pub transaction_id: String,

    pub action_type: ActionType,

    pub trainer_username: String,

    pub training_date: NaiveDate,

    /// `async` or `sync`
    pub delivery_mode: String,
}

impl ReportWorkloadResponse {
    pub fn new(event: &WorkloadEvent, delivery_mode: &str) -> Self {
        Self {
            transaction_id: event.transaction_id().to_string(),
            action_type: event.action_type(),
            trainer_username: event.trainer_username().to_string(),
            training_date: event.training_date(),
            delivery_mode: delivery_mode.to_string(),
        }
    }
}

/// Response for an event posted to the aggregator
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyWorkloadResponse {
    pub transaction_id: String,
    pub outcome: ApplyOutcome,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub message: String,

    /// Error code
    pub code: String,

    /// Error ID for tracking
    pub error_id: Uuid,

    /// Timestamp of when the error occurred
    pub timestamp: DateTime<Utc>,

    /// HTTP status code (not serialized)
    #[serde(skip)]
    pub status_code: StatusCode,
}

impl ErrorResponse {
    pub fn new(status_code: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.to_string(),
            error_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            status_code,
        }
    }
}

impl From<ServiceError> for ErrorResponse {
    fn from(err: ServiceError) -> Self {
        let status_code = match &err {
            ServiceError::InvalidEvent(_)
            | ServiceError::ValidationError(_)
            | ServiceError::DeserializationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::TransportFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self::new(status_code, err.code(), err.to_string())
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        if self.status_code.is_server_error() {
            tracing::error!(error_id = %self.error_id, code = %self.code, "{}", self.message);
        }
        (self.status_code, Json(self)).into_response()
    }
}
