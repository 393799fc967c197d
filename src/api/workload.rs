use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::core::error::ServiceError;
use crate::events::models::{TrainingMutation, WorkloadEvent};
use crate::metrics;
use crate::models::{ApplyWorkloadResponse, ErrorResponse, ReportWorkloadResponse};
use crate::service::AppState;

/// Bearer token from the `Authorization` header, empty when absent
fn bearer_token(headers: &HeaderMap) -> &str {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or("")
}

/// Report a committed training mutation
///
/// Responds 202 once the event has been handed to the configured transport.
/// Transport failures do not change the response.
pub async fn report_workload(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<TrainingMutation>, JsonRejection>,
) -> impl IntoResponse {
    let Json(mutation) = match body {
        Ok(body) => body,
        Err(rejection) => {
            metrics::record_request("report_workload", 400);
            return ErrorResponse::from(ServiceError::InvalidEvent(rejection.body_text()))
                .into_response();
        }
    };

    match app_state.reporter.report(&mutation, bearer_token(&headers)).await {
        Ok(event) => {
            metrics::record_request("report_workload", 202);
            let mode = app_state.reporter.mode().to_string();
            (StatusCode::ACCEPTED, Json(ReportWorkloadResponse::new(&event, &mode))).into_response()
        }
        Err(err) => {
            tracing::warn!("Rejected workload report: {}", err);
            metrics::record_request("report_workload", 400);
            ErrorResponse::from(err).into_response()
        }
    }
}

/// Apply a workload event posted by a synchronous reporter
pub async fn apply_workload(State(app_state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let Some(aggregator) = &app_state.aggregator else {
        return ErrorResponse::from(ServiceError::NotFound(
            "Workload aggregation is disabled on this instance".to_string(),
        ))
        .into_response();
    };

    let event = match WorkloadEvent::from_json_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            metrics::record_aggregator_event("invalid");
            metrics::record_request("apply_workload", 400);
            return ErrorResponse::from(err).into_response();
        }
    };

    match aggregator.apply(&event).await {
        Ok(outcome) => {
            metrics::record_request("apply_workload", 200);
            Json(ApplyWorkloadResponse {
                transaction_id: event.transaction_id().to_string(),
                outcome,
            })
            .into_response()
        }
        Err(err) => ErrorResponse::from(err).into_response(),
    }
}

/// Workload summary of one trainer
pub async fn get_trainer_summary(
    State(app_state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    let Some(aggregator) = &app_state.aggregator else {
        return ErrorResponse::from(ServiceError::NotFound(
            "Workload aggregation is disabled on this instance".to_string(),
        ))
        .into_response();
    };

    match aggregator.summary(&username).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => ErrorResponse::from(ServiceError::NotFound(format!(
            "No workload recorded for trainer '{}'",
            username
        )))
        .into_response(),
        Err(err) => ErrorResponse::from(err).into_response(),
    }
}
