//! Change request endpoints.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use rota_core::{ChangeResult, RequestStatus, RotaError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{bad_request, ApiError, ApiResult};
use crate::engine::Engine;
use crate::state::{AppState, RequestRecord};

fn wait_by_default() -> bool {
    true
}

/// Request to submit a change request.
#[derive(Debug, Deserialize)]
pub struct SubmitChangeRequest {
    /// Free-form request, e.g. "John needs next Monday off".
    pub text: String,

    /// Date relative phrases are resolved against; today (UTC) if omitted.
    pub current_date: Option<NaiveDate>,

    /// Answer with the outcome instead of immediately with the id.
    #[serde(default = "wait_by_default")]
    pub wait: bool,
}

/// A tracked change request.
#[derive(Debug, Serialize)]
pub struct ChangeRequestResponse {
    pub id: Uuid,
    pub text: String,
    pub current_date: NaiveDate,
    pub status: RequestStatus,
    pub result: Option<ChangeResult>,
    pub error: Option<String>,
    pub received_at: String,
}

impl From<RequestRecord> for ChangeRequestResponse {
    fn from(record: RequestRecord) -> Self {
        Self {
            id: record.id,
            status: record.current_status(),
            text: record.text,
            current_date: record.current_date,
            result: record.result,
            error: record.error.map(|e| e.to_string()),
            received_at: record.received_at.to_rfc3339(),
        }
    }
}

fn not_found(id: Uuid) -> ApiError {
    ApiError(RotaError::NotFound {
        resource_type: "change request".to_string(),
        id: id.to_string(),
    })
}

/// Submit a change request.
pub async fn submit_change_request(
    State(state): State<AppState>,
    Json(req): Json<SubmitChangeRequest>,
) -> ApiResult<(StatusCode, Json<ChangeRequestResponse>)> {
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }
    let current_date = req.current_date.unwrap_or_else(|| Utc::now().date_naive());

    let engine = Engine::new(state.clone());
    let (id, task) = engine.submit(req.text, current_date).await;

    if !req.wait {
        let record = state.get_request(id).await.ok_or_else(|| not_found(id))?;
        return Ok((StatusCode::ACCEPTED, Json(record.into())));
    }

    task.await
        .map_err(|e| ApiError(RotaError::Internal(format!("request task failed: {}", e))))?;
    let record = state.get_request(id).await.ok_or_else(|| not_found(id))?;
    if let Some(err) = record.error.clone() {
        return Err(ApiError(err));
    }
    Ok((StatusCode::OK, Json(record.into())))
}

/// Get a change request by ID.
pub async fn get_change_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ChangeRequestResponse>> {
    let record = state.get_request(id).await.ok_or_else(|| not_found(id))?;
    Ok(Json(record.into()))
}

/// How long a cancel waits for the request to settle before answering.
const CANCEL_SETTLE: Duration = Duration::from_secs(2);

/// Cancel a change request that has not started committing.
///
/// Answers 200 once the request has stopped as cancelled, 409 if it
/// finished some other way (including committing after the cancel arrived),
/// and 202 if it is still running when the wait runs out.
pub async fn cancel_change_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<ChangeRequestResponse>)> {
    let record = Engine::new(state.clone())
        .cancel(id)
        .await
        .ok_or_else(|| not_found(id))?;

    let already_finished = |status: RequestStatus| {
        ApiError(RotaError::Conflict(format!(
            "change request {} already {:?}",
            id, status
        )))
    };

    if record.current_status().is_terminal() {
        return Err(already_finished(record.current_status()));
    }

    let mut status = record.status.clone();
    // A closed channel means the task is gone, so the status is final too.
    let settled = tokio::time::timeout(CANCEL_SETTLE, status.wait_for(|s| s.is_terminal()))
        .await
        .is_ok();
    let record = state.get_request(id).await.ok_or_else(|| not_found(id))?;

    match (settled, record.current_status()) {
        (false, _) => Ok((StatusCode::ACCEPTED, Json(record.into()))),
        (true, RequestStatus::Cancelled) => Ok((StatusCode::OK, Json(record.into()))),
        (true, other) => Err(already_finished(other)),
    }
}

/// List all change requests, newest first.
pub async fn list_change_requests(State(state): State<AppState>) -> Json<Vec<ChangeRequestResponse>> {
    let records = state.list_requests().await;
    Json(records.into_iter().map(Into::into).collect())
}
