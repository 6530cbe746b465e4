//! Schedule endpoints.
//!
//! Writes go through the change pipeline in strict mode, so a direct edit is
//! validated like any other request but never moves anyone else.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rota_core::{ChangeResult, EmployeeNumber, Role, RotaError, ScheduleEntry};
use rota_state::StoredEntry;
use serde::Deserialize;

use crate::api::{ApiError, ApiResult, RangeQuery};
use crate::state::AppState;

/// Body of `PUT /api/schedules/:date`.
#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub employee_number: EmployeeNumber,

    /// Defaults to first-line support.
    pub role: Option<Role>,
}

fn status_of(result: &ChangeResult) -> StatusCode {
    if result.is_committed() {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    }
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<ScheduleEntry>>> {
    let entries = state.store.range(query.to_range()?).await?;
    Ok(Json(entries))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> ApiResult<Json<ScheduleEntry>> {
    let entry = state.store.get(date).await?.ok_or_else(|| {
        ApiError(RotaError::NotFound {
            resource_type: "schedule".to_string(),
            id: date.to_string(),
        })
    })?;
    Ok(Json(entry))
}

/// Every stored version of a date, oldest first.
pub async fn schedule_history(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> ApiResult<Json<Vec<StoredEntry>>> {
    Ok(Json(state.store.history(date).await?))
}

/// Put an employee in a role on a date.
pub async fn assign_schedule(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
    Json(req): Json<AssignRequest>,
) -> ApiResult<(StatusCode, Json<ChangeResult>)> {
    let role = req.role.unwrap_or_else(Role::first_line_support);
    let result = state.pipeline.assign(date, role, req.employee_number).await?;
    Ok((status_of(&result), Json(result)))
}

/// Clear a date, one employee at a time.
pub async fn clear_schedule(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> ApiResult<(StatusCode, Json<Vec<ChangeResult>>)> {
    let results = state.pipeline.clear_date(date).await?;
    let status = results
        .iter()
        .map(status_of)
        .find(|s| *s != StatusCode::OK)
        .unwrap_or(StatusCode::OK);
    Ok((status, Json(results)))
}
