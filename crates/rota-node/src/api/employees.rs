//! Roster endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rota_core::{Employee, EmployeeNumber, Role};
use rota_state::EmployeeUpdate;
use serde::Serialize;

use crate::api::{ApiResult, RangeQuery};
use crate::state::AppState;

/// An employee with how often they hold each role.
#[derive(Debug, Serialize)]
pub struct EmployeeView {
    #[serde(flatten)]
    pub employee: Employee,

    /// Assignments per role inside the queried range.
    pub assignment_counts: BTreeMap<Role, usize>,
}

/// List the roster in registration order.
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<EmployeeView>>> {
    let range = query.to_range()?;
    let roster = state.store.roster().await?;
    let mut counts = state.store.assignment_counts(range).await?;

    let views = roster
        .into_iter()
        .map(|employee| EmployeeView {
            assignment_counts: counts.remove(&employee.employee_number).unwrap_or_default(),
            employee,
        })
        .collect();
    Ok(Json(views))
}

pub async fn create_employee(
    State(state): State<AppState>,
    Json(employee): Json<Employee>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let created = state.store.register_employee(employee).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<Json<Employee>> {
    let employee = state.store.employee(&EmployeeNumber::new(number)).await?;
    Ok(Json(employee))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(update): Json<EmployeeUpdate>,
) -> ApiResult<Json<Employee>> {
    let employee = state
        .store
        .update_employee(&EmployeeNumber::new(number), update)
        .await?;
    Ok(Json(employee))
}

/// Remove an employee. Fails while any schedule entry still names them.
pub async fn delete_employee(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.remove_employee(&EmployeeNumber::new(number)).await?;
    Ok(StatusCode::NO_CONTENT)
}
