//! Rule set endpoints.

use axum::{extract::State, Json};
use rota_rules::RuleSet;

use crate::api::ApiResult;
use crate::state::AppState;

pub async fn get_rules(State(state): State<AppState>) -> ApiResult<Json<RuleSet>> {
    Ok(Json(state.store.rules().await?))
}

/// Replace the whole rule set. Edits validated against the old set become stale.
pub async fn replace_rules(State(state): State<AppState>, Json(rules): Json<RuleSet>) -> ApiResult<Json<RuleSet>> {
    rules.validate()?;
    state.store.replace_rules(rules.clone()).await?;
    Ok(Json(rules))
}
