//! Commit log endpoint.

use axum::{
    extract::{Query, State},
    Json,
};
use rota_core::CommitRecord;
use serde::Deserialize;

use crate::api::ApiResult;
use crate::state::AppState;

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct CommitsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Most recent commits first.
pub async fn list_commits(
    State(state): State<AppState>,
    Query(query): Query<CommitsQuery>,
) -> ApiResult<Json<Vec<CommitRecord>>> {
    Ok(Json(state.store.commits(query.limit).await?))
}
