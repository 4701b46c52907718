//! Handlers over the uniform storage port. These see only the five port
//! operations, never a concrete back end.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::db::Scope;
use crate::error::HubError;
use crate::storage::{
    DeleteOutcome, FetchOutcome, GetQuery, RecordSummary, SaveOutcome, SaveRequest, StorageInfo,
};
use crate::AppState;

use super::blocking;

pub(super) async fn storage_save(
    State(state): State<AppState>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<SaveOutcome>, HubError> {
    let port = state.port.clone();
    let outcome = blocking(move || port.save(&req)).await?;
    Ok(Json(outcome))
}

pub(super) async fn storage_get(
    State(state): State<AppState>,
    Query(query): Query<GetQuery>,
) -> Result<Json<FetchOutcome>, HubError> {
    let port = state.port.clone();
    let outcome = blocking(move || port.get(&query)).await??;
    Ok(Json(outcome))
}

#[derive(Deserialize)]
pub(super) struct ListParams {
    scope: Scope,
    team_key: Option<String>,
    limit: Option<usize>,
}

pub(super) async fn storage_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RecordSummary>>, HubError> {
    let limit = params.limit.unwrap_or(10).min(100);
    let port = state.port.clone();
    let list =
        blocking(move || port.list(params.scope, params.team_key.as_deref(), limit)).await??;
    Ok(Json(list))
}

#[derive(Deserialize)]
pub(super) struct DeleteParams {
    workspace_id: String,
    scope: Scope,
    team_key: Option<String>,
}

pub(super) async fn storage_delete(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteOutcome>, HubError> {
    let port = state.port.clone();
    let outcome = blocking(move || {
        port.delete(&params.workspace_id, params.scope, params.team_key.as_deref())
    })
    .await??;
    Ok(Json(outcome))
}

pub(super) async fn storage_info(State(state): State<AppState>) -> Json<StorageInfo> {
    Json(state.port.info())
}
