//! Workspace administration handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::db::Workspace;
use crate::error::HubError;
use crate::{db_call, AppState};

#[derive(Deserialize)]
pub(super) struct WorkspaceCreateBody {
    name: String,
    #[serde(default)]
    doc_personal_id: Option<String>,
    #[serde(default)]
    team_map: BTreeMap<String, String>,
}

pub(super) async fn create_workspace(
    State(state): State<AppState>,
    Json(body): Json<WorkspaceCreateBody>,
) -> Result<(StatusCode, Json<Workspace>), HubError> {
    let ws = db_call(&state.db, move |db| {
        db.create_workspace(&body.name, body.doc_personal_id.as_deref(), &body.team_map)
    })
    .await??;
    Ok((StatusCode::CREATED, Json(ws)))
}

pub(super) async fn list_workspaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<Workspace>>, HubError> {
    let list = db_call(&state.db, |db| db.list_workspaces()).await??;
    Ok(Json(list))
}

pub(super) async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Workspace>, HubError> {
    let ws = db_call(&state.db, move |db| db.get_workspace(&id)).await??;
    ws.map(Json).ok_or(HubError::WorkspaceNotFound)
}
