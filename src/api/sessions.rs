//! Session read/write handlers: the conflict-checked write path and the
//! merged-view read path.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::categories::Category;
use crate::db::Scope;
use crate::error::HubError;
use crate::sync::{SessionCreateRequest, WriteOutcome};
use crate::AppState;

pub(super) async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<SessionCreateRequest>,
) -> Result<Response, HubError> {
    match state.engine.create_session(req).await? {
        WriteOutcome::Saved(view) => Ok(Json(view).into_response()),
        WriteOutcome::Conflict(body) => Ok((StatusCode::CONFLICT, Json(body)).into_response()),
    }
}

#[derive(Deserialize)]
pub(super) struct LatestQuery {
    workspace_id: String,
    scope: Scope,
    team_key: Option<String>,
    category: Option<String>,
}

pub(super) async fn latest_session(
    State(state): State<AppState>,
    Query(q): Query<LatestQuery>,
) -> Result<Response, HubError> {
    let category = match q.category.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        // an unknown label can never match a stored record
        Some(raw) => match Category::parse(raw) {
            Some(c) => Some(c),
            None => return Err(HubError::NotFound),
        },
    };

    let view = state
        .engine
        .latest_session(&q.workspace_id, q.scope, q.team_key, category)
        .await?;
    view.map(|v| Json(v).into_response()).ok_or(HubError::NotFound)
}
