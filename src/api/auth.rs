//! OAuth flow for the remote mirror, plus hub token issuance.
//!
//! The workspace id rides the OAuth `state` parameter out and back; the
//! callback persists the exchanged credential for that workspace.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::db::IssuedToken;
use crate::error::HubError;
use crate::{db_call, AppState};

#[derive(Deserialize)]
pub(super) struct AuthQuery {
    workspace_id: String,
}

pub(super) async fn auth_google(
    State(state): State<AppState>,
    Query(q): Query<AuthQuery>,
) -> Result<Redirect, HubError> {
    let Some(ref oauth) = state.oauth else {
        return Err(HubError::Validation("oauth is not configured".into()));
    };

    let id = q.workspace_id.clone();
    db_call(&state.db, move |db| db.get_workspace(&id))
        .await??
        .ok_or(HubError::WorkspaceNotFound)?;

    let url = oauth.authorize_url(&q.workspace_id)?;
    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
pub(super) struct CallbackQuery {
    code: String,
    /// The workspace id we sent out as OAuth state.
    state: String,
}

pub(super) async fn auth_google_callback(
    State(app): State<AppState>,
    Query(q): Query<CallbackQuery>,
) -> Result<Json<serde_json::Value>, HubError> {
    let Some(ref oauth) = app.oauth else {
        return Err(HubError::Validation("oauth is not configured".into()));
    };

    let workspace_id = q.state;
    let cred = oauth
        .exchange_code(&app.http, &q.code)
        .await
        .map_err(|e| HubError::Internal(format!("token exchange: {e}")))?;

    let id = workspace_id.clone();
    let blob = cred.to_json();
    db_call(&app.db, move |db| db.put_mirror_credential(&id, &blob)).await??;

    info!(workspace = %workspace_id, "mirror credential stored");
    Ok(Json(serde_json::json!({
        "status": "authorized",
        "workspace_id": workspace_id,
    })))
}

#[derive(Deserialize)]
pub(super) struct TokenCreateBody {
    workspace_id: String,
    #[serde(default)]
    scopes: Vec<String>,
}

pub(super) async fn create_token(
    State(state): State<AppState>,
    Json(body): Json<TokenCreateBody>,
) -> Result<Json<IssuedToken>, HubError> {
    let id = body.workspace_id.clone();
    db_call(&state.db, move |db| db.get_workspace(&id))
        .await??
        .ok_or(HubError::WorkspaceNotFound)?;

    let token = db_call(&state.db, move |db| {
        db.create_api_token(&body.workspace_id, &body.scopes)
    })
    .await??;
    Ok(Json(token))
}
