use axum::extract::State;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use subtle::ConstantTimeEq;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::HubError;
use crate::{db_call, AppState};

mod admin;
mod auth;
mod sessions;
mod storage;
mod workspaces;

use admin::*;
use auth::*;
use sessions::*;
use storage::*;
use workspaces::*;

/// Run a blocking closure on the spawn_blocking pool and map JoinError.
async fn blocking<T, F>(f: F) -> Result<T, HubError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| HubError::Internal(e.to_string()))
}

/// Auth middleware: checks the Bearer value if MEMHUB_API_KEY is configured.
/// Accepts either the static key or an unexpired hub-issued token.
async fn require_auth(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, HubError> {
    let Some(ref expected) = state.api_key else {
        return Ok(next.run(req).await);
    };

    let unauthorized = || HubError::Unauthorized;

    let header = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(unauthorized)?;

    let token = header.strip_prefix("Bearer ").ok_or_else(unauthorized)?;

    // constant-time comparison to prevent timing attacks
    if token.as_bytes().ct_eq(expected.as_bytes()).into() {
        return Ok(next.run(req).await);
    }

    let candidate = token.to_string();
    let issued = db_call(&state.db, move |db| db.api_token_valid(&candidate)).await??;
    if issued {
        Ok(next.run(req).await)
    } else {
        Err(unauthorized())
    }
}

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(index))
        .route("/health", get(health_only))
        .route("/auth/google", get(auth_google))
        .route("/auth/google/callback", get(auth_google_callback));

    let protected = Router::new()
        .route("/workspaces", post(create_workspace).get(list_workspaces))
        .route("/workspaces/{id}", get(get_workspace))
        .route("/sessions", post(create_session))
        .route("/sessions/latest", get(latest_session))
        .route("/tokens", post(create_token))
        .route("/storage/save", post(storage_save))
        .route("/storage/get", get(storage_get))
        .route("/storage/list", get(storage_list))
        .route("/storage", delete(storage_delete))
        .route("/storage/info", get(storage_info))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    public
        .merge(protected)
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .with_state(state)
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;
