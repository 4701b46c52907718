//! Index and health handlers.

use axum::extract::State;
use axum::Json;

use crate::AppState;

use super::blocking;

/// Shared health data used by both `/` and `/health`.
async fn health_data(state: &AppState) -> serde_json::Value {
    let db = state.db.clone();
    let (stats, db_size_mb) = blocking(move || {
        let s = db.stats();
        let bytes = db.db_size_bytes();
        let mb = (bytes as f64 / 1048576.0 * 10.0).round() / 10.0;
        (s, mb)
    })
    .await
    .unwrap_or_default();

    serde_json::json!({
        "name": "memhub",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "db_size_mb": db_size_mb,
        "auth_enabled": state.api_key.is_some(),
        "mirror_enabled": state.oauth.is_some(),
        "storage": state.port.info(),
        "stats": stats,
    })
}

/// GET / — health data plus the endpoint list.
pub(super) async fn index(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut data = health_data(&state).await;
    if let Some(obj) = data.as_object_mut() {
        obj.insert("endpoints".to_string(), serde_json::json!({
            "GET /": "index with health data + endpoint list",
            "GET /health": "health only",
            "POST /workspaces": "create a workspace",
            "GET /workspaces": "list workspaces",
            "GET /workspaces/:id": "get a workspace",
            "POST /sessions": "write a handoff (409 CONFLICT on stale revision)",
            "GET /sessions/latest?workspace_id=W&scope=personal": "latest handoff, merged with mirror metadata",
            "POST /tokens": "issue an API token (30-day expiry)",
            "POST /storage/save": "save through the storage port",
            "GET /storage/get": "fetch the newest record in a partition",
            "GET /storage/list?scope=personal&limit=10": "newest-first record summaries",
            "DELETE /storage": "delete a partition (back-end-specific semantics)",
            "GET /storage/info": "storage capability descriptor",
            "GET /auth/google?workspace_id=W": "start the mirror authorization flow",
            "GET /auth/google/callback": "oauth callback (code + state)",
        }));
    }
    Json(data)
}

/// GET /health — health data only (no endpoint list).
pub(super) async fn health_only(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(health_data(&state).await)
}
