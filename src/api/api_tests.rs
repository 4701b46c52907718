use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::api::router;
use crate::db::HubDB;
use crate::storage::LocalStore;
use crate::sync::SyncEngine;
use crate::AppState;

fn test_state(api_key: Option<&str>) -> AppState {
    let db: crate::SharedDB = Arc::new(HubDB::open(":memory:").unwrap());
    let http = reqwest::Client::new();
    AppState {
        engine: SyncEngine::new(db.clone(), None, http.clone()),
        port: Arc::new(LocalStore::new(db.clone(), ":memory:")),
        db,
        oauth: None,
        http,
        api_key: api_key.map(|s| s.to_string()),
        started_at: std::time::Instant::now(),
    }
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_req(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    b.body(Body::empty()).unwrap()
}

async fn make_workspace(app: &axum::Router) -> String {
    let resp = app
        .clone()
        .oneshot(json_req("POST", "/workspaces", serde_json::json!({"name": "acme"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["id"].as_str().unwrap().to_string()
}

// --- Auth ---

#[tokio::test]
async fn auth_rejects_no_token() {
    let app = router(test_state(Some("secret123")));
    let resp = app.oneshot(get_req("/workspaces", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_rejects_wrong_token() {
    let app = router(test_state(Some("secret123")));
    let resp = app
        .oneshot(get_req("/workspaces", Some("wrongtoken")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_accepts_static_key() {
    let app = router(test_state(Some("secret123")));
    let resp = app
        .oneshot(get_req("/workspaces", Some("secret123")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_disabled_without_key() {
    let app = router(test_state(None));
    let resp = app.oneshot(get_req("/workspaces", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_is_public() {
    let app = router(test_state(Some("secret123")));
    let resp = app.oneshot(get_req("/health", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let data = body_json(resp).await;
    assert_eq!(data["name"], "memhub");
    assert_eq!(data["auth_enabled"], true);
}

#[tokio::test]
async fn issued_token_authenticates() {
    let state = test_state(Some("secret123"));
    let app = router(state);

    let ws = app
        .clone()
        .oneshot({
            let mut r = json_req("POST", "/workspaces", serde_json::json!({"name": "t"}));
            r.headers_mut()
                .insert("authorization", "Bearer secret123".parse().unwrap());
            r
        })
        .await
        .unwrap();
    let ws_id = body_json(ws).await["id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot({
            let mut r = json_req("POST", "/tokens", serde_json::json!({"workspace_id": ws_id}));
            r.headers_mut()
                .insert("authorization", "Bearer secret123".parse().unwrap());
            r
        })
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token = body_json(resp).await["token"].as_str().unwrap().to_string();

    let resp = app
        .oneshot(get_req("/workspaces", Some(&token)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// --- Session flow ---

#[tokio::test]
async fn write_then_conflict_flow() {
    let app = router(test_state(None));
    let ws = make_workspace(&app).await;

    // unconditional first write
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/sessions",
            serde_json::json!({
                "workspace_id": ws, "scope": "personal",
                "content": "bug: crash on save",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let first = body_json(resp).await;
    assert_eq!(first["status"], "OK");
    assert_eq!(first["categories"], serde_json::json!(["BUG"]));
    assert_eq!(first["remote"], "DISABLED");
    let r1 = first["revision_id"].as_str().unwrap().to_string();

    // matching expected revision is accepted with a fresh revision
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/sessions",
            serde_json::json!({
                "workspace_id": ws, "scope": "personal",
                "revision": r1, "content": "meeting recap",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let second = body_json(resp).await;
    let r2 = second["revision_id"].as_str().unwrap().to_string();
    assert_ne!(r1, r2);

    // stale expected revision gets a structured 409, not a generic error
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/sessions",
            serde_json::json!({
                "workspace_id": ws, "scope": "personal",
                "revision": r1, "content": "should not land",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let conflict = body_json(resp).await;
    assert_eq!(conflict["status"], "CONFLICT");
    assert_eq!(conflict["expected_revision"], r2);
    assert_eq!(conflict["provided_revision"], r1);

    // the rejected write created nothing: latest is still the r2 record
    let resp = app
        .clone()
        .oneshot(get_req(
            &format!("/sessions/latest?workspace_id={ws}&scope=personal"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let latest = body_json(resp).await;
    assert_eq!(latest["revision_id"], r2);
    assert_eq!(latest["content"], "meeting recap");
}

#[tokio::test]
async fn write_to_unknown_workspace_is_404() {
    let app = router(test_state(None));
    let resp = app
        .oneshot(json_req(
            "POST",
            "/sessions",
            serde_json::json!({
                "workspace_id": "nope", "scope": "personal", "content": "x",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn latest_404_when_empty() {
    let app = router(test_state(None));
    let ws = make_workspace(&app).await;
    let resp = app
        .oneshot(get_req(
            &format!("/sessions/latest?workspace_id={ws}&scope=personal"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn latest_with_unmatched_category_is_404() {
    let app = router(test_state(None));
    let ws = make_workspace(&app).await;
    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/sessions",
            serde_json::json!({
                "workspace_id": ws, "scope": "personal", "content": "plain note",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(get_req(
            &format!("/sessions/latest?workspace_id={ws}&scope=personal&category=MEETING"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn team_scope_requires_team_key() {
    let app = router(test_state(None));
    let ws = make_workspace(&app).await;
    let resp = app
        .oneshot(json_req(
            "POST",
            "/sessions",
            serde_json::json!({
                "workspace_id": ws, "scope": "team", "content": "standup",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- Storage port routes ---

#[tokio::test]
async fn storage_save_and_get() {
    let app = router(test_state(None));
    let ws = make_workspace(&app).await;

    let resp = app
        .clone()
        .oneshot(json_req(
            "POST",
            "/storage/save",
            serde_json::json!({"workspace_id": ws, "content": "meeting recap"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let saved = body_json(resp).await;
    assert_eq!(saved["accepted"], true);
    assert!(saved["new_revision"].is_string());

    let resp = app
        .oneshot(get_req(
            &format!("/storage/get?workspace_id={ws}&scope=personal"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched = body_json(resp).await;
    assert_eq!(fetched["found"], true);
    assert_eq!(fetched["content"], "meeting recap");
    assert_eq!(fetched["metadata"]["categories"], serde_json::json!(["MEETING"]));
}

#[tokio::test]
async fn storage_save_unknown_workspace_normalizes_to_rejected() {
    let app = router(test_state(None));
    let resp = app
        .oneshot(json_req(
            "POST",
            "/storage/save",
            serde_json::json!({"workspace_id": "ghost", "content": "x"}),
        ))
        .await
        .unwrap();
    // the port never raises: rejection is a result object
    assert_eq!(resp.status(), StatusCode::OK);
    let saved = body_json(resp).await;
    assert_eq!(saved["accepted"], false);
    assert!(saved["error"].is_string());
}

#[tokio::test]
async fn storage_info_describes_backend() {
    let app = router(test_state(None));
    let resp = app.oneshot(get_req("/storage/info", None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info = body_json(resp).await;
    assert_eq!(info["backend"], "local");
}
