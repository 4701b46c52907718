//! memhub — workspace memory hub.
//! Local SQLite is authoritative; a remote document mirror is best-effort.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use memhub::db::HubDB;
use memhub::mirror::{DocMirror, GoogleDocsMirror};
use memhub::oauth::OauthConfig;
use memhub::storage::{LocalStore, StoragePort};
use memhub::sync::SyncEngine;
use memhub::{api, AppState, SharedDB};

#[derive(Parser)]
#[command(name = "memhub", version, about = "Workspace memory hub with revision-checked handoffs")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8787", env = "MEMHUB_PORT")]
    port: u16,

    /// SQLite database path
    #[arg(short, long, default_value = "memhub.db", env = "MEMHUB_DB")]
    db: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let hdb = HubDB::open(&args.db).expect("failed to open database");
    let shared: SharedDB = Arc::new(hdb);

    let api_key = std::env::var("MEMHUB_API_KEY").ok();
    let auth_status = if api_key.is_some() { "enabled" } else { "disabled" };

    // client-secrets file enables the mirror; without it every response is
    // remote=DISABLED and the hub is purely local
    let oauth = std::env::var("MEMHUB_OAUTH_CLIENT").ok().map(|path| {
        OauthConfig::from_client_secrets(&path, std::env::var("MEMHUB_OAUTH_REDIRECT").ok())
            .expect("failed to load oauth client secrets")
    });
    let mirror_status = if oauth.is_some() { "enabled" } else { "disabled" };

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(20))
        .build()
        .expect("failed to build http client");

    let mirror: Option<Arc<dyn DocMirror>> = oauth
        .as_ref()
        .map(|_| Arc::new(GoogleDocsMirror::new(http.clone())) as Arc<dyn DocMirror>);

    let engine = SyncEngine::new(shared.clone(), mirror, http.clone());
    let port: Arc<dyn StoragePort> = Arc::new(LocalStore::new(shared.clone(), args.db.clone()));

    let state = AppState {
        db: shared,
        engine,
        port,
        oauth,
        http,
        api_key,
        started_at: std::time::Instant::now(),
    };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");
    info!(addr = %addr, db = %args.db, auth = auth_status, mirror = mirror_status, "memhub listening");
    axum::serve(listener, app).await.expect("server error");
}
