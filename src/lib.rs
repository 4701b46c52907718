pub mod api;
pub mod categories;
pub mod db;
pub mod error;
pub mod mirror;
pub mod oauth;
pub mod storage;
pub mod sync;
pub mod util;
pub mod watch;

use std::sync::Arc;

pub type SharedDB = Arc<db::HubDB>;

/// Run a blocking DB operation on tokio's blocking thread pool.
///
/// All synchronous HubDB calls in async context MUST go through this
/// to avoid starving tokio worker threads.
pub async fn db_call<F, T>(db: &SharedDB, f: F) -> Result<T, error::HubError>
where
    F: FnOnce(&db::HubDB) -> T + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| error::HubError::Internal(e.to_string()))
}

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDB,
    pub engine: sync::SyncEngine,
    /// Storage port, selected and constructed once at startup; read-only
    /// thereafter.
    pub port: Arc<dyn storage::StoragePort>,
    pub oauth: Option<oauth::OauthConfig>,
    pub http: reqwest::Client,
    pub api_key: Option<String>,
    pub started_at: std::time::Instant,
}
