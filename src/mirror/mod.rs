//! Remote document mirror: the external collaborator a workspace's handoffs
//! are best-effort copied to. Mirror failures never fail a request; the
//! sync engine converts them into degraded results.

mod gdocs;

pub use gdocs::GoogleDocsMirror;

use async_trait::async_trait;

/// Metadata the remote service reports for a mirror document. Fetched per
/// request, never persisted.
#[derive(Debug, Clone)]
pub struct DocMeta {
    pub doc_id: String,
    pub url: String,
    pub name: String,
    pub modified_ms: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("no stored credential")]
    NoCredential,

    /// The stored credential is unusable and cannot be refreshed; the
    /// client has to run the authorization flow again.
    #[error("re-authentication required")]
    ReauthRequired,

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote api error: status {status}")]
    Api { status: u16, body: String },

    #[error("credential store: {0}")]
    Store(String),

    #[error("bad payload: {0}")]
    BadPayload(String),
}

impl MirrorError {
    pub fn is_reauth(&self) -> bool {
        matches!(self, MirrorError::ReauthRequired | MirrorError::NoCredential)
    }
}

#[async_trait]
pub trait DocMirror: Send + Sync {
    /// Current metadata (URL, display name, last-modified) for a document.
    async fn fetch_meta(&self, doc_id: &str, access_token: &str) -> Result<DocMeta, MirrorError>;

    /// Append handoff content to the end of a document.
    async fn append_handoff(
        &self,
        doc_id: &str,
        content: &str,
        access_token: &str,
    ) -> Result<(), MirrorError>;
}
