//! Uniform storage port. Every back end presents the same five operations;
//! callers never see a vendor-specific shape. The port is constructed once
//! at startup and shared read-only for the process lifetime.

mod local;

pub use local::LocalStore;

use serde::{Deserialize, Serialize};

use crate::categories::Category;
use crate::db::Scope;
use crate::error::HubError;

#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    pub workspace_id: String,
    pub content: String,
    #[serde(default = "default_scope")]
    pub scope: Scope,
    #[serde(default)]
    pub team_key: Option<String>,
    /// Explicit label. Derived from content when absent.
    #[serde(default)]
    pub category: Option<Category>,
}

fn default_scope() -> Scope {
    Scope::Personal
}

/// Result object for `save`. The port never raises: failures surface as
/// `accepted = false` with a description.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn accepted(record_id: String, new_revision: String) -> Self {
        Self { accepted: true, record_id: Some(record_id), new_revision: Some(new_revision), error: None }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self { accepted: false, record_id: None, new_revision: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetQuery {
    pub workspace_id: String,
    #[serde(default = "default_scope")]
    pub scope: Scope,
    #[serde(default)]
    pub team_key: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordMeta {
    pub record_id: String,
    pub revision_id: String,
    pub categories: Vec<Category>,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_key: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RecordMeta>,
}

impl FetchOutcome {
    pub fn not_found() -> Self {
        Self { found: false, content: None, metadata: None }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub id: String,
    pub workspace_id: String,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_key: Option<String>,
    pub preview: String,
    pub categories: Vec<Category>,
    pub revision_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub deleted_count: usize,
}

/// Free-form capability descriptor, diagnostics only.
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub backend: &'static str,
    pub location: String,
    pub features: Vec<&'static str>,
    pub limits: serde_json::Value,
}

pub trait StoragePort: Send + Sync {
    fn save(&self, req: &SaveRequest) -> SaveOutcome;

    fn get(&self, query: &GetQuery) -> Result<FetchOutcome, HubError>;

    /// Newest first, `limit`-bounded. No pagination cursor.
    fn list(
        &self,
        scope: Scope,
        team_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RecordSummary>, HubError>;

    /// Back-end-specific semantics: the local back end hard-deletes, remote
    /// document back ends may only archive.
    fn delete(
        &self,
        workspace_id: &str,
        scope: Scope,
        team_key: Option<&str>,
    ) -> Result<DeleteOutcome, HubError>;

    fn info(&self) -> StorageInfo;
}
