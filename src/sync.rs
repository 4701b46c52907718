//! Reconciliation engine: every write lands durably in the local store and
//! is then best-effort mirrored to the workspace's remote document; every
//! read merges the authoritative local record with whatever metadata the
//! mirror will give us. Mirror failures degrade, local failures fail.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::categories::{self, Category};
use crate::db::{CommitOutcome, Scope, SessionCommit, SessionRecord, Workspace};
use crate::db_call;
use crate::error::HubError;
use crate::mirror::{DocMeta, DocMirror, MirrorError};
use crate::oauth::{self, StoredCredential};
use crate::SharedDB;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreateRequest {
    pub workspace_id: String,
    pub scope: Scope,
    #[serde(default)]
    pub team_key: Option<String>,
    /// Expected current revision. None = unconditional (last-writer-wins).
    #[serde(default)]
    pub revision: Option<String>,
    pub content: String,
}

/// How the remote mirror fared for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteState {
    /// Mirror call succeeded; the view carries remote metadata when the
    /// follow-up meta fetch also succeeded.
    Synced,
    /// Mirror unreachable or rejected the call; the view is local-only.
    LocalOnly,
    /// Stored credential is missing or cannot be refreshed; the client
    /// should run the authorization flow again.
    ReauthRequired,
    /// No mirror configured for this deployment, or no document mapped to
    /// the requested partition.
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub status: &'static str,
    pub revision_id: String,
    pub last_updated: i64,
    pub categories: Vec<Category>,
    pub scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_key: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_category: Option<Category>,
    pub remote: RemoteState,
    pub credential_refreshed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictBody {
    pub status: &'static str,
    pub expected_revision: String,
    pub provided_revision: String,
}

/// Outcome of a write attempt. Conflict is a value, not an error.
#[derive(Debug)]
pub enum WriteOutcome {
    Saved(SessionView),
    Conflict(ConflictBody),
}

/// Result of a best-effort remote interaction.
#[derive(Debug, Clone)]
pub struct RemoteFetch {
    pub state: RemoteState,
    pub meta: Option<DocMeta>,
    pub credential_refreshed: bool,
}

impl RemoteFetch {
    fn disabled() -> Self {
        Self { state: RemoteState::Disabled, meta: None, credential_refreshed: false }
    }

    fn degraded(state: RemoteState, refreshed: bool) -> Self {
        Self { state, meta: None, credential_refreshed: refreshed }
    }
}

#[derive(Clone)]
pub struct SyncEngine {
    db: SharedDB,
    mirror: Option<Arc<dyn DocMirror>>,
    client: reqwest::Client,
}

impl SyncEngine {
    pub fn new(db: SharedDB, mirror: Option<Arc<dyn DocMirror>>, client: reqwest::Client) -> Self {
        Self { db, mirror, client }
    }

    async fn workspace(&self, workspace_id: &str) -> Result<Workspace, HubError> {
        let id = workspace_id.to_string();
        db_call(&self.db, move |db| db.get_workspace(&id))
            .await??
            .ok_or(HubError::WorkspaceNotFound)
    }

    /// Write path: conflict check + durable local commit, then best-effort
    /// mirror append. The local commit is never undone by remote failures.
    pub async fn create_session(&self, req: SessionCreateRequest) -> Result<WriteOutcome, HubError> {
        let ws = self.workspace(&req.workspace_id).await?;
        let labels = categories::derive(&req.content);

        let outcome = db_call(&self.db, move |db| {
            db.commit_session(SessionCommit {
                workspace_id: &req.workspace_id,
                scope: req.scope,
                team_key: req.team_key.as_deref(),
                expected_revision: req.revision.as_deref(),
                content: &req.content,
                categories: &labels,
            })
        })
        .await??;

        match outcome {
            CommitOutcome::Conflict { current, provided } => {
                Ok(WriteOutcome::Conflict(ConflictBody {
                    status: "CONFLICT",
                    expected_revision: current,
                    provided_revision: provided,
                }))
            }
            CommitOutcome::Accepted(record) => {
                let remote = self.push_remote(&ws, &record).await;
                Ok(WriteOutcome::Saved(view_of(record, remote, None)))
            }
        }
    }

    /// Read path: authoritative local record merged with best-effort remote
    /// metadata. A category filter that matches nothing is "not found"
    /// regardless of remote state.
    pub async fn latest_session(
        &self,
        workspace_id: &str,
        scope: Scope,
        team_key: Option<String>,
        category: Option<Category>,
    ) -> Result<Option<SessionView>, HubError> {
        crate::db::validate_partition(scope, team_key.as_deref())?;
        let ws = self.workspace(workspace_id).await?;

        let remote = self.pull_meta(&ws, scope, team_key.as_deref()).await;

        let id = workspace_id.to_string();
        let record = db_call(&self.db, move |db| {
            db.latest_in_partition(&id, scope, team_key.as_deref(), category)
        })
        .await??;

        Ok(record.map(|r| view_of(r, remote, category)))
    }

    /// Load + refresh the workspace's stored credential. A refreshed
    /// credential is persisted back before it is used, so a later request
    /// never redoes the refresh.
    async fn credential_for(&self, workspace_id: &str) -> Result<(StoredCredential, bool), MirrorError> {
        let id = workspace_id.to_string();
        let raw = db_call(&self.db, move |db| db.get_mirror_credential(&id))
            .await
            .map_err(|e| MirrorError::Store(e.to_string()))?
            .map_err(|e| MirrorError::Store(e.to_string()))?
            .ok_or(MirrorError::NoCredential)?;

        let cred = StoredCredential::from_json(&raw)?;
        let (cred, changed) = oauth::refresh_if_expired(&self.client, cred).await?;

        if changed {
            let id = workspace_id.to_string();
            let blob = cred.to_json();
            let persisted = db_call(&self.db, move |db| db.put_mirror_credential(&id, &blob))
                .await
                .and_then(|r| r);
            if let Err(e) = persisted {
                warn!(workspace = workspace_id, error = %e, "failed to persist refreshed credential");
            }
        }
        Ok((cred, changed))
    }

    async fn pull_meta(&self, ws: &Workspace, scope: Scope, team_key: Option<&str>) -> RemoteFetch {
        let Some(mirror) = self.mirror.clone() else {
            return RemoteFetch::disabled();
        };
        let Some(doc_id) = ws.doc_for(scope, team_key) else {
            return RemoteFetch::disabled();
        };
        let doc_id = doc_id.to_string();

        let (cred, refreshed) = match self.credential_for(&ws.id).await {
            Ok(pair) => pair,
            Err(e) if e.is_reauth() => {
                warn!(workspace = %ws.id, error = %e, "mirror credential unusable");
                return RemoteFetch::degraded(RemoteState::ReauthRequired, false);
            }
            Err(e) => {
                warn!(workspace = %ws.id, error = %e, "mirror credential unavailable");
                return RemoteFetch::degraded(RemoteState::LocalOnly, false);
            }
        };

        match mirror.fetch_meta(&doc_id, &cred.access_token).await {
            Ok(meta) => RemoteFetch {
                state: RemoteState::Synced,
                meta: Some(meta),
                credential_refreshed: refreshed,
            },
            Err(e) if e.is_reauth() => {
                warn!(workspace = %ws.id, doc = %doc_id, error = %e, "mirror rejected credential");
                RemoteFetch::degraded(RemoteState::ReauthRequired, refreshed)
            }
            Err(e) => {
                warn!(workspace = %ws.id, doc = %doc_id, error = %e, "mirror meta fetch failed");
                RemoteFetch::degraded(RemoteState::LocalOnly, refreshed)
            }
        }
    }

    async fn push_remote(&self, ws: &Workspace, record: &SessionRecord) -> RemoteFetch {
        let Some(mirror) = self.mirror.clone() else {
            return RemoteFetch::disabled();
        };
        let Some(doc_id) = ws.doc_for(record.scope, record.team_key.as_deref()) else {
            return RemoteFetch::disabled();
        };
        let doc_id = doc_id.to_string();

        let (cred, refreshed) = match self.credential_for(&ws.id).await {
            Ok(pair) => pair,
            Err(e) if e.is_reauth() => {
                warn!(workspace = %ws.id, error = %e, "mirror credential unusable, write stays local");
                return RemoteFetch::degraded(RemoteState::ReauthRequired, false);
            }
            Err(e) => {
                warn!(workspace = %ws.id, error = %e, "mirror credential unavailable, write stays local");
                return RemoteFetch::degraded(RemoteState::LocalOnly, false);
            }
        };

        match mirror.append_handoff(&doc_id, &record.content, &cred.access_token).await {
            Ok(()) => {
                // the append landed; a failed meta re-fetch only costs the URL
                match mirror.fetch_meta(&doc_id, &cred.access_token).await {
                    Ok(meta) => RemoteFetch {
                        state: RemoteState::Synced,
                        meta: Some(meta),
                        credential_refreshed: refreshed,
                    },
                    Err(e) => {
                        warn!(workspace = %ws.id, doc = %doc_id, error = %e, "meta re-fetch after append failed");
                        RemoteFetch::degraded(RemoteState::Synced, refreshed)
                    }
                }
            }
            Err(e) if e.is_reauth() => {
                warn!(workspace = %ws.id, doc = %doc_id, error = %e, "mirror append rejected credential");
                RemoteFetch::degraded(RemoteState::ReauthRequired, refreshed)
            }
            Err(e) => {
                warn!(workspace = %ws.id, doc = %doc_id, error = %e, "mirror append failed, write stays local");
                RemoteFetch::degraded(RemoteState::LocalOnly, refreshed)
            }
        }
    }
}

fn view_of(record: SessionRecord, remote: RemoteFetch, matched: Option<Category>) -> SessionView {
    let (last_updated, doc_url) = match &remote.meta {
        Some(meta) => (meta.modified_ms, Some(meta.url.clone())),
        None => (record.created_at, None),
    };
    SessionView {
        status: "OK",
        revision_id: record.revision_id,
        last_updated,
        categories: record.categories,
        scope: record.scope,
        team_key: record.team_key,
        content: record.content,
        doc_url,
        matched_category: matched,
        remote: remote.state,
        credential_refreshed: remote.credential_refreshed,
    }
}
