//! Local back end: the embedded SQLite store exposed through the port.

use super::*;
use crate::categories;
use crate::db::{CommitOutcome, SessionCommit, MAX_CONTENT_LEN};
use crate::util::preview;
use crate::SharedDB;

const PREVIEW_CHARS: usize = 80;

pub struct LocalStore {
    db: SharedDB,
    path: String,
}

impl LocalStore {
    pub fn new(db: SharedDB, path: impl Into<String>) -> Self {
        Self { db, path: path.into() }
    }
}

impl StoragePort for LocalStore {
    fn save(&self, req: &SaveRequest) -> SaveOutcome {
        let labels = match req.category {
            Some(cat) => vec![cat],
            None => categories::derive(&req.content),
        };
        // port saves are unconditional (no expected revision): the ledger
        // still advances on every accepted save
        let result = self.db.commit_session(SessionCommit {
            workspace_id: &req.workspace_id,
            scope: req.scope,
            team_key: req.team_key.as_deref(),
            expected_revision: None,
            content: &req.content,
            categories: &labels,
        });
        match result {
            Ok(CommitOutcome::Accepted(record)) => {
                SaveOutcome::accepted(record.id, record.revision_id)
            }
            // unreachable without an expected revision, but don't panic on it
            Ok(CommitOutcome::Conflict { .. }) => SaveOutcome::rejected("revision conflict"),
            Err(e) => SaveOutcome::rejected(e.to_string()),
        }
    }

    fn get(&self, query: &GetQuery) -> Result<FetchOutcome, HubError> {
        let record = self.db.latest_in_partition(
            &query.workspace_id,
            query.scope,
            query.team_key.as_deref(),
            query.category,
        )?;
        Ok(match record {
            None => FetchOutcome::not_found(),
            Some(r) => FetchOutcome {
                found: true,
                content: Some(r.content),
                metadata: Some(RecordMeta {
                    record_id: r.id,
                    revision_id: r.revision_id,
                    categories: r.categories,
                    scope: r.scope,
                    team_key: r.team_key,
                    created_at: r.created_at,
                }),
            },
        })
    }

    fn list(
        &self,
        scope: Scope,
        team_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<RecordSummary>, HubError> {
        let records = self.db.list_recent(scope, team_key, limit)?;
        Ok(records
            .into_iter()
            .map(|r| RecordSummary {
                preview: preview(&r.content, PREVIEW_CHARS),
                id: r.id,
                workspace_id: r.workspace_id,
                scope: r.scope,
                team_key: r.team_key,
                categories: r.categories,
                revision_id: r.revision_id,
                created_at: r.created_at,
            })
            .collect())
    }

    fn delete(
        &self,
        workspace_id: &str,
        scope: Scope,
        team_key: Option<&str>,
    ) -> Result<DeleteOutcome, HubError> {
        let deleted_count = self.db.delete_partition(workspace_id, scope, team_key)?;
        Ok(DeleteOutcome { deleted_count })
    }

    fn info(&self) -> StorageInfo {
        StorageInfo {
            backend: "local",
            location: self.path.clone(),
            features: vec!["append-only", "revision-ledger", "hard-delete", "atomic-commit"],
            limits: serde_json::json!({
                "max_content_chars": MAX_CONTENT_LEN,
                "list_pagination": false,
            }),
        }
    }
}
