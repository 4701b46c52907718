//! Session appends and the revision ledger.
//!
//! The conflict check, the record insert, and the ledger advance are one
//! IMMEDIATE transaction: two writers racing on the same expected revision
//! cannot both observe it as current.

use rusqlite::{params, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use super::*;

/// A write attempt against one workspace partition.
#[derive(Debug, Clone, Copy)]
pub struct SessionCommit<'a> {
    pub workspace_id: &'a str,
    pub scope: Scope,
    pub team_key: Option<&'a str>,
    /// None = unconditional write (last-writer-wins).
    pub expected_revision: Option<&'a str>,
    pub content: &'a str,
    pub categories: &'a [Category],
}

#[derive(Debug)]
pub enum CommitOutcome {
    Accepted(SessionRecord),
    /// Stale expected revision. A control-flow outcome, not an error:
    /// nothing was written.
    Conflict { current: String, provided: String },
}

impl HubDB {
    /// Ledger read. Returns the sentinel for never-written workspaces.
    pub fn current_revision(&self, workspace_id: &str) -> Result<String, HubError> {
        let c = self.conn()?;
        let rev: Option<String> = c
            .query_row(
                "SELECT revision_id FROM revisions WHERE workspace_id = ?1",
                [workspace_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(rev.unwrap_or_else(|| REVISION_INIT.to_string()))
    }

    pub fn commit_session(&self, commit: SessionCommit) -> Result<CommitOutcome, HubError> {
        validate_content(commit.content)?;
        validate_partition(commit.scope, commit.team_key)?;
        // team_key is only meaningful for team scope
        let team_key = match commit.scope {
            Scope::Team => commit.team_key.map(str::trim),
            Scope::Personal => None,
        };

        let mut c = self.conn()?;
        let tx = c.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let known: Option<String> = tx
            .query_row(
                "SELECT categories FROM workspaces WHERE id = ?1",
                [commit.workspace_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(known) = known else {
            return Err(HubError::WorkspaceNotFound);
        };

        let current: String = tx
            .query_row(
                "SELECT revision_id FROM revisions WHERE workspace_id = ?1",
                [commit.workspace_id],
                |r| r.get(0),
            )
            .optional()?
            .unwrap_or_else(|| REVISION_INIT.to_string());

        if let Some(provided) = commit.expected_revision {
            if provided != current {
                // dropping the tx rolls back; no mutation on conflict
                return Ok(CommitOutcome::Conflict {
                    current,
                    provided: provided.to_string(),
                });
            }
        }

        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            workspace_id: commit.workspace_id.to_string(),
            scope: commit.scope,
            team_key: team_key.map(str::to_string),
            revision_id: Uuid::new_v4().to_string(),
            content: commit.content.to_string(),
            categories: commit.categories.to_vec(),
            created_at: now_ms(),
        };
        let categories_json =
            serde_json::to_string(&record.categories).unwrap_or_else(|_| "[]".into());

        tx.execute(
            "INSERT INTO sessions \
             (id, workspace_id, scope, team_key, revision_id, content, categories, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.workspace_id,
                record.scope.as_str(),
                record.team_key,
                record.revision_id,
                record.content,
                categories_json,
                record.created_at,
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO revisions (workspace_id, revision_id) VALUES (?1, ?2)",
            params![record.workspace_id, record.revision_id],
        )?;

        // grow the workspace's known-category set
        let mut labels: Vec<String> = serde_json::from_str(&known).unwrap_or_default();
        let mut grew = false;
        for cat in &record.categories {
            let label = cat.as_str().to_string();
            if !labels.contains(&label) {
                labels.push(label);
                grew = true;
            }
        }
        if grew {
            tx.execute(
                "UPDATE workspaces SET categories = ?2 WHERE id = ?1",
                params![
                    record.workspace_id,
                    serde_json::to_string(&labels).unwrap_or_else(|_| "[]".into())
                ],
            )?;
        }

        tx.commit()?;
        Ok(CommitOutcome::Accepted(record))
    }

    /// Most recent record in (workspace, scope, team_key). With a category
    /// filter, the most recent record carrying that label.
    pub fn latest_in_partition(
        &self,
        workspace_id: &str,
        scope: Scope,
        team_key: Option<&str>,
        category: Option<Category>,
    ) -> Result<Option<SessionRecord>, HubError> {
        let c = self.conn()?;
        let mut stmt = c.prepare(
            "SELECT * FROM sessions \
             WHERE workspace_id = ?1 AND scope = ?2 AND team_key IS ?3 \
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(
            params![workspace_id, scope.as_str(), team_key],
            row_to_session,
        )?;
        for row in rows {
            let record = row?;
            match category {
                None => return Ok(Some(record)),
                Some(cat) if record.categories.contains(&cat) => return Ok(Some(record)),
                Some(_) => {}
            }
        }
        Ok(None)
    }

    /// Newest-first records for a scope, limit-bounded. A team_key narrows
    /// the team scope to one team.
    pub fn list_recent(
        &self,
        scope: Scope,
        team_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, HubError> {
        let c = self.conn()?;
        let records = if let Some(key) = team_key.filter(|_| scope == Scope::Team) {
            let mut stmt = c.prepare(
                "SELECT * FROM sessions WHERE scope = ?1 AND team_key = ?2 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?3",
            )?;
            let rows =
                stmt.query_map(params![scope.as_str(), key, limit as i64], row_to_session)?;
            rows.collect::<Result<Vec<_>, _>>()?
        } else {
            let mut stmt = c.prepare(
                "SELECT * FROM sessions WHERE scope = ?1 \
                 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![scope.as_str(), limit as i64], row_to_session)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        Ok(records)
    }

    /// Hard-delete every record in the partition. The ledger entry stays.
    pub fn delete_partition(
        &self,
        workspace_id: &str,
        scope: Scope,
        team_key: Option<&str>,
    ) -> Result<usize, HubError> {
        let c = self.conn()?;
        let deleted = c.execute(
            "DELETE FROM sessions WHERE workspace_id = ?1 AND scope = ?2 AND team_key IS ?3",
            params![workspace_id, scope.as_str(), team_key],
        )?;
        Ok(deleted)
    }
}
