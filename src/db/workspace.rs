//! Workspace CRUD. Workspaces are created by an administrative action and
//! never deleted in-band.

use std::collections::BTreeMap;

use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::*;

impl HubDB {
    pub fn create_workspace(
        &self,
        name: &str,
        doc_personal_id: Option<&str>,
        team_map: &BTreeMap<String, String>,
    ) -> Result<Workspace, HubError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(HubError::Validation("workspace name must not be empty".into()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(HubError::Validation("workspace name too long".into()));
        }

        let ws = Workspace {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            doc_personal_id: doc_personal_id.map(str::to_string),
            team_map: team_map.clone(),
            categories: vec!["GENERAL".to_string()],
        };

        let mut c = self.conn()?;
        let tx = c.transaction()?;
        tx.execute(
            "INSERT INTO workspaces (id, name, doc_personal_id, team_map, categories) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ws.id,
                ws.name,
                ws.doc_personal_id,
                serde_json::to_string(&ws.team_map).unwrap_or_else(|_| "{}".into()),
                serde_json::to_string(&ws.categories).unwrap_or_else(|_| "[]".into()),
            ],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO revisions (workspace_id, revision_id) VALUES (?1, ?2)",
            params![ws.id, REVISION_INIT],
        )?;
        tx.commit()?;
        Ok(ws)
    }

    pub fn get_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, HubError> {
        let c = self.conn()?;
        let ws = c
            .query_row(
                "SELECT * FROM workspaces WHERE id = ?1",
                [workspace_id],
                row_to_workspace,
            )
            .optional()?;
        Ok(ws)
    }

    pub fn list_workspaces(&self) -> Result<Vec<Workspace>, HubError> {
        let c = self.conn()?;
        let mut stmt = c.prepare("SELECT * FROM workspaces ORDER BY name")?;
        let rows = stmt.query_map([], row_to_workspace)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
