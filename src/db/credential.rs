//! Stored credentials: the per-workspace remote-mirror credential blob and
//! hub-issued API tokens.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::*;

const TOKEN_TTL_MS: i64 = 30 * 24 * 3600 * 1000;

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub workspace_id: String,
    pub scopes: Vec<String>,
    pub expires_at: i64,
}

impl HubDB {
    /// The opaque mirror-credential blob for a workspace, if one was stored.
    pub fn get_mirror_credential(&self, workspace_id: &str) -> Result<Option<String>, HubError> {
        let c = self.conn()?;
        let blob = c
            .query_row(
                "SELECT token_json FROM google_tokens WHERE workspace_id = ?1",
                [workspace_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(blob)
    }

    /// Insert or replace the credential blob. Called from the OAuth callback
    /// and whenever a request refreshed the credential.
    pub fn put_mirror_credential(&self, workspace_id: &str, token_json: &str) -> Result<(), HubError> {
        let c = self.conn()?;
        c.execute(
            "INSERT INTO google_tokens (workspace_id, token_json, updated_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(workspace_id) DO UPDATE SET token_json = excluded.token_json, \
             updated_at = excluded.updated_at",
            params![workspace_id, token_json, now_ms()],
        )?;
        Ok(())
    }

    /// Issue a bearer token for API access, 30-day expiry.
    pub fn create_api_token(
        &self,
        workspace_id: &str,
        scopes: &[String],
    ) -> Result<IssuedToken, HubError> {
        let token = IssuedToken {
            token: Uuid::new_v4().simple().to_string(),
            workspace_id: workspace_id.to_string(),
            scopes: scopes.to_vec(),
            expires_at: now_ms() + TOKEN_TTL_MS,
        };
        let c = self.conn()?;
        c.execute(
            "INSERT INTO api_tokens (token, workspace_id, scopes, expires_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.token,
                token.workspace_id,
                serde_json::to_string(&token.scopes).unwrap_or_else(|_| "[]".into()),
                token.expires_at,
            ],
        )?;
        Ok(token)
    }

    /// True when the bearer value matches an unexpired issued token.
    pub fn api_token_valid(&self, token: &str) -> Result<bool, HubError> {
        let c = self.conn()?;
        let hit: Option<i64> = c
            .query_row(
                "SELECT expires_at FROM api_tokens WHERE token = ?1",
                [token],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit.is_some_and(|exp| exp > now_ms()))
    }
}
