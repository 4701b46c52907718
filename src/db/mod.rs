//! SQLite-backed hub storage: workspaces, append-only session records,
//! the revision ledger, and stored credentials.

mod credential;
mod session;
mod workspace;

pub use credential::IssuedToken;
pub use session::{CommitOutcome, SessionCommit};

use std::collections::BTreeMap;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use crate::categories::Category;
use crate::error::HubError;

/// Set busy_timeout on every connection handed out by the pool.
/// Prevents SQLITE_BUSY when a commit holds the write lock.
#[derive(Debug)]
struct BusyTimeoutCustomizer;
impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for BusyTimeoutCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    }
}

type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

pub const MAX_CONTENT_LEN: usize = 8192;
const MAX_NAME_LEN: usize = 128;
const MAX_TEAM_KEY_LEN: usize = 64;

/// Ledger sentinel for a workspace that has never been written to.
pub const REVISION_INIT: &str = "init";

/// Who a session record belongs to within a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Personal,
    Team,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Personal => "personal",
            Scope::Team => "team",
        }
    }

    fn from_db(s: &str) -> Scope {
        if s == "team" {
            Scope::Team
        } else {
            Scope::Personal
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub doc_personal_id: Option<String>,
    /// team-key → remote document id.
    #[serde(default)]
    pub team_map: BTreeMap<String, String>,
    /// Known category labels, in first-seen order.
    #[serde(default)]
    pub categories: Vec<String>,
}

impl Workspace {
    /// Remote document backing the given partition, if the workspace has one.
    pub fn doc_for(&self, scope: Scope, team_key: Option<&str>) -> Option<&str> {
        match scope {
            Scope::Personal => self.doc_personal_id.as_deref(),
            Scope::Team => team_key.and_then(|k| self.team_map.get(k)).map(String::as_str),
        }
    }
}

/// One handoff entry. Immutable once written; updates are new appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub workspace_id: String,
    pub scope: Scope,
    pub team_key: Option<String>,
    pub revision_id: String,
    pub content: String,
    pub categories: Vec<Category>,
    pub created_at: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct HubStats {
    pub workspaces: usize,
    pub sessions: usize,
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_millis() as i64
}

pub(crate) fn validate_content(content: &str) -> Result<(), HubError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(HubError::EmptyContent);
    }
    if trimmed.chars().count() > MAX_CONTENT_LEN {
        return Err(HubError::ContentTooLong);
    }
    Ok(())
}

pub(crate) fn validate_partition(scope: Scope, team_key: Option<&str>) -> Result<(), HubError> {
    match scope {
        Scope::Team => {
            let key = team_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| HubError::Validation("team scope requires team_key".into()))?;
            if key.chars().count() > MAX_TEAM_KEY_LEN {
                return Err(HubError::Validation("team_key too long".into()));
            }
        }
        Scope::Personal => {}
    }
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS workspaces (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    doc_personal_id TEXT,
    team_map TEXT NOT NULL DEFAULT '{}',
    categories TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL REFERENCES workspaces(id),
    scope TEXT NOT NULL DEFAULT 'personal',
    team_key TEXT,
    revision_id TEXT NOT NULL,
    content TEXT NOT NULL,
    categories TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_partition
    ON sessions(workspace_id, scope, team_key, created_at);

CREATE TABLE IF NOT EXISTS revisions (
    workspace_id TEXT PRIMARY KEY,
    revision_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS google_tokens (
    workspace_id TEXT PRIMARY KEY,
    token_json TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS api_tokens (
    token TEXT PRIMARY KEY,
    workspace_id TEXT NOT NULL,
    scopes TEXT NOT NULL DEFAULT '[]',
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_api_tokens_expiry ON api_tokens(expires_at);
"#;

/// SQLite-backed hub store.
pub struct HubDB {
    pool: Pool<SqliteConnectionManager>,
}

impl HubDB {
    /// Open (or create) a database at the given path.
    /// Pool size defaults to 8 (1 writer + 7 readers in WAL mode).
    pub fn open(path: &str) -> Result<Self, HubError> {
        let pool_size = if path == ":memory:" { 2 } else { 8 };
        let manager = if path == ":memory:" {
            // Shared cache so all pool connections see the same in-memory DB.
            // Each test gets a unique name to avoid cross-test pollution.
            let name = uuid::Uuid::new_v4().to_string();
            SqliteConnectionManager::file(format!("file:{name}?mode=memory&cache=shared"))
        } else {
            SqliteConnectionManager::file(path)
        };
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(BusyTimeoutCustomizer))
            .build(manager)
            .map_err(|e| HubError::Internal(format!("pool: {e}")))?;

        let conn = pool.get().map_err(|e| HubError::Internal(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConn, HubError> {
        self.pool.get().map_err(|e| HubError::Internal(format!("pool: {e}")))
    }

    pub fn stats(&self) -> HubStats {
        let count = |sql: &str| -> usize {
            self.conn()
                .ok()
                .and_then(|c| c.query_row(sql, [], |r| r.get::<_, i64>(0)).ok())
                .unwrap_or(0) as usize
        };
        HubStats {
            workspaces: count("SELECT COUNT(*) FROM workspaces"),
            sessions: count("SELECT COUNT(*) FROM sessions"),
        }
    }

    /// Database file size in bytes (via SQLite pragma).
    pub fn db_size_bytes(&self) -> i64 {
        self.conn()
            .and_then(|c| {
                c.query_row(
                    "SELECT page_count * page_size FROM pragma_page_count, pragma_page_size",
                    [],
                    |r| r.get(0),
                )
                .map_err(|e| HubError::Internal(e.to_string()))
            })
            .unwrap_or(0)
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<SessionRecord> {
    let scope: String = row.get("scope")?;
    let categories: String = row.get("categories")?;
    Ok(SessionRecord {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        scope: Scope::from_db(&scope),
        team_key: row.get("team_key")?,
        revision_id: row.get("revision_id")?,
        content: row.get("content")?,
        categories: serde_json::from_str(&categories).unwrap_or_default(),
        created_at: row.get("created_at")?,
    })
}

fn row_to_workspace(row: &rusqlite::Row) -> rusqlite::Result<Workspace> {
    let team_map: String = row.get("team_map")?;
    let categories: String = row.get("categories")?;
    Ok(Workspace {
        id: row.get("id")?,
        name: row.get("name")?,
        doc_personal_id: row.get("doc_personal_id")?,
        team_map: serde_json::from_str(&team_map).unwrap_or_default(),
        categories: serde_json::from_str(&categories).unwrap_or_default(),
    })
}
