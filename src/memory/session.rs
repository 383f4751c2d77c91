//! Session store - lead state and conversation history in SQLite
//!
//! One row per `(app, user, session)` holds the serialized [`LeadState`];
//! every user/assistant message is appended to `messages`. All SQLite work
//! runs on the blocking pool behind a single connection mutex.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::state::LeadState;
use crate::ai::Role;

pub const APP_NAME: &str = "neoflow";

const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unsupported database url '{0}', expected sqlite:<path>")]
    InvalidUrl(String),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt session state: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Identifies one conversation of one user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    app: String,
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Open (creating if needed) the database behind a `sqlite:` url
    pub fn open(url: &str) -> SessionResult<Self> {
        let conn = if url == MEMORY_URL {
            Connection::open_in_memory()?
        } else {
            let path = url
                .strip_prefix("sqlite://")
                .or_else(|| url.strip_prefix("sqlite:"))
                .filter(|p| !p.is_empty())
                .ok_or_else(|| SessionError::InvalidUrl(url.to_string()))?;
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(path)?
        };

        Self::init_schema(&conn)?;
        tracing::info!("Session store ready at {}", url);

        Ok(Self {
            app: APP_NAME.to_string(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn in_memory() -> SessionResult<Self> {
        Self::open(MEMORY_URL)
    }

    fn init_schema(conn: &Connection) -> SessionResult<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                app TEXT NOT NULL,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (app, user_id, session_id)
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                app TEXT NOT NULL,
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session
                ON messages (app, user_id, session_id);",
        )?;
        Ok(())
    }

    async fn with_conn<F, T>(&self, f: F) -> SessionResult<T>
    where
        F: FnOnce(&Connection) -> SessionResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| SessionError::Unavailable("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| SessionError::Unavailable(e.to_string()))?
    }

    /// Stored state, or a fresh default when the session is new
    pub async fn load_state(&self, key: &SessionKey) -> SessionResult<LeadState> {
        let (app, key) = (self.app.clone(), key.clone());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT state FROM sessions WHERE app = ?1 AND user_id = ?2 AND session_id = ?3",
            )?;
            let row = stmt.query_row(params![app, key.user_id, key.session_id], |row| {
                row.get::<_, String>(0)
            });
            match row {
                Ok(raw) => Ok(serde_json::from_str(&raw)?),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(LeadState::default()),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn save_state(&self, key: &SessionKey, state: &LeadState) -> SessionResult<()> {
        let raw = serde_json::to_string(state)?;
        let (app, key) = (self.app.clone(), key.clone());
        self.with_conn(move |conn| upsert_state(conn, &app, &key, &raw)).await
    }

    pub async fn append_message(&self, key: &SessionKey, role: Role, content: &str) -> SessionResult<()> {
        let (app, key, content) = (self.app.clone(), key.clone(), content.to_string());
        self.with_conn(move |conn| insert_message(conn, &app, &key, role, &content))
            .await
    }

    /// Write a turn's state and both messages in one transaction
    pub async fn commit_turn(
        &self,
        key: &SessionKey,
        state: &LeadState,
        user_text: &str,
        assistant_text: &str,
    ) -> SessionResult<()> {
        let raw = serde_json::to_string(state)?;
        let (app, key) = (self.app.clone(), key.clone());
        let (user_text, assistant_text) = (user_text.to_string(), assistant_text.to_string());
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            upsert_state(&tx, &app, &key, &raw)?;
            insert_message(&tx, &app, &key, Role::User, &user_text)?;
            insert_message(&tx, &app, &key, Role::Assistant, &assistant_text)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Last `limit` messages of the session, oldest first
    pub async fn recent_messages(&self, key: &SessionKey, limit: usize) -> SessionResult<Vec<StoredMessage>> {
        let (app, key) = (self.app.clone(), key.clone());
        let mut messages = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT session_id, role, content, created_at FROM messages
                     WHERE app = ?1 AND user_id = ?2 AND session_id = ?3
                     ORDER BY id DESC LIMIT ?4",
                )?;
                let rows = stmt.query_map(
                    params![app, key.user_id, key.session_id, limit as i64],
                    read_message,
                )?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        messages.reverse();
        Ok(messages)
    }

    /// Case-insensitive substring search over every session of a user, newest first
    pub async fn search_messages(
        &self,
        user_id: &str,
        query: &str,
        limit: usize,
    ) -> SessionResult<Vec<StoredMessage>> {
        let pattern = format!("%{}%", escape_like(query));
        let (app, user_id) = (self.app.clone(), user_id.to_string());
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, role, content, created_at FROM messages
                 WHERE app = ?1 AND user_id = ?2 AND content LIKE ?3 ESCAPE '\\'
                 ORDER BY id DESC LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![app, user_id, pattern, limit as i64], read_message)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
        .await
    }

    pub async fn mark_escalation(&self, key: &SessionKey, reason: &str) -> SessionResult<()> {
        let mut state = self.load_state(key).await?;
        state.escalation_needed = true;
        state.escalation_reason = Some(reason.to_string());
        self.save_state(key, &state).await
    }
}

fn upsert_state(conn: &Connection, app: &str, key: &SessionKey, raw: &str) -> SessionResult<()> {
    conn.execute(
        "INSERT INTO sessions (app, user_id, session_id, state, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (app, user_id, session_id)
         DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
        params![app, key.user_id, key.session_id, raw, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn insert_message(
    conn: &Connection,
    app: &str,
    key: &SessionKey,
    role: Role,
    content: &str,
) -> SessionResult<()> {
    conn.execute(
        "INSERT INTO messages (app, user_id, session_id, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            app,
            key.user_id,
            key.session_id,
            role.as_str(),
            content,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Writes of one turn, held back until its reply is accepted
pub struct TurnCommit {
    store: SessionStore,
    key: SessionKey,
    state: LeadState,
    user_text: String,
    assistant_text: String,
}

impl TurnCommit {
    pub fn new(
        store: SessionStore,
        key: SessionKey,
        state: LeadState,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) -> Self {
        Self {
            store,
            key,
            state,
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
        }
    }

    pub fn state(&self) -> &LeadState {
        &self.state
    }

    pub async fn apply(self) -> SessionResult<()> {
        self.store
            .commit_turn(&self.key, &self.state, &self.user_text, &self.assistant_text)
            .await
    }
}

fn read_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    let role: String = row.get(1)?;
    let created_at: String = row.get(3)?;
    Ok(StoredMessage {
        session_id: row.get(0)?,
        role: Role::from_str(&role).unwrap_or(Role::User),
        content: row.get(2)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
