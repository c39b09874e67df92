//! Session repository for `SQLite` persistence.
//!
//! Each save overwrites the full record for its session id; history is
//! stored as one JSON array so the replay order survives verbatim.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::models::session::{HistoryEntry, Session};
use crate::{AppError, Result};

use super::db::Database;

/// Repository wrapper around `SQLite` for session records.
#[derive(Clone)]
pub struct SessionRepo {
    db: Arc<Database>,
}

impl std::fmt::Debug for SessionRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepo").finish_non_exhaustive()
    }
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    model: String,
    workspace_dir: String,
    timestamp: String,
    history: String,
}

impl SessionRow {
    /// Convert a database row into the domain model.
    fn into_session(self) -> Result<Session> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| AppError::Db(format!("invalid timestamp: {e}")))?
            .with_timezone(&Utc);
        let history: Vec<HistoryEntry> = serde_json::from_str(&self.history)
            .map_err(|e| AppError::Db(format!("invalid history for {}: {e}", self.session_id)))?;

        Ok(Session {
            id: self.session_id,
            model: self.model,
            workspace_root: PathBuf::from(self.workspace_dir),
            created_at,
            history,
        })
    }
}

impl SessionRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Upsert the full session record, replacing any earlier snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if serialisation or the write fails.
    pub async fn save(&self, session: &Session) -> Result<()> {
        let history = serde_json::to_string(&session.history)
            .map_err(|e| AppError::Db(format!("failed to serialize history: {e}")))?;

        sqlx::query(
            "INSERT INTO session (session_id, model, workspace_dir, timestamp, history)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                model = excluded.model,
                workspace_dir = excluded.workspace_dir,
                timestamp = excluded.timestamp,
                history = excluded.history",
        )
        .bind(&session.id)
        .bind(&session.model)
        .bind(session.workspace_root.to_string_lossy().into_owned())
        .bind(session.created_at.to_rfc3339())
        .bind(history)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Retrieve a session by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the stored record is corrupt.
    pub async fn load(&self, session_id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT session_id, model, workspace_dir, timestamp, history
             FROM session WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(SessionRow::into_session).transpose()
    }

    /// List known session identifiers, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT session_id FROM session ORDER BY timestamp ASC, session_id ASC")
                .fetch_all(self.db.as_ref())
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Remove a session record. Deleting an unknown id is a no-op.
    ///
    /// Returns `true` if a record was removed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM session WHERE session_id = ?1")
            .bind(session_id)
            .execute(self.db.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
