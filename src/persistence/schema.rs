//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so it is safe to
//! re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS session (
    session_id      TEXT PRIMARY KEY NOT NULL,
    model           TEXT NOT NULL,
    workspace_dir   TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    history         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_session_timestamp ON session(timestamp);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
