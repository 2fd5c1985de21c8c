//! Database module for Meloman.
//!
//! Provides database initialization, migrations, models and queries.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::Path;

pub mod models;
pub mod queries;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("src/db/migrations");
}

#[derive(Debug)]
pub enum DbError {
    Connection(rusqlite::Error),
    Migration(refinery::Error),
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbError::Connection(e) => write!(f, "Database connection error: {}", e),
            DbError::Migration(e) => write!(f, "Migration error: {}", e),
        }
    }
}

impl std::error::Error for DbError {}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Connection(err)
    }
}

impl From<refinery::Error> for DbError {
    fn from(err: refinery::Error) -> Self {
        DbError::Migration(err)
    }
}

/// Case-folding used for every case-insensitive comparison.
///
/// SQLite's own `lower()` only folds ASCII, which is not enough for
/// non-Latin titles and artist names.
pub fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Configure connection with recommended pragmas and the `fold()` SQL function
fn configure_connection(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA busy_timeout = 5000;",
    )?;

    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| fold(&v)))
        },
    )?;
    Ok(())
}

/// Initialize database connection and run migrations
pub fn init_db<P: AsRef<Path>>(db_path: P) -> Result<Connection, DbError> {
    let mut conn = Connection::open(db_path)?;
    configure_connection(&conn)?;
    embedded::migrations::runner().run(&mut conn)?;
    Ok(conn)
}

/// Initialize an in-memory database (useful for testing)
pub fn init_db_memory() -> Result<Connection, DbError> {
    let mut conn = Connection::open_in_memory()?;
    configure_connection(&conn)?;
    embedded::migrations::runner().run(&mut conn)?;
    Ok(conn)
}

/// Whether an error is a UNIQUE or PRIMARY KEY constraint violation.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_memory() {
        let conn = init_db_memory().expect("Failed to initialize in-memory database");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"tracks".to_string()));
        assert!(tables.contains(&"catalog".to_string()));
        assert!(tables.contains(&"playlists".to_string()));
        assert!(tables.contains(&"playlist_tracks".to_string()));
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = init_db_memory().expect("Failed to initialize in-memory database");

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(fk_enabled, 1, "Foreign keys should be enabled");
    }

    #[test]
    fn test_fold_function_handles_unicode() {
        let conn = init_db_memory().unwrap();

        let folded: String = conn
            .query_row("SELECT fold(?1)", ["  Кино "], |row| row.get(0))
            .unwrap();

        assert_eq!(folded, "кино");
    }

    #[test]
    fn test_unique_violation_detected() {
        let conn = init_db_memory().unwrap();
        conn.execute(
            "INSERT INTO users (email, password_hash) VALUES ('a@b.cd', 'x')",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO users (email, password_hash) VALUES ('a@b.cd', 'y')",
                [],
            )
            .unwrap_err();

        assert!(is_unique_violation(&err));
    }
}
