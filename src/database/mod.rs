pub mod models;
pub mod repositories;
pub mod schema;

use rusqlite::{Connection, OpenFlags, ToSql};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use repositories::{DuplicateRepository, InsertOutcome, Lookup, Record, ScanSessionRepository};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error ({path}): {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Could not resolve database location: {0}")]
    Location(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// True for unique-index violations, which callers treat as "already stored".
/// Other constraint failures (NOT NULL, CHECK) are real errors.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Owned handle to the duplicate store.
///
/// Constructed once at startup and passed by reference to whatever needs to
/// read or write.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the store at `path`, creating the file and schema if needed.
    ///
    /// The parent directory must already exist.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let connection_error = |source| DatabaseError::Connection {
            path: path.to_string_lossy().to_string(),
            source,
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(connection_error)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(connection_error)?;
        schema::initialize(&conn).map_err(connection_error)?;

        log::debug!("Opened duplicate store at {}", path.display());
        Ok(Self { conn })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory().map_err(|source| DatabaseError::Connection {
            path: ":memory:".to_string(),
            source,
        })?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn duplicates(&self) -> DuplicateRepository<'_> {
        DuplicateRepository::new(self)
    }

    pub fn sessions(&self) -> ScanSessionRepository<'_> {
        ScanSessionRepository::new(self)
    }

    /// Look up rows of `T` whose key column equals `key`.
    ///
    /// More than one match is not fatal: it is logged and the first row wins.
    pub fn query_by_id<T: Record>(&self, key: &dyn ToSql) -> Result<Lookup<T>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY rowid",
            T::COLUMNS,
            T::TABLE,
            T::KEY
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(&[key] as &[&dyn ToSql], T::from_row)?
            .collect::<Result<Vec<T>, _>>()?;

        let lookup = match rows.len() {
            0 => Lookup::NotFound,
            1 => Lookup::Found(rows.remove(0)),
            count => {
                log::warn!(
                    "Query on {}.{} returned {} rows. Using the first.",
                    T::TABLE,
                    T::KEY,
                    count
                );
                Lookup::Ambiguous {
                    first: rows.remove(0),
                    rows: count,
                }
            }
        };
        Ok(lookup)
    }
}

/// Default store location: `<data dir>/dupwatch/dupwatch.db`.
pub fn default_database_path() -> Result<PathBuf, DatabaseError> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| DatabaseError::Location("Could not find data directory".to_string()))?;

    let app_dir = data_dir.join("dupwatch");
    std::fs::create_dir_all(&app_dir).map_err(|e| {
        DatabaseError::Location(format!("Could not create app directory: {}", e))
    })?;

    Ok(app_dir.join("dupwatch.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_connection() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let db = Database::open(&db_path).unwrap();
        let one: i64 = db
            .connection()
            .query_row("SELECT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(one, 1);
        assert!(db_path.exists());
    }

    #[test]
    fn test_unreachable_location_fails() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("missing").join("test.db");

        let err = Database::open(&db_path).err().unwrap();
        assert!(matches!(err, DatabaseError::Connection { .. }));
        assert!(!db_path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema_and_rows() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let db = Database::open(&db_path).unwrap();
            db.sessions().start("alice").unwrap();
        }

        let db = Database::open(&db_path).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM scan_sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
