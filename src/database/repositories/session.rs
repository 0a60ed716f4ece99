use super::{Record, Repository};
use crate::database::models::{ScanSession, SessionStatus};
use crate::database::schema::SCAN_SESSIONS;
use crate::database::{Database, DatabaseError, Lookup};
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

impl Record for ScanSession {
    const TABLE: &'static str = SCAN_SESSIONS;
    // Sessions are looked up by directory; retries leave several rows per directory.
    const KEY: &'static str = "directory";
    const COLUMNS: &'static str =
        "id, directory, started_at, completed_at, records_written, redundant_skipped, status";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ScanSession {
            id: row.get(0)?,
            directory: row.get(1)?,
            started_at: row.get(2)?,
            completed_at: row.get(3)?,
            records_written: row.get(4)?,
            redundant_skipped: row.get(5)?,
            status: row.get(6)?,
        })
    }
}

pub struct ScanSessionRepository<'db> {
    db: &'db Database,
}

impl Repository for ScanSessionRepository<'_> {
    fn database(&self) -> &Database {
        self.db
    }
}

impl<'db> ScanSessionRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Open a new in-progress session for `directory` and return its id.
    pub fn start(&self, directory: &str) -> Result<String, DatabaseError> {
        let conn = self.get_connection();
        let id = format!("ses_{}", Uuid::new_v4().simple());
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO scan_sessions (id, directory, started_at, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, directory, now, String::from(SessionStatus::InProgress)],
        )?;

        Ok(id)
    }

    pub fn complete(
        &self,
        id: &str,
        records_written: usize,
        redundant_skipped: usize,
    ) -> Result<(), DatabaseError> {
        let conn = self.get_connection();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE scan_sessions
             SET completed_at = ?1, records_written = ?2, redundant_skipped = ?3, status = ?4
             WHERE id = ?5",
            params![
                now,
                records_written as i64,
                redundant_skipped as i64,
                String::from(SessionStatus::Completed),
                id
            ],
        )?;
        Ok(())
    }

    pub fn fail(&self, id: &str, reason: &str) -> Result<(), DatabaseError> {
        self.finish_with(id, SessionStatus::Failed(reason.to_string()))
    }

    pub fn skip(&self, id: &str, reason: &str) -> Result<(), DatabaseError> {
        self.finish_with(id, SessionStatus::Skipped(reason.to_string()))
    }

    pub fn finish_with(&self, id: &str, status: SessionStatus) -> Result<(), DatabaseError> {
        let conn = self.get_connection();
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "UPDATE scan_sessions SET completed_at = ?1, status = ?2 WHERE id = ?3",
            params![now, String::from(status), id],
        )?;
        Ok(())
    }

    /// Earliest session recorded for `directory`.
    pub fn find_by_directory(&self, directory: &str) -> Result<Lookup<ScanSession>, DatabaseError> {
        self.db.query_by_id::<ScanSession>(&directory)
    }

    pub fn list_for_directory(&self, directory: &str) -> Result<Vec<ScanSession>, DatabaseError> {
        let conn = self.get_connection();
        let sql = format!(
            "SELECT {} FROM {} WHERE directory = ?1 ORDER BY rowid",
            ScanSession::COLUMNS,
            ScanSession::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![directory], ScanSession::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_complete() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.sessions();

        let id = repo.start("alice").unwrap();
        assert!(id.starts_with("ses_"));

        repo.complete(&id, 3, 3).unwrap();

        let session = repo.find_by_directory("alice").unwrap().into_option().unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.records_written, 3);
        assert_eq!(session.redundant_skipped, 3);
        assert!(session.completed_at.is_some());
    }

    #[test]
    fn test_failed_session_keeps_reason() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.sessions();

        let id = repo.start("u4").unwrap();
        repo.skip(&id, "directory vanished").unwrap();

        let sessions = repo.list_for_directory("u4").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions[0].status(),
            SessionStatus::Skipped("directory vanished".to_string())
        );
    }

    #[test]
    fn test_retried_directory_lookup_is_ambiguous() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.sessions();

        let first = repo.start("u4").unwrap();
        repo.fail(&first, "boom").unwrap();
        let second = repo.start("u4").unwrap();
        repo.complete(&second, 1, 1).unwrap();

        match repo.find_by_directory("u4").unwrap() {
            Lookup::Ambiguous { first: row, rows } => {
                assert_eq!(rows, 2);
                assert_eq!(row.id, first);
            }
            other => panic!("expected ambiguous lookup, got {:?}", other),
        }

        // Degraded handling still yields a usable row.
        let row = repo.find_by_directory("u4").unwrap().into_option().unwrap();
        assert_eq!(row.id, first);
    }

    #[test]
    fn test_unknown_directory() {
        let db = Database::open_in_memory().unwrap();
        let lookup = db.sessions().find_by_directory("nobody").unwrap();
        assert!(!lookup.is_found());
    }
}
