use super::{Record, Repository};
use crate::core::image::DuplicateRecord;
use crate::database::models::DuplicateImage;
use crate::database::schema::DUPLICATE_IMAGES;
use crate::database::{is_unique_violation, Database, DatabaseError};
use chrono::Utc;
use rusqlite::{params, Row};

/// Result of a duplicate insert. A uniqueness conflict is not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    AlreadyExists,
}

impl Record for DuplicateImage {
    const TABLE: &'static str = DUPLICATE_IMAGES;
    const KEY: &'static str = "id";
    const COLUMNS: &'static str = "id, owner, image_id, ref_image_id, similarity, created_at";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(DuplicateImage {
            id: row.get(0)?,
            owner: row.get(1)?,
            image_id: row.get(2)?,
            ref_image_id: row.get(3)?,
            similarity: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

pub struct DuplicateRepository<'db> {
    db: &'db Database,
}

impl Repository for DuplicateRepository<'_> {
    fn database(&self) -> &Database {
        self.db
    }
}

impl<'db> DuplicateRepository<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self { db }
    }

    /// Insert one canonical relationship.
    ///
    /// Does not deduplicate on its own; it relies on the pair index and reports
    /// a conflict as [`InsertOutcome::AlreadyExists`].
    pub fn insert_duplicate(&self, record: &DuplicateRecord) -> Result<InsertOutcome, DatabaseError> {
        if !record.similarity.is_finite() {
            return Err(DatabaseError::InvalidRecord(format!(
                "similarity {} for {} / {} is not a finite number",
                record.similarity, record.image_id, record.ref_image_id
            )));
        }

        let conn = self.get_connection();
        let now = Utc::now().to_rfc3339();

        let result = conn.execute(
            "INSERT INTO duplicate_images (owner, image_id, ref_image_id, similarity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.owner,
                record.image_id,
                record.ref_image_id,
                record.similarity,
                now
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                log::debug!(
                    "Pair {} / {} already stored for {}",
                    record.image_id,
                    record.ref_image_id,
                    record.owner
                );
                Ok(InsertOutcome::AlreadyExists)
            }
            Err(e) => Err(DatabaseError::Query(e)),
        }
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<DuplicateImage>, DatabaseError> {
        Ok(self.db.query_by_id::<DuplicateImage>(&id)?.into_option())
    }

    pub fn find_by_owner(&self, owner: &str) -> Result<Vec<DuplicateImage>, DatabaseError> {
        let conn = self.get_connection();
        let sql = format!(
            "SELECT {} FROM {} WHERE owner = ?1 ORDER BY id",
            DuplicateImage::COLUMNS,
            DuplicateImage::TABLE
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![owner], DuplicateImage::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn count_by_owner(&self, owner: &str) -> Result<i64, DatabaseError> {
        let conn = self.get_connection();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM duplicate_images WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn count(&self) -> Result<i64, DatabaseError> {
        let conn = self.get_connection();
        let count = conn.query_row("SELECT COUNT(*) FROM duplicate_images", [], |row| row.get(0))?;
        Ok(count)
    }
}
