use rusqlite::Connection;

pub const DUPLICATE_IMAGES: &str = "duplicate_images";
pub const SCAN_SESSIONS: &str = "scan_sessions";

/// Create tables and indexes if they do not exist yet.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS duplicate_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner TEXT NOT NULL,
            image_id TEXT NOT NULL,
            ref_image_id TEXT NOT NULL,
            similarity REAL NOT NULL,
            created_at TEXT NOT NULL
        );

        -- One row per unordered pair and owner, whichever member is image_id.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_duplicate_images_pair
            ON duplicate_images (owner, min(image_id, ref_image_id), max(image_id, ref_image_id));

        CREATE INDEX IF NOT EXISTS idx_duplicate_images_owner
            ON duplicate_images (owner);

        CREATE TABLE IF NOT EXISTS scan_sessions (
            id TEXT PRIMARY KEY,
            directory TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            records_written INTEGER NOT NULL DEFAULT 0,
            redundant_skipped INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_scan_sessions_directory
            ON scan_sessions (directory);",
    )
}
