pub mod duplicate;
pub mod session;

pub use duplicate::{DuplicateRepository, InsertOutcome};
pub use session::ScanSessionRepository;

use super::Database;
use rusqlite::{Connection, Row};

pub trait Repository {
    fn database(&self) -> &Database;

    fn get_connection(&self) -> &Connection {
        self.database().connection()
    }
}

/// A row type that can be fetched with [`Database::query_by_id`].
///
/// Table and column names are compile-time constants; only values are bound.
pub trait Record: Sized {
    const TABLE: &'static str;
    /// Column matched against the lookup key.
    const KEY: &'static str;
    const COLUMNS: &'static str;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Outcome of a keyed lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// Several rows matched; `first` is the earliest inserted.
    Ambiguous { first: T, rows: usize },
}

impl<T> Lookup<T> {
    /// The usable row, if any. Ambiguous lookups degrade to their first row.
    pub fn into_option(self) -> Option<T> {
        match self {
            Lookup::Found(row) | Lookup::Ambiguous { first: row, .. } => Some(row),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Lookup::NotFound)
    }
}
