use crate::core::image::{DuplicateRecord, ImageIdentifier};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CullError {
    #[error("Failed to delete {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Deletes the `ref_image_id` side of each relationship.
///
/// The removed images never include both members of any record: a record is
/// left alone when one of its images is already gone, or when its
/// `ref_image_id` is related to an image removed earlier in the pass.
pub struct Culler;

impl Culler {
    pub fn new() -> Self {
        Self
    }

    /// Returns the identifiers removed, in record order.
    pub fn cull(&self, dir: &Path, records: &[DuplicateRecord]) -> Result<Vec<ImageIdentifier>, CullError> {
        let mut neighbours: HashMap<&str, Vec<&str>> = HashMap::new();
        for record in records {
            neighbours
                .entry(&record.image_id)
                .or_default()
                .push(&record.ref_image_id);
            neighbours
                .entry(&record.ref_image_id)
                .or_default()
                .push(&record.image_id);
        }

        let mut removed: HashSet<&str> = HashSet::new();
        let mut deleted = Vec::new();

        for record in records {
            if record.members().iter().any(|m| removed.contains(m)) {
                continue;
            }
            let target = record.ref_image_id.as_str();
            let linked_to_removed = neighbours
                .get(target)
                .is_some_and(|ns| ns.iter().any(|n| removed.contains(n)));
            if linked_to_removed {
                continue;
            }

            let path = dir.join(&record.ref_image_id);
            match fs::remove_file(&path) {
                Ok(()) => {
                    log::info!(
                        "Deleted {} (duplicate of {})",
                        path.display(),
                        record.image_id
                    );
                    deleted.push(record.ref_image_id.clone());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("{} already gone", path.display());
                }
                Err(e) => {
                    return Err(CullError::Remove {
                        path: path.to_string_lossy().to_string(),
                        source: e,
                    });
                }
            }
            removed.insert(target);
        }

        Ok(deleted)
    }
}

impl Default for Culler {
    fn default() -> Self {
        Self::new()
    }
}
