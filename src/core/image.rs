use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opaque identifier of an image inside one submission directory.
///
/// It is the image path relative to the directory, with `/` separators, so two
/// directories may both contain `img1.jpg` without the identifiers meaning the
/// same thing.
pub type ImageIdentifier = String;

/// A directional "candidate looks like source" report emitted by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityObservation {
    pub source: ImageIdentifier,
    pub candidate: ImageIdentifier,
    pub score: f64,
}

impl SimilarityObservation {
    pub fn new(source: impl Into<String>, candidate: impl Into<String>, score: f64) -> Self {
        Self {
            source: source.into(),
            candidate: candidate.into(),
            score,
        }
    }
}

/// One persisted duplicate relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    pub owner: String,
    pub image_id: ImageIdentifier,
    pub ref_image_id: ImageIdentifier,
    pub similarity: f64,
}

impl DuplicateRecord {
    /// Both members of the relationship, in stored order.
    pub fn members(&self) -> [&str; 2] {
        [&self.image_id, &self.ref_image_id]
    }

    /// True when `other` denotes the same unordered pair for the same owner.
    pub fn same_relationship(&self, other: &DuplicateRecord) -> bool {
        if self.owner != other.owner {
            return false;
        }
        (self.image_id == other.image_id && self.ref_image_id == other.ref_image_id)
            || (self.image_id == other.ref_image_id && self.ref_image_id == other.image_id)
    }
}

/// Builds the identifier for `path` relative to the submission directory.
///
/// Returns `None` when `path` is not inside `dir`.
pub fn identifier_for(dir: &Path, path: &Path) -> Option<ImageIdentifier> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
