use crate::core::hash::{HashService, PerceptualHash};
use crate::core::image::{identifier_for, ImageIdentifier, SimilarityObservation};
use crate::services::scanner::{ScanError, ScanOptions, ScannerService};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Default Hamming distance threshold, out of 64 bits.
pub const DEFAULT_MAX_DISTANCE: u32 = 10;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Directory unreadable: {0}")]
    DirectoryUnreadable(#[from] ScanError),

    #[error("Similarity detection cancelled")]
    Cancelled,
}

/// Source of near-duplicate observations for one directory.
pub trait SimilarityOracle {
    /// Every near-duplicate relationship among the images in `dir`.
    ///
    /// Images without a duplicate are absent from the result. Checks `cancel`
    /// between units of work.
    fn detect(&self, dir: &Path, cancel: &AtomicBool) -> Result<Vec<SimilarityObservation>, OracleError>;
}

/// Mean-hash oracle: two images are near-duplicates when their hashes differ
/// in at most `max_distance` bits.
///
/// Reports each relationship from both sides, ordered by (source, candidate).
pub struct PerceptualOracle {
    scanner: ScannerService,
    hash_service: HashService,
    options: ScanOptions,
    max_distance: u32,
    show_progress: bool,
}

impl PerceptualOracle {
    pub fn new(options: ScanOptions, max_distance: u32) -> Self {
        Self {
            scanner: ScannerService::new(),
            hash_service: HashService::new(),
            options,
            max_distance,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        match ProgressStyle::with_template("{spinner:.green} [{bar:30}] {pos}/{len} {msg}") {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => log::debug!("Progress template rejected: {}", e),
        }
        bar
    }

    fn hash_images(
        &self,
        dir: &Path,
        cancel: &AtomicBool,
    ) -> Result<Vec<(ImageIdentifier, PerceptualHash)>, OracleError> {
        let files = self.scanner.discover_images(dir, &self.options)?;

        let bar = self.progress_bar(files.len());
        bar.set_message(format!("hashing {}", dir.display()));

        let hashed: Vec<_> = files
            .par_iter()
            .filter_map(|path| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let result = self.hash_service.compute_hash(path);
                bar.inc(1);
                Some((path, result))
            })
            .collect();
        bar.finish_and_clear();

        if cancel.load(Ordering::Relaxed) {
            return Err(OracleError::Cancelled);
        }
        // Files failing to open is expected if the whole directory went away.
        if !dir.is_dir() {
            return Err(ScanError::Missing {
                path: dir.to_string_lossy().to_string(),
            }
            .into());
        }

        let mut hashes = Vec::with_capacity(hashed.len());
        for (path, result) in hashed {
            match result {
                Ok(hash) => {
                    if let Some(id) = identifier_for(dir, path) {
                        hashes.push((id, hash));
                    }
                }
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
        Ok(hashes)
    }
}

impl SimilarityOracle for PerceptualOracle {
    fn detect(&self, dir: &Path, cancel: &AtomicBool) -> Result<Vec<SimilarityObservation>, OracleError> {
        let hashes = self.hash_images(dir, cancel)?;

        let mut observations: Vec<SimilarityObservation> = (0..hashes.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let (source, source_hash) = &hashes[i];
                hashes[i + 1..]
                    .iter()
                    .filter(|(_, candidate_hash)| {
                        source_hash.distance(candidate_hash) <= self.max_distance
                    })
                    .flat_map(|(candidate, candidate_hash)| {
                        let score = source_hash.similarity(candidate_hash);
                        [
                            SimilarityObservation::new(source.clone(), candidate.clone(), score),
                            SimilarityObservation::new(candidate.clone(), source.clone(), score),
                        ]
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        if cancel.load(Ordering::Relaxed) {
            return Err(OracleError::Cancelled);
        }

        observations.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then_with(|| a.candidate.cmp(&b.candidate))
        });
        log::debug!(
            "{} observations among {} images in {}",
            observations.len(),
            hashes.len(),
            dir.display()
        );
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::tests::{write_checkerboard, write_gradient};
    use std::fs;
    use tempfile::TempDir;

    fn oracle() -> PerceptualOracle {
        PerceptualOracle::new(ScanOptions::default(), DEFAULT_MAX_DISTANCE)
    }

    #[test]
    fn test_reports_both_directions() {
        let temp_dir = TempDir::new().unwrap();
        write_gradient(&temp_dir.path().join("img1.png"), false);
        write_gradient(&temp_dir.path().join("img2.png"), false);
        write_checkerboard(&temp_dir.path().join("img3.png"));

        let observations = oracle()
            .detect(temp_dir.path(), &AtomicBool::new(false))
            .unwrap();

        assert_eq!(
            observations,
            vec![
                SimilarityObservation::new("img1.png", "img2.png", 1.0),
                SimilarityObservation::new("img2.png", "img1.png", 1.0),
            ]
        );
    }

    #[test]
    fn test_unrelated_images_produce_nothing() {
        let temp_dir = TempDir::new().unwrap();
        write_gradient(&temp_dir.path().join("light.png"), false);
        write_gradient(&temp_dir.path().join("dark.png"), true);

        let observations = oracle()
            .detect(temp_dir.path(), &AtomicBool::new(false))
            .unwrap();
        assert!(observations.is_empty());
    }

    #[test]
    fn test_undecodable_files_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_gradient(&temp_dir.path().join("a.png"), false);
        write_gradient(&temp_dir.path().join("b.png"), false);
        fs::write(temp_dir.path().join("broken.jpg"), b"garbage").unwrap();

        let observations = oracle()
            .detect(temp_dir.path(), &AtomicBool::new(false))
            .unwrap();
        assert_eq!(observations.len(), 2);
        assert!(observations
            .iter()
            .all(|o| o.source != "broken.jpg" && o.candidate != "broken.jpg"));
    }

    #[test]
    fn test_nested_identifiers_use_relative_paths() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("day1")).unwrap();
        write_gradient(&temp_dir.path().join("day1").join("a.png"), false);
        write_gradient(&temp_dir.path().join("b.png"), false);

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let observations = PerceptualOracle::new(options, DEFAULT_MAX_DISTANCE)
            .detect(temp_dir.path(), &AtomicBool::new(false))
            .unwrap();

        assert_eq!(observations[0].source, "b.png");
        assert_eq!(observations[0].candidate, "day1/a.png");
    }

    #[test]
    fn test_missing_directory_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let err = oracle()
            .detect(&temp_dir.path().join("u4"), &AtomicBool::new(false))
            .unwrap_err();
        assert!(matches!(err, OracleError::DirectoryUnreadable(_)));
    }

    #[test]
    fn test_cancelled_before_start() {
        let temp_dir = TempDir::new().unwrap();
        write_gradient(&temp_dir.path().join("a.png"), false);

        let err = oracle()
            .detect(temp_dir.path(), &AtomicBool::new(true))
            .unwrap_err();
        assert!(matches!(err, OracleError::Cancelled));
    }
}
