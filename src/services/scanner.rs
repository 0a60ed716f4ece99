use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Directory does not exist: {path}")]
    Missing { path: String },

    #[error("Cannot read directory {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: walkdir::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    pub recursive: bool,
    /// Lower-case extensions without the dot.
    pub supported_formats: Vec<String>,
}

pub const DEFAULT_FORMATS: [&str; 8] = ["jpg", "jpeg", "png", "bmp", "gif", "tiff", "tif", "webp"];

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            supported_formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl ScanOptions {
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.supported_formats.iter().any(|f| *f == ext))
    }
}

/// Finds image files inside one submission directory.
pub struct ScannerService;

impl ScannerService {
    pub fn new() -> Self {
        Self
    }

    /// Image files under `dir`, sorted by path.
    ///
    /// Only the top level is listed unless `options.recursive` is set. Failing to
    /// read `dir` itself is an error; unreadable nested entries are skipped.
    pub fn discover_images(&self, dir: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
        if !dir.is_dir() {
            return Err(ScanError::Missing {
                path: dir.to_string_lossy().to_string(),
            });
        }

        let walker = if options.recursive {
            WalkDir::new(dir)
        } else {
            WalkDir::new(dir).max_depth(1)
        };

        let mut images = Vec::new();
        for entry in walker.sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(ScanError::Unreadable {
                        path: dir.to_string_lossy().to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    log::warn!("Skipping entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && options.accepts(entry.path()) {
                images.push(entry.into_path());
            }
        }

        images.sort();
        log::debug!("Found {} images in {}", images.len(), dir.display());
        Ok(images)
    }
}

impl Default for ScannerService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"not really an image").unwrap();
    }

    #[test]
    fn test_filters_by_extension() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("b.JPG"));
        touch(&temp_dir.path().join("a.png"));
        touch(&temp_dir.path().join("notes.txt"));
        touch(&temp_dir.path().join("README"));

        let found = ScannerService::new()
            .discover_images(temp_dir.path(), &ScanOptions::default())
            .unwrap();

        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.JPG"]);
    }

    #[test]
    fn test_recursion_is_opt_in() {
        let temp_dir = TempDir::new().unwrap();
        touch(&temp_dir.path().join("top.jpg"));
        touch(&temp_dir.path().join("nested/deep.jpg"));

        let scanner = ScannerService::new();
        let flat = scanner
            .discover_images(temp_dir.path(), &ScanOptions::default())
            .unwrap();
        assert_eq!(flat.len(), 1);

        let options = ScanOptions {
            recursive: true,
            ..ScanOptions::default()
        };
        let deep = scanner.discover_images(temp_dir.path(), &options).unwrap();
        assert_eq!(deep.len(), 2);
        assert!(deep.contains(&temp_dir.path().join("nested").join("deep.jpg")));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = ScannerService::new()
            .discover_images(&temp_dir.path().join("gone"), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, ScanError::Missing { .. }));
    }
}
