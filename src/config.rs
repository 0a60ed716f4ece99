use crate::services::scanner::{ScanOptions, DEFAULT_FORMATS};
use crate::services::similarity::DEFAULT_MAX_DISTANCE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// Render `duplicates.png` next to the JSON documents.
    pub visual: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            visual: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub watch_dir: PathBuf,
    /// `None` resolves to the per-user data directory.
    pub database_path: Option<PathBuf>,
    pub poll_interval_secs: u64,
    /// Hamming distance threshold out of 64 hash bits.
    pub max_distance: u32,
    pub recursive: bool,
    pub supported_formats: Vec<String>,
    pub delete_duplicates: bool,
    pub report: Option<ReportConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("."),
            database_path: None,
            poll_interval_secs: 5,
            max_distance: DEFAULT_MAX_DISTANCE,
            recursive: false,
            supported_formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
            delete_duplicates: false,
            report: None,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.recursive,
            supported_formats: self
                .supported_formats
                .iter()
                .map(|f| f.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }
}
