use crate::core::exif::{ExifService, TagMap};
use crate::core::image::{DuplicateRecord, ImageIdentifier};
use image::{imageops, Rgba, RgbaImage};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const DUPLICATED_FILE: &str = "duplicated.json";
pub const METADATA_FILE: &str = "images_metadata.json";
pub const DELETED_FILE: &str = "deleted.json";
pub const ARCHIVE_FILE: &str = "output_data.zip";
pub const MONTAGE_FILE: &str = "duplicates.png";

/// Edge length of one montage tile.
const THUMB_SIZE: u32 = 128;

/// Records drawn per montage image. Larger reports are split into
/// `duplicates_2.png`, `duplicates_3.png`, ...
pub const MONTAGE_ROWS: usize = 64;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Archive already exists: {path}")]
    ArchiveExists { path: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Writes the per-directory report under `<output_dir>/<owner>/`.
pub struct ReportWriter {
    output_dir: PathBuf,
    visual: bool,
    exif_service: ExifService,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            visual: false,
            exif_service: ExifService::new(),
        }
    }

    /// Also render `duplicates.png`.
    pub fn with_visual(mut self, visual: bool) -> Self {
        self.visual = visual;
        self
    }

    /// Write all artifacts for one pass and return the report directory.
    ///
    /// Fails with [`ReportError::ArchiveExists`] before touching anything if a
    /// previous pass already left an archive behind. The archive is built in a
    /// temporary file and only appears under its final name once complete.
    pub fn write(
        &self,
        owner: &str,
        dir: &Path,
        records: &[DuplicateRecord],
        deleted: &[ImageIdentifier],
    ) -> Result<PathBuf, ReportError> {
        let report_dir = self.output_dir.join(owner);
        fs::create_dir_all(&report_dir)?;

        let archive_path = report_dir.join(ARCHIVE_FILE);
        if archive_path.exists() {
            return Err(ReportError::ArchiveExists {
                path: archive_path.to_string_lossy().to_string(),
            });
        }

        let surviving: Vec<&str> = records
            .iter()
            .flat_map(|r| r.members())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|id| dir.join(id).is_file())
            .collect();

        let metadata = self.collect_metadata(dir, &surviving);

        write_json(&report_dir.join(DUPLICATED_FILE), &records)?;
        write_json(&report_dir.join(METADATA_FILE), &metadata)?;
        write_json(&report_dir.join(DELETED_FILE), &deleted)?;

        let archive = build_archive(&report_dir, dir, &surviving)?;
        archive
            .persist_noclobber(&archive_path)
            .map_err(|e| match e.error.kind() {
                io::ErrorKind::AlreadyExists => ReportError::ArchiveExists {
                    path: archive_path.to_string_lossy().to_string(),
                },
                _ => ReportError::Io(e.error),
            })?;

        if self.visual && !records.is_empty() {
            for (page, chunk) in records.chunks(MONTAGE_ROWS).enumerate() {
                render_montage(dir, chunk, &report_dir.join(montage_file_name(page)))?;
            }
        }

        log::info!(
            "Report for {} written to {} ({} images archived)",
            owner,
            report_dir.display(),
            surviving.len()
        );
        Ok(report_dir)
    }

    fn collect_metadata(&self, dir: &Path, ids: &[&str]) -> BTreeMap<String, TagMap> {
        let paths: Vec<PathBuf> = ids.iter().map(|id| dir.join(id)).collect();
        let path_refs: Vec<&Path> = paths.iter().map(|p| p.as_path()).collect();
        let results = self.exif_service.extract_tags_batch(&path_refs);

        let mut metadata = BTreeMap::new();
        for (id, (path, result)) in ids.iter().zip(results) {
            match result {
                Ok(tags) => {
                    metadata.insert(id.to_string(), tags);
                }
                Err(e) => log::warn!("No metadata for {}: {}", path, e),
            }
        }
        metadata
    }
}

/// Zips the surviving images into a temporary file next to the final archive.
/// The file is removed when dropped without being persisted.
fn build_archive(report_dir: &Path, dir: &Path, ids: &[&str]) -> Result<NamedTempFile, ReportError> {
    let mut archive = NamedTempFile::new_in(report_dir)?;

    let mut zip = ZipWriter::new(archive.as_file_mut());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for id in ids {
        zip.start_file(*id, options)?;
        let mut source = File::open(dir.join(id))?;
        io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?.flush()?;

    Ok(archive)
}

/// `duplicates.png` for the first page, `duplicates_<n>.png` after that.
pub fn montage_file_name(page: usize) -> String {
    if page == 0 {
        MONTAGE_FILE.to_string()
    } else {
        format!("duplicates_{}.png", page + 1)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// One row per record, both images side by side. Missing images are grey.
/// Callers keep `records` at most [`MONTAGE_ROWS`] long.
fn render_montage(dir: &Path, records: &[DuplicateRecord], path: &Path) -> Result<(), ReportError> {
    let rows = records.len().min(MONTAGE_ROWS) as u32;
    let mut canvas = RgbaImage::from_pixel(THUMB_SIZE * 2, THUMB_SIZE * rows, Rgba([255, 255, 255, 255]));

    for (row, record) in records.iter().take(MONTAGE_ROWS).enumerate() {
        for (col, id) in record.members().iter().enumerate() {
            let tile = match image::open(dir.join(id)) {
                Ok(img) => img.thumbnail(THUMB_SIZE, THUMB_SIZE).to_rgba8(),
                Err(e) => {
                    log::debug!("Placeholder tile for {}: {}", id, e);
                    RgbaImage::from_pixel(THUMB_SIZE, THUMB_SIZE, Rgba([200, 200, 200, 255]))
                }
            };
            let x = col as i64 * THUMB_SIZE as i64;
            let y = row as i64 * THUMB_SIZE as i64;
            imageops::overlay(&mut canvas, &tile, x, y);
        }
    }

    canvas.save(path)?;
    Ok(())
}
