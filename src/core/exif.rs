use exif::{Exif, In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Tags copied into the metadata report, by their EXIF names.
pub const REPORTED_TAGS: [Tag; 5] = [
    Tag::ImageWidth,
    Tag::ImageLength,
    Tag::Make,
    Tag::Model,
    Tag::DateTime,
];

/// Tag name -> rendered value for one image.
pub type TagMap = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ExifError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Service for extracting EXIF metadata from image files
pub struct ExifService;

impl ExifService {
    pub fn new() -> Self {
        Self
    }

    /// Extract the reported tags from an image file.
    ///
    /// A file without a readable EXIF block yields an empty map. IO failures are errors.
    pub fn extract_tags(&self, file_path: &Path) -> Result<TagMap, ExifError> {
        let file = File::open(file_path)?;
        let mut buf_reader = BufReader::new(file);

        let exif = match Reader::new().read_from_container(&mut buf_reader) {
            Ok(exif) => exif,
            Err(exif::Error::Io(e)) => return Err(ExifError::Io(e)),
            Err(e) => {
                log::debug!("No EXIF data in {}: {}", file_path.display(), e);
                return Ok(TagMap::new());
            }
        };

        Ok(self.collect_tags(&exif))
    }

    /// Extract tags from multiple files in parallel
    pub fn extract_tags_batch(
        &self,
        file_paths: &[&Path],
    ) -> Vec<(String, Result<TagMap, ExifError>)> {
        use rayon::prelude::*;

        file_paths
            .par_iter()
            .map(|path| {
                let path_str = path.to_string_lossy().to_string();
                (path_str, self.extract_tags(path))
            })
            .collect()
    }

    fn collect_tags(&self, exif: &Exif) -> TagMap {
        let mut tags = TagMap::new();
        for tag in REPORTED_TAGS {
            if let Some(field) = exif.get_field(tag, In::PRIMARY) {
                tags.insert(tag.to_string(), self.field_to_string(&field.value, tag));
            }
        }
        tags
    }

    /// Convert EXIF field value to string
    fn field_to_string(&self, value: &Value, tag: Tag) -> String {
        match value {
            Value::Ascii(vec) => vec
                .first()
                .map(|ascii| {
                    String::from_utf8_lossy(ascii)
                        .trim_end_matches('\0')
                        .trim()
                        .to_string()
                })
                .unwrap_or_default(),
            _ => format!("{}", value.display_as(tag)),
        }
    }
}

impl Default for ExifService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extract_tags_no_file() {
        let exif_service = ExifService::new();
        let non_existent = Path::new("/non/existent/file.jpg");

        let result = exif_service.extract_tags(non_existent);
        assert!(matches!(result, Err(ExifError::Io(_))));
    }

    #[test]
    fn test_extract_tags_no_exif_data() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("no_exif.png");

        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        img.save(&file_path).unwrap();

        let exif_service = ExifService::new();
        let tags = exif_service.extract_tags(&file_path).unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_reported_tag_names() {
        let names: Vec<String> = REPORTED_TAGS.iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            vec!["ImageWidth", "ImageLength", "Make", "Model", "DateTime"]
        );
    }

    #[test]
    fn test_batch_extraction() {
        let temp_dir = TempDir::new().unwrap();
        let file1 = temp_dir.path().join("file1.png");
        let file2 = temp_dir.path().join("file2.png");
        image::RgbImage::new(2, 2).save(&file1).unwrap();
        image::RgbImage::new(2, 2).save(&file2).unwrap();

        let exif_service = ExifService::new();
        let paths = vec![file1.as_path(), file2.as_path()];
        let results = exif_service.extract_tags_batch(&paths);

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.as_ref().unwrap().is_empty()));
    }
}
