use image::ImageReader;
use image_hasher::{HashAlg, Hasher, HasherConfig, ImageHash};
use std::path::Path;
use thiserror::Error;

/// Side length of the hash grid; hashes are `HASH_SIZE * HASH_SIZE` bits.
pub const HASH_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Image(#[from] image::ImageError),
}

/// Perceptual hash of one image file.
#[derive(Debug, Clone)]
pub struct PerceptualHash {
    hash: ImageHash,
}

impl PerceptualHash {
    pub fn bits(&self) -> u32 {
        (self.hash.as_bytes().len() * 8) as u32
    }

    /// Hamming distance between two hashes.
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        self.hash.dist(&other.hash)
    }

    /// Similarity in `[0, 1]`; 1.0 means identical hashes.
    pub fn similarity(&self, other: &PerceptualHash) -> f64 {
        let bits = self.bits().max(1) as f64;
        1.0 - self.distance(other) as f64 / bits
    }

    pub fn to_base64(&self) -> String {
        self.hash.to_base64()
    }
}

/// Service for computing perceptual hashes.
///
/// Mean hash over an 8x8 grayscale reduction: each bit says whether a cell is
/// at least as bright as the average cell.
pub struct HashService {
    hasher: Hasher,
}

impl HashService {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(HASH_SIZE, HASH_SIZE)
            .hash_alg(HashAlg::Mean)
            .to_hasher();
        Self { hasher }
    }

    /// Decode the image at `file_path` and hash it.
    pub fn compute_hash(&self, file_path: &Path) -> Result<PerceptualHash, HashError> {
        let img = ImageReader::open(file_path)?.decode()?;
        Ok(PerceptualHash {
            hash: self.hasher.hash_image(&img),
        })
    }
}

impl Default for HashService {
    fn default() -> Self {
        Self::new()
    }
}
