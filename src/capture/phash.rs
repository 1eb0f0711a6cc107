use std::path::Path;

use anyhow::{Context, Result};
use image_hasher::{HashAlg, HasherConfig};

/// 64-bit perceptual hash of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hamming distance. Fingerprints of different length are maximally far
    /// apart.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        if self.0.len() != other.0.len() {
            return u32::MAX;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// DCT mean hash (pHash) of the image at `path`.
pub fn compute_phash(path: &Path) -> Result<Fingerprint> {
    let img = image::open(path)
        .with_context(|| format!("failed to decode frame {}", path.display()))?;
    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Mean)
        .preproc_dct()
        .hash_size(8, 8)
        .to_hasher();

    let hash = hasher.hash_image(&img);
    Ok(Fingerprint(hash.as_bytes().to_vec()))
}

/// A frame is a near duplicate when a previous fingerprint exists and the
/// distance to it is strictly below `threshold`.
pub fn is_near_duplicate(
    previous: Option<&Fingerprint>,
    current: &Fingerprint,
    threshold: u32,
) -> bool {
    match previous {
        Some(prev) => prev.distance(current) < threshold,
        None => false,
    }
}
