use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use crate::classify::backend::ClassifierBackend;

/// Stub backend for testing and demos.
///
/// Scores are derived from a SHA-256 of the pixels, so the same frame always
/// gets the same label and different frames spread across the vocabulary.
pub struct StubBackend {
    num_labels: usize,
}

impl StubBackend {
    pub fn new(num_labels: usize) -> Self {
        Self { num_labels }
    }
}

impl ClassifierBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<f32>> {
        if pixels.is_empty() {
            return Err(anyhow!("empty frame"));
        }
        let digest: [u8; 32] = Sha256::digest(pixels).into();
        Ok((0..self.num_labels)
            .map(|i| digest[i % digest.len()] as f32 / 255.0)
            .collect())
    }
}
