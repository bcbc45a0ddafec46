//! Still image classification.
//!
//! Decodes an uploaded or on-disk image and classifies it for a category. The
//! decoded image becomes frame 0 of a one-frame "video", so still images and
//! video frames share the classifier path.

use std::path::Path;

use anyhow::{Context, Result};

use crate::classify::{ClassifierRegistry, Label};
use crate::frame::Frame;

/// Decode encoded image bytes (JPEG or PNG) and classify them.
pub fn classify_image_bytes(
    registry: &ClassifierRegistry,
    bytes: &[u8],
    category: &str,
) -> Result<Label> {
    let image = image::load_from_memory(bytes).context("error reading the image")?;
    let frame = Frame::from_image(0, image);
    Ok(registry.classify(category, &frame)?)
}

/// Read an image file and classify it.
pub fn classify_image_file<P: AsRef<Path>>(
    registry: &ClassifierRegistry,
    path: P,
    category: &str,
) -> Result<Label> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))?;
    classify_image_bytes(registry, &bytes, category)
        .with_context(|| format!("classifying {}", path.display()))
}
