//! Decoded video frames.
//!
//! A `Frame` is one decoded RGB24 picture plus its 0-based position in the
//! video. Frame sources produce them; the classifier registry consumes them.
//! Pixel bytes are kept private so the only way to reach them is through the
//! read-only `pixels()` slice.

use anyhow::{anyhow, Result};
use image::{DynamicImage, RgbImage};

/// One decoded RGB24 frame.
pub struct Frame {
    /// 0-based position in the video.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB24 rows. Length is `width * height * 3`.
    data: Vec<u8>,
}

// Not Clone: frames are large and handed from source to classifier exactly once.

impl Frame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(index: u64, data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected_len = rgb_len(width, height)?;
        if data.len() != expected_len {
            return Err(anyhow!(
                "frame {}: expected {} RGB bytes for {}x{}, received {}",
                index,
                expected_len,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            index,
            width,
            height,
            data,
        })
    }

    /// Convert a decoded image (any color type) into an RGB24 frame.
    pub fn from_image(index: u64, image: DynamicImage) -> Self {
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self {
            index,
            width,
            height,
            data: rgb.into_raw(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Borrow the frame as an `image` buffer (copies the pixels).
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame {} buffer does not match its dimensions", self.index))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
