//! Local file frame source.
//!
//! This module provides `FileSource` for reading frames from local video files.
//! The file source is responsible for:
//! - Opening a local video file (no network access)
//! - Decoding frames in-memory to RGB24
//! - Declaring the total frame count before iteration
//! - Producing `Frame` instances with contiguous indices
//!
//! `stub://<name>?frames=N&width=W&height=H` paths produce a synthetic video
//! and need no decoder; every other path needs the `ingest-file-ffmpeg` feature.

use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use url::Url;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::FrameSource;
use crate::frame::{rgb_len, Frame};

const DEFAULT_STUB_FRAMES: u64 = 100;
const DEFAULT_STUB_WIDTH: u32 = 64;
const DEFAULT_STUB_HEIGHT: u32 = 48;

/// Configuration for a local file source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path (e.g., "/var/lib/roadscan/survey.mp4") or `stub://` URL.
    pub path: String,
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg {
        config: FileConfig,
        source: Option<FfmpegFileSource>,
    },
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::parse(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg {
                        config,
                        source: None,
                    },
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    /// Number of frames handed out so far.
    pub fn frames_read(&self) -> u64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.next_index,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg { source, .. } => {
                source.as_ref().map_or(0, |s| s.frames_read())
            }
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        match &self.backend {
            FileBackend::Synthetic(source) => source.path.clone(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg { config, .. } => config.path.clone(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg { config, source } => {
                *source = Some(FfmpegFileSource::open(config.clone())?);
                Ok(())
            }
        }
    }

    fn total_frame_count(&self) -> u64 {
        match &self.backend {
            FileBackend::Synthetic(source) => source.total_frames,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg { source, .. } => {
                source.as_ref().map_or(0, |s| s.total_frames())
            }
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg { config, source } => match source {
                Some(source) => source.next_frame(),
                None => Err(anyhow!("{} is not connected", config.path)),
            },
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connected = false,
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg { config, source } => {
                if source.take().is_some() {
                    log::debug!("FileSource: closed {}", config.path);
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    path: String,
    total_frames: u64,
    width: u32,
    height: u32,
    next_index: u64,
    connected: bool,
}

impl SyntheticFileSource {
    fn parse(config: FileConfig) -> Result<Self> {
        let mut source = Self {
            path: config.path,
            total_frames: DEFAULT_STUB_FRAMES,
            width: DEFAULT_STUB_WIDTH,
            height: DEFAULT_STUB_HEIGHT,
            next_index: 0,
            connected: false,
        };
        let url = Url::parse(&source.path).context("parse stub url")?;
        let mut seen = BTreeSet::new();
        for (key, value) in url.query_pairs() {
            if !seen.insert(key.to_string()) {
                return Err(anyhow!("stub parameter '{}' is given more than once", key));
            }
            let invalid = || anyhow!("stub parameter '{}' has invalid value '{}'", key, value);
            match key.as_ref() {
                "frames" => source.total_frames = value.parse().map_err(|_| invalid())?,
                "width" => source.width = value.parse().map_err(|_| invalid())?,
                "height" => source.height = value.parse().map_err(|_| invalid())?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        if source.width == 0 || source.height == 0 {
            return Err(anyhow!("stub frame dimensions must be non-zero"));
        }
        rgb_len(source.width, source.height)?;
        Ok(source)
    }

    fn connect(&mut self) -> Result<()> {
        self.next_index = 0;
        self.connected = true;
        log::info!(
            "FileSource: connected to {} (synthetic, {} frames)",
            self.path,
            self.total_frames
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("{} is not connected", self.path));
        }
        if self.next_index >= self.total_frames {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        let pixels = self.generate_synthetic_pixels(index)?;
        Frame::new(index, pixels, self.width, self.height).map(Some)
    }

    fn generate_synthetic_pixels(&self, index: u64) -> Result<Vec<u8>> {
        // Scene changes every 25 frames so the stub classifier sees some variety.
        let scene = index / 25;
        let mut pixels = vec![0u8; rgb_len(self.width, self.height)?];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64).wrapping_mul(scene + 1).wrapping_add(index) % 256) as u8;
        }
        Ok(pixels)
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
