//! Frame ingestion sources.
//!
//! This module provides sources of decoded video frames:
//! - Local video files (FFmpeg decode, feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` videos (testing, demos)
//! - In-memory frame lists (callers that decode elsewhere)
//!
//! Every source implements `FrameSource`. A source is opened with `connect()`,
//! declares its total frame count, then yields frames with contiguous 0-based
//! indices until end-of-stream. The analysis pipeline owns a source for the
//! duration of one run and always calls `close()` before returning.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod memory;

use anyhow::Result;

use crate::frame::Frame;

pub use file::{FileConfig, FileSource};
pub use memory::MemorySource;

/// A finite, ordered producer of frames.
pub trait FrameSource {
    /// Human-readable description (path or URL) for logs and errors.
    fn describe(&self) -> String;

    /// Open the underlying resource. Must be called before anything else.
    fn connect(&mut self) -> Result<()>;

    /// Total number of frames the video declares. Valid after `connect()`.
    fn total_frame_count(&self) -> u64;

    /// Next frame in index order, or `None` at end-of-stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying resource. Safe to call more than once.
    fn close(&mut self) {}
}
