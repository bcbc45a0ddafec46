//! In-memory frame source.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use super::FrameSource;
use crate::frame::Frame;

/// Frame source over frames that were decoded elsewhere.
pub struct MemorySource {
    name: String,
    frames: VecDeque<Frame>,
    total_frames: u64,
    connected: bool,
}

impl MemorySource {
    /// Frames must carry contiguous indices starting at 0.
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        let total_frames = frames.len() as u64;
        Self {
            name: name.into(),
            frames: frames.into(),
            total_frames,
            connected: false,
        }
    }

    /// Override the declared frame count (containers can declare more frames
    /// than they actually decode).
    pub fn with_declared_total(mut self, total_frames: u64) -> Self {
        self.total_frames = total_frames;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl FrameSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory://{}", self.name)
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn total_frame_count(&self) -> u64 {
        self.total_frames
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("{} is not connected", self.describe()));
        }
        Ok(self.frames.pop_front())
    }

    fn close(&mut self) {
        self.connected = false;
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new(i, vec![i as u8; 3], 1, 1).unwrap())
            .collect()
    }

    #[test]
    fn yields_frames_in_order_then_ends() -> Result<()> {
        let mut source = MemorySource::new("clip", frames(3));
        assert!(source.next_frame().is_err());
        source.connect()?;
        assert_eq!(source.total_frame_count(), 3);
        for expected in 0..3 {
            assert_eq!(source.next_frame()?.map(|f| f.index), Some(expected));
        }
        assert!(source.next_frame()?.is_none());
        source.close();
        assert!(!source.is_connected());
        Ok(())
    }
}
