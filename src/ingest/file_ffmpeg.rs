//! Local file frame source using FFmpeg.
//!
//! Frames are decoded in-memory and scaled to RGB24. The declared frame count
//! comes from the stream header; when the header does not record it (WebM,
//! MKV, raw elementary streams) the video packets are counted in a demux pass
//! and the input is rewound. Duration-based estimates are only logged as a
//! cross-check. Decoding stops at the declared count so indices never run
//! past it.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use super::file::FileConfig;
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    total_frames: u64,
    frames_read: u64,
    eof_sent: bool,
    finished: bool,
}

impl FfmpegFileSource {
    pub(crate) fn open(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let mut input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", config.path))?;
        let container_seconds = seconds(input.duration(), 1.0 / f64::from(ffmpeg::ffi::AV_TIME_BASE));
        let (stream_index, recorded, estimated, parameters) = {
            let input_stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| anyhow!("file has no video track"))?;
            let rate = f64::from(input_stream.avg_frame_rate());
            let stream_seconds = seconds(
                input_stream.duration(),
                f64::from(input_stream.time_base()),
            );
            let estimated = estimate_frames(rate, stream_seconds)
                .or_else(|| estimate_frames(rate, container_seconds));
            let recorded = u64::try_from(input_stream.frames()).ok().filter(|n| *n > 0);
            (input_stream.index(), recorded, estimated, input_stream.parameters())
        };

        let total_frames = match recorded {
            Some(frames) => frames,
            None => {
                let counted = count_video_packets(&mut input, stream_index);
                input
                    .seek(0, ..)
                    .context("rewind file input after counting frames")?;
                if let Some(estimate) = estimated.filter(|e| *e != counted) {
                    log::warn!(
                        "FileSource: {} has {} video packets but its duration suggests {} frames",
                        config.path,
                        counted,
                        estimate
                    );
                }
                counted
            }
        };

        let context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSource: connected to {} (ffmpeg, {} frames declared)",
            config.path,
            total_frames
        );

        Ok(Self {
            config,
            input,
            stream_index,
            decoder,
            scaler,
            total_frames,
            frames_read: 0,
            eof_sent: false,
            finished: false,
        })
    }

    pub(crate) fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub(crate) fn frames_read(&self) -> u64 {
        self.frames_read
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        if self.frames_read >= self.total_frames {
            self.finished = true;
            if self.decode_next()?.is_some() {
                log::warn!(
                    "FileSource: {} decodes past its {} declared frames; the rest is ignored",
                    self.config.path,
                    self.total_frames
                );
            }
            return Ok(None);
        }

        match self.decode_next()? {
            Some(decoded) => self.emit(&decoded).map(Some),
            None => {
                self.finished = true;
                log::warn!(
                    "FileSource: {} ended after {} of {} declared frames",
                    self.config.path,
                    self.frames_read,
                    self.total_frames
                );
                Ok(None)
            }
        }
    }

    fn decode_next(&mut self) -> Result<Option<ffmpeg::frame::Video>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(decoded));
            }
            if self.eof_sent {
                return Ok(None);
            }

            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) => {
                    if index != self.stream_index {
                        continue;
                    }
                    self.decoder
                        .send_packet(&packet)
                        .context("send packet to ffmpeg decoder")?;
                }
                None => {
                    self.decoder.send_eof().context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn emit(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        let index = self.frames_read;
        self.frames_read += 1;
        Frame::new(index, pixels, width, height)
    }
}

/// Packets on the video stream. One packet carries one frame for the codecs
/// that leave the frame count out of the header.
fn count_video_packets(input: &mut ffmpeg::format::context::Input, stream_index: usize) -> u64 {
    input
        .packets()
        .filter(|(stream, _)| stream.index() == stream_index)
        .count() as u64
}

/// Duration in seconds. Unset durations (`AV_NOPTS_VALUE`) and non-positive
/// values yield `None`.
fn seconds(duration: i64, time_base: f64) -> Option<f64> {
    if duration <= 0 {
        return None;
    }
    let seconds = duration as f64 * time_base;
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}

fn estimate_frames(rate: f64, seconds: Option<f64>) -> Option<u64> {
    let seconds = seconds?;
    (rate.is_finite() && rate > 0.0).then(|| (rate * seconds).round() as u64)
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let pixels = data
            .get(..row_bytes * height as usize)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_durations_give_no_estimate() {
        assert_eq!(seconds(i64::MIN, 1.0 / 90_000.0), None);
        assert_eq!(seconds(0, 1.0), None);
        assert_eq!(estimate_frames(30.0, None), None);
        assert_eq!(estimate_frames(f64::NAN, Some(2.0)), None);
    }

    #[test]
    fn estimates_frames_from_rate_and_duration() {
        let container = seconds(2_500_000, 1.0 / f64::from(ffmpeg::ffi::AV_TIME_BASE));
        assert_eq!(estimate_frames(24.0, container), Some(60));
    }
}
