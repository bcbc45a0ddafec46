//! Video damage analysis pipeline.
//!
//! One `analyze` call owns one frame source for its whole duration:
//!
//! 1. validate stride and category (before touching the source)
//! 2. open the source and read its declared frame count, refusing counts
//!    above the configured limit
//! 3. generate the full trajectory for that count
//! 4. walk frames in index order, classifying every `stride`-th one
//! 5. aggregate observations into an `AnalysisReport`
//!
//! Per-frame classification failures are logged and skipped. Source failures,
//! unknown categories and runs with zero observations are returned as distinct
//! `AnalysisError` variants so callers can map them to different responses.
//! The source is closed on every exit path.

use std::sync::Arc;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::classify::{ClassifierRegistry, ClassifyError};
use crate::config::{AnalyzerConfig, DEFAULT_MAX_FRAMES};
use crate::ingest::FrameSource;
use crate::report::{AnalysisReport, SampledObservation};
use crate::trajectory::{self, TrajectoryConfig};

/// Whole-run failures of [`VideoAnalyzer::analyze`].
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("stride must be a positive integer, got {stride}")]
    InvalidStride { stride: u64 },

    #[error("unknown category '{category}' (known categories: {known:?})")]
    UnknownCategory { category: String, known: Vec<String> },

    #[error("unable to open video source {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("source {source_name} failed at frame {frame_index}: {reason}")]
    SourceRead {
        source_name: String,
        frame_index: u64,
        reason: String,
    },

    #[error(
        "no frames were successfully analyzed in {source_name} for category '{category}' \
         ({sampled_frames} frames sampled)"
    )]
    NoObservations {
        source_name: String,
        category: String,
        sampled_frames: u64,
    },
}

impl AnalysisError {
    /// True when the request itself was bad (stride, category, unreadable
    /// upload) rather than the analysis producing nothing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidStride { .. }
                | AnalysisError::UnknownCategory { .. }
                | AnalysisError::SourceUnavailable { .. }
        )
    }
}

/// Closes the source when the analysis returns, on any path.
struct SourceGuard<'a, S: FrameSource + ?Sized> {
    source: &'a mut S,
}

impl<S: FrameSource + ?Sized> Drop for SourceGuard<'_, S> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// Runs the analysis pipeline against a shared classifier registry.
///
/// Holds no per-run state, so one analyzer can serve concurrent requests.
pub struct VideoAnalyzer {
    classifier: Arc<ClassifierRegistry>,
    trajectory: TrajectoryConfig,
    seed: Option<u64>,
    max_frames: u64,
}

impl VideoAnalyzer {
    pub fn new(classifier: Arc<ClassifierRegistry>, trajectory: TrajectoryConfig) -> Result<Self> {
        trajectory.validate()?;
        Ok(Self {
            classifier,
            trajectory,
            seed: None,
            max_frames: DEFAULT_MAX_FRAMES,
        })
    }

    pub fn from_config(config: &AnalyzerConfig, classifier: Arc<ClassifierRegistry>) -> Result<Self> {
        Ok(Self::new(classifier, config.trajectory.clone())?
            .with_seed(config.seed)
            .with_max_frames(config.max_frames))
    }

    /// Fix the trajectory seed so every run produces the same geotags.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Refuse sources that declare more than `max_frames` frames.
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn classifier(&self) -> &ClassifierRegistry {
        &self.classifier
    }

    fn unknown_category(&self, category: &str, error: ClassifyError) -> AnalysisError {
        log::warn!("analysis: rejected category '{}': {}", category, error);
        AnalysisError::UnknownCategory {
            category: category.to_string(),
            known: self.classifier.categories(),
        }
    }

    /// Analyze one video for one category, classifying every `stride`-th frame.
    pub fn analyze<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
        category: &str,
        stride: u64,
    ) -> Result<AnalysisReport, AnalysisError> {
        match self.seed {
            Some(seed) => {
                self.analyze_with_rng(source, category, stride, &mut StdRng::seed_from_u64(seed))
            }
            None => self.analyze_with_rng(source, category, stride, &mut rand::thread_rng()),
        }
    }

    /// Same as [`analyze`](Self::analyze) with an explicit trajectory RNG.
    pub fn analyze_with_rng<S: FrameSource + ?Sized, R: Rng + ?Sized>(
        &self,
        source: &mut S,
        category: &str,
        stride: u64,
        rng: &mut R,
    ) -> Result<AnalysisReport, AnalysisError> {
        if stride == 0 {
            return Err(AnalysisError::InvalidStride { stride });
        }
        let vocabulary = match self.classifier.vocabulary(category) {
            Ok(vocabulary) => vocabulary,
            Err(e) => return Err(self.unknown_category(category, e)),
        };

        let source_name = source.describe();
        let mut guard = SourceGuard { source };
        guard
            .source
            .connect()
            .map_err(|e| AnalysisError::SourceUnavailable {
                source_name: source_name.clone(),
                reason: format!("{:#}", e),
            })?;

        let total_frames = guard.source.total_frame_count();
        if total_frames > self.max_frames {
            return Err(AnalysisError::SourceUnavailable {
                source_name,
                reason: format!(
                    "source declares {} frames, more than the limit of {}",
                    total_frames, self.max_frames
                ),
            });
        }
        let trajectory = trajectory::generate(total_frames, &self.trajectory, rng);
        log::info!(
            "analysis: {} declares {} frames, category '{}', stride {}",
            source_name,
            total_frames,
            category,
            stride
        );

        let read_error = |frame_index: u64, reason: String| AnalysisError::SourceRead {
            source_name: source_name.clone(),
            frame_index,
            reason,
        };

        let mut observations: Vec<SampledObservation> = Vec::new();
        let mut sampled_frames = 0u64;
        let mut expected_index = 0u64;

        loop {
            let frame = match guard.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => return Err(read_error(expected_index, format!("{:#}", e))),
            };
            if frame.index != expected_index {
                return Err(read_error(
                    expected_index,
                    format!("source produced frame {} out of order", frame.index),
                ));
            }
            expected_index += 1;

            let coordinate = trajectory.get(frame.index).ok_or_else(|| {
                read_error(
                    frame.index,
                    format!("frame is beyond the declared {} frames", total_frames),
                )
            })?;

            if frame.index % stride != 0 {
                continue;
            }
            sampled_frames += 1;

            match self.classifier.classify(category, &frame) {
                Ok(label) => {
                    log::debug!("analysis: frame {} -> {}", frame.index, label);
                    observations.push(SampledObservation {
                        frame_index: frame.index,
                        coordinate,
                        label,
                    });
                }
                // The registry is immutable and the category was checked above,
                // so every error here is a per-frame failure.
                Err(e) => {
                    log::warn!("analysis: skipping frame {}: {}", frame.index, e);
                }
            }
        }

        if observations.is_empty() {
            return Err(AnalysisError::NoObservations {
                source_name,
                category: category.to_string(),
                sampled_frames,
            });
        }

        log::info!(
            "analysis: {} of {} sampled frames classified ({} frames read)",
            observations.len(),
            sampled_frames,
            expected_index
        );

        Ok(AnalysisReport::aggregate(
            category,
            stride,
            total_frames,
            vocabulary,
            observations,
        ))
    }
}
