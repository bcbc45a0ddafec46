//! roadscan
//!
//! Road surface condition analysis for still images and survey videos.
//!
//! # Architecture
//!
//! A video analysis run flows through four pieces:
//!
//! 1. **Ingestion** (`ingest`): a `FrameSource` declares its frame count and
//!    yields decoded RGB frames in index order.
//! 2. **Trajectory** (`trajectory`): a simulated GPS path with one coordinate
//!    per frame, generated before the first frame is read.
//! 3. **Classification** (`classify`): a registry mapping each category to a
//!    model backend and its label vocabulary, shared read-only across runs.
//! 4. **Analysis** (`analysis`): samples every `stride`-th frame, classifies
//!    it, pairs it with its coordinate and aggregates an `AnalysisReport`.
//!
//! # Module Structure
//!
//! - `frame`: decoded frame container
//! - `ingest`: frame sources (local files, synthetic `stub://`, in-memory)
//! - `classify`: backends, registry, labels
//! - `trajectory`: coordinates, geofence, random-walk generator
//! - `analysis`: the pipeline and its error taxonomy
//! - `report`: report value and GeoJSON export
//! - `still`: single image classification
//! - `config`: file + environment configuration

pub mod analysis;
pub mod classify;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod report;
pub mod still;
pub mod trajectory;

pub use analysis::{AnalysisError, VideoAnalyzer};
pub use classify::{ClassifierBackend, ClassifierRegistry, ClassifyError, Label, StubBackend, Vocabulary};
#[cfg(feature = "backend-tract")]
pub use classify::TractBackend;
pub use config::{AnalyzerConfig, CategorySettings, DEFAULT_STRIDE};
pub use frame::Frame;
pub use ingest::{FileConfig, FileSource, FrameSource, MemorySource};
pub use report::{AnalysisReport, Geotag, SampledObservation};
pub use still::{classify_image_bytes, classify_image_file};
pub use trajectory::{Coordinate, Geofence, Trajectory, TrajectoryConfig};
