//! End-to-end tests for the video analysis pipeline.
//!
//! Frames are 1x1 RGB pictures whose bytes all equal the frame index, so test
//! backends can decide per frame what to return.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use roadscan::trajectory;
use roadscan::{
    AnalysisError, AnalyzerConfig, ClassifierBackend, ClassifierRegistry, FileConfig, FileSource,
    Frame, FrameSource, Label, MemorySource, TrajectoryConfig, VideoAnalyzer, Vocabulary,
};

const ROAD_LABELS: [&str; 4] = ["good", "poor", "satisfactory", "very poor"];

// ----------------------------------------------------------------------------
// Test backends
// ----------------------------------------------------------------------------

/// Always scores the same class highest.
struct FixedClass(usize);

impl ClassifierBackend for FixedClass {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn classify(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<f32>> {
        Ok(one_hot(self.0))
    }
}

/// Picks class `frame_index % 4`.
struct ByFrameIndex;

impl ClassifierBackend for ByFrameIndex {
    fn name(&self) -> &'static str {
        "by-index"
    }

    fn classify(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<f32>> {
        Ok(one_hot(pixels[0] as usize % 4))
    }
}

/// Fails on the listed frame indices, otherwise scores class 0.
struct FailOn(Vec<u8>);

impl ClassifierBackend for FailOn {
    fn name(&self) -> &'static str {
        "fail-on"
    }

    fn classify(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<f32>> {
        if self.0.contains(&pixels[0]) {
            Err(anyhow!("malformed frame"))
        } else {
            Ok(one_hot(0))
        }
    }
}

fn one_hot(index: usize) -> Vec<f32> {
    let mut scores = vec![0.0; ROAD_LABELS.len()];
    scores[index] = 1.0;
    scores
}

// ----------------------------------------------------------------------------
// Test sources
// ----------------------------------------------------------------------------

/// Wraps a `MemorySource` and records lifecycle calls.
struct TrackingSource {
    inner: MemorySource,
    connect_fails: bool,
    fail_at: Option<u64>,
    extra_frames: Vec<Frame>,
    connects: u32,
    closes: u32,
    reads: u64,
}

impl TrackingSource {
    fn new(frames: u64) -> Self {
        Self {
            inner: MemorySource::new("clip", make_frames(frames)),
            connect_fails: false,
            fail_at: None,
            extra_frames: Vec::new(),
            connects: 0,
            closes: 0,
            reads: 0,
        }
    }
}

impl FrameSource for TrackingSource {
    fn describe(&self) -> String {
        "tracking://clip".to_string()
    }

    fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        if self.connect_fails {
            return Err(anyhow!("no such file"));
        }
        self.inner.connect()
    }

    fn total_frame_count(&self) -> u64 {
        self.inner.total_frame_count()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.reads) {
            return Err(anyhow!("corrupt packet"));
        }
        self.reads += 1;
        match self.inner.next_frame()? {
            Some(frame) => Ok(Some(frame)),
            None if !self.extra_frames.is_empty() => Ok(Some(self.extra_frames.remove(0))),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closes += 1;
        self.inner.close();
    }
}

/// Counts every draw so tests can tell whether a trajectory was generated.
struct CountingRng {
    inner: StdRng,
    draws: u64,
}

impl RngCore for CountingRng {
    fn next_u32(&mut self) -> u32 {
        self.draws += 1;
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws += 1;
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws += 1;
        self.inner.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws += 1;
        self.inner.try_fill_bytes(dest)
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn make_frames(n: u64) -> Vec<Frame> {
    (0..n)
        .map(|i| Frame::new(i, vec![i as u8; 3], 1, 1).expect("frame"))
        .collect()
}

fn analyzer_with<B: ClassifierBackend + 'static>(backend: B) -> VideoAnalyzer {
    let mut registry = ClassifierRegistry::new();
    registry
        .register("Road", Vocabulary::new(ROAD_LABELS).expect("vocabulary"), backend)
        .expect("register");
    VideoAnalyzer::new(Arc::new(registry), TrajectoryConfig::default()).expect("analyzer")
}

fn label(name: &str) -> Label {
    Label::from(name)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[test]
fn samples_every_fifth_frame_and_backfills_summary() {
    let analyzer = analyzer_with(FixedClass(1));
    let mut source = TrackingSource::new(20);

    let report = analyzer
        .analyze_with_rng(&mut source, "Road", 5, &mut StdRng::seed_from_u64(9))
        .expect("report");

    assert_eq!(report.analyzed_frame_count, 4);
    assert_eq!(report.total_observations, 4);
    assert_eq!(report.total_frames, 20);
    assert_eq!(report.counts, BTreeMap::from([(label("poor"), 4)]));
    assert_eq!(
        report.summary,
        BTreeMap::from([
            (label("good"), 0.0),
            (label("poor"), 100.0),
            (label("satisfactory"), 0.0),
            (label("very poor"), 0.0),
        ])
    );
    let indices: Vec<u64> = report.geotags.iter().map(|g| g.frame_index).collect();
    assert_eq!(indices, vec![0, 5, 10, 15]);

    // Geotags take the trajectory coordinate at the same frame index.
    let expected =
        trajectory::generate(20, &TrajectoryConfig::default(), &mut StdRng::seed_from_u64(9));
    for tag in &report.geotags {
        assert_eq!(Some(tag.coordinate), expected.get(tag.frame_index));
    }

    assert_eq!(source.closes, 1);
}

#[test]
fn counts_geotags_and_observations_agree() {
    let analyzer = analyzer_with(ByFrameIndex);
    let mut source = TrackingSource::new(37);

    let report = analyzer
        .analyze_with_rng(&mut source, "Road", 3, &mut StdRng::seed_from_u64(1))
        .expect("report");

    let total: u64 = report.counts.values().sum();
    assert_eq!(total, report.total_observations);
    assert_eq!(report.geotags.len() as u64, report.total_observations);
    assert_eq!(report.total_observations, 13);

    let percent: f64 = report.summary.values().sum();
    assert!((percent - 100.0).abs() < 1e-9, "summary sums to {}", percent);
    assert_eq!(report.summary.len(), 4);
}

#[test]
fn every_classification_failing_is_no_observations() {
    let analyzer = analyzer_with(FailOn((0..=255).collect()));
    let mut source = TrackingSource::new(12);

    let err = analyzer
        .analyze(&mut source, "Road", 5)
        .expect_err("no observations");

    match &err {
        AnalysisError::NoObservations {
            category,
            sampled_frames,
            ..
        } => {
            assert_eq!(category, "Road");
            assert_eq!(*sampled_frames, 3);
        }
        other => panic!("expected NoObservations, got {:?}", other),
    }
    assert!(!err.is_client_error());
    assert_eq!(source.closes, 1);
}

#[test]
fn failed_frames_are_skipped_not_fatal() {
    let analyzer = analyzer_with(FailOn(vec![5]));
    let mut source = TrackingSource::new(20);

    let report = analyzer.analyze(&mut source, "Road", 5).expect("report");

    let indices: Vec<u64> = report.geotags.iter().map(|g| g.frame_index).collect();
    assert_eq!(indices, vec![0, 10, 15]);
    assert_eq!(report.counts, BTreeMap::from([(label("good"), 3)]));
}

#[test]
fn unavailable_source_fails_before_trajectory() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(20);
    source.connect_fails = true;
    let mut rng = CountingRng {
        inner: StdRng::seed_from_u64(0),
        draws: 0,
    };

    let err = analyzer
        .analyze_with_rng(&mut source, "Road", 5, &mut rng)
        .expect_err("source unavailable");

    match &err {
        AnalysisError::SourceUnavailable {
            source_name,
            reason,
        } => {
            assert_eq!(source_name, "tracking://clip");
            assert!(reason.contains("no such file"));
        }
        other => panic!("expected SourceUnavailable, got {:?}", other),
    }
    assert!(err.is_client_error());
    assert_eq!(rng.draws, 0);
    assert_eq!(source.reads, 0);
}

#[test]
fn unknown_category_is_rejected_before_opening_source() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(20);

    let err = analyzer
        .analyze(&mut source, "Bridge", 5)
        .expect_err("unknown category");

    match err {
        AnalysisError::UnknownCategory { category, known } => {
            assert_eq!(category, "Bridge");
            assert_eq!(known, vec!["Road".to_string()]);
        }
        other => panic!("expected UnknownCategory, got {:?}", other),
    }
    assert_eq!(source.connects, 0);
}

#[test]
fn zero_stride_is_rejected() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(5);
    assert!(matches!(
        analyzer.analyze(&mut source, "Road", 0),
        Err(AnalysisError::InvalidStride { stride: 0 })
    ));
    assert_eq!(source.connects, 0);
}

#[test]
fn mid_stream_error_closes_source() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(20);
    source.fail_at = Some(7);

    let err = analyzer
        .analyze(&mut source, "Road", 5)
        .expect_err("read failure");

    match err {
        AnalysisError::SourceRead { frame_index, .. } => assert_eq!(frame_index, 7),
        other => panic!("expected SourceRead, got {:?}", other),
    }
    assert_eq!(source.closes, 1);
}

#[test]
fn trajectory_follows_declared_total_not_frames_read() {
    let analyzer = analyzer_with(FixedClass(2));
    let mut source = TrackingSource::new(8);
    source.inner = MemorySource::new("short", make_frames(8)).with_declared_total(30);

    let report = analyzer
        .analyze_with_rng(&mut source, "Road", 5, &mut StdRng::seed_from_u64(4))
        .expect("report");

    assert_eq!(report.total_frames, 30);
    let indices: Vec<u64> = report.geotags.iter().map(|g| g.frame_index).collect();
    assert_eq!(indices, vec![0, 5]);

    let expected =
        trajectory::generate(30, &TrajectoryConfig::default(), &mut StdRng::seed_from_u64(4));
    assert_eq!(Some(report.geotags[1].coordinate), expected.get(5));
}

#[test]
fn frames_past_declared_total_are_rejected() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(3);
    source.extra_frames = vec![Frame::new(3, vec![3; 3], 1, 1).expect("frame")];

    let err = analyzer
        .analyze(&mut source, "Road", 1)
        .expect_err("frame past declared total");
    assert!(matches!(err, AnalysisError::SourceRead { frame_index: 3, .. }));
    assert_eq!(source.closes, 1);
}

#[test]
fn declared_total_over_limit_is_source_unavailable() {
    let analyzer = analyzer_with(FixedClass(0)).with_max_frames(1_000);
    let mut source = TrackingSource::new(3);
    source.inner = MemorySource::new("huge", make_frames(3)).with_declared_total(1_001);
    let mut rng = CountingRng {
        inner: StdRng::seed_from_u64(0),
        draws: 0,
    };

    let err = analyzer
        .analyze_with_rng(&mut source, "Road", 5, &mut rng)
        .expect_err("declared total over limit");

    match &err {
        AnalysisError::SourceUnavailable { reason, .. } => {
            assert!(reason.contains("1001"), "reason: {}", reason);
        }
        other => panic!("expected SourceUnavailable, got {:?}", other),
    }
    assert!(err.is_client_error());
    assert_eq!(rng.draws, 0);
    assert_eq!(source.reads, 0);
    assert_eq!(source.closes, 1);
}

#[test]
fn synthetic_source_with_absurd_frame_count_is_refused() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = FileSource::new(FileConfig {
        path: "stub://x?frames=18446744073709551615&width=1&height=1".to_string(),
    })
    .expect("source");

    assert!(matches!(
        analyzer.analyze(&mut source, "Road", 5),
        Err(AnalysisError::SourceUnavailable { .. })
    ));
    assert_eq!(source.frames_read(), 0);
}

#[test]
fn readable_frames_with_zero_declared_total_are_rejected() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(4);
    source.inner = MemorySource::new("unsized", make_frames(4)).with_declared_total(0);

    let err = analyzer
        .analyze(&mut source, "Road", 1)
        .expect_err("frames beyond a zero declared total");
    assert!(matches!(err, AnalysisError::SourceRead { frame_index: 0, .. }));
    assert_eq!(source.closes, 1);
}

#[test]
fn empty_video_is_no_observations() {
    let analyzer = analyzer_with(FixedClass(0));
    let mut source = TrackingSource::new(0);
    assert!(matches!(
        analyzer.analyze(&mut source, "Road", 1),
        Err(AnalysisError::NoObservations {
            sampled_frames: 0,
            ..
        })
    ));
}

#[test]
fn seeded_runs_are_reproducible() {
    let analyzer = analyzer_with(ByFrameIndex).with_seed(Some(2024));

    let first = analyzer
        .analyze(&mut TrackingSource::new(50), "Road", 5)
        .expect("first");
    let second = analyzer
        .analyze(&mut TrackingSource::new(50), "Road", 5)
        .expect("second");

    assert_eq!(first, second);
}

#[test]
fn unseeded_runs_agree_on_counts() {
    let analyzer = analyzer_with(ByFrameIndex);

    let first = analyzer
        .analyze(&mut TrackingSource::new(50), "Road", 5)
        .expect("first");
    let second = analyzer
        .analyze(&mut TrackingSource::new(50), "Road", 5)
        .expect("second");

    assert_eq!(first.counts, second.counts);
    assert_eq!(first.summary, second.summary);
}

#[test]
fn concurrent_analyses_share_one_registry() {
    let analyzer = analyzer_with(ByFrameIndex).with_seed(Some(5));

    let reports: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let analyzer = &analyzer;
                scope.spawn(move || {
                    let mut source = MemorySource::new("clip", make_frames(40));
                    analyzer.analyze(&mut source, "Road", 2).expect("report")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect()
    });

    for report in &reports[1..] {
        assert_eq!(report, &reports[0]);
    }
}

#[test]
fn synthetic_file_source_end_to_end() {
    let config = AnalyzerConfig::default();
    let registry = Arc::new(ClassifierRegistry::from_config(&config).expect("registry"));
    let analyzer = VideoAnalyzer::from_config(&config, registry)
        .expect("analyzer")
        .with_seed(Some(7));
    let mut source = FileSource::new(FileConfig {
        path: "stub://survey?frames=60&width=16&height=12".to_string(),
    })
    .expect("source");

    let report = analyzer
        .analyze(&mut source, "Road", config.stride)
        .expect("report");

    assert_eq!(report.total_frames, 60);
    assert_eq!(report.analyzed_frame_count, 12);
    assert_eq!(report.to_geojson()["features"].as_array().map(Vec::len), Some(12));
    let vocabulary = analyzer.classifier().vocabulary("Road").expect("vocabulary");
    assert!(report.counts.keys().all(|l| vocabulary.contains(l)));

    let good = report.counts.get(&label("good")).copied().unwrap_or(0);
    let very_poor = report.counts.get(&label("very poor")).copied().unwrap_or(0);
    assert!((report.damage_percentage - 100.0 * (12 - good) as f64 / 12.0).abs() < 1e-9);
    assert_eq!(report.critical_frames, very_poor);
}
