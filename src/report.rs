//! Analysis report.
//!
//! `AnalysisReport` is the only artifact of a video analysis run. It is a plain
//! value: serializable with serde, immutable once built, and renderable as a
//! GeoJSON `FeatureCollection` for map front-ends.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::classify::{Label, Vocabulary};
use crate::trajectory::Coordinate;

/// A sampled, successfully classified frame paired with its coordinate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampledObservation {
    pub frame_index: u64,
    pub coordinate: Coordinate,
    pub label: Label,
}

/// Geotags are reported exactly as observed.
pub type Geotag = SampledObservation;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub category: String,
    pub stride: u64,
    /// Frames the source declared (and trajectory length).
    pub total_frames: u64,
    /// Percentage per vocabulary label; unobserved labels are 0.0.
    pub summary: BTreeMap<Label, f64>,
    pub total_observations: u64,
    pub analyzed_frame_count: u64,
    /// Share of observations whose label is not graded intact.
    pub damage_percentage: f64,
    /// Observations whose label is graded critical.
    pub critical_frames: u64,
    /// Occurrences per observed label.
    pub counts: BTreeMap<Label, u64>,
    /// Observations in ascending frame order.
    pub geotags: Vec<Geotag>,
}

impl AnalysisReport {
    /// Aggregate observations. Callers reject empty observation lists first;
    /// with none, every percentage is 0.0.
    pub(crate) fn aggregate(
        category: &str,
        stride: u64,
        total_frames: u64,
        vocabulary: &Vocabulary,
        observations: Vec<SampledObservation>,
    ) -> Self {
        let mut counts: BTreeMap<Label, u64> = BTreeMap::new();
        for observation in &observations {
            *counts.entry(observation.label.clone()).or_insert(0) += 1;
        }
        let total_observations = observations.len() as u64;
        let damaged = observations
            .iter()
            .filter(|o| !vocabulary.is_intact(&o.label))
            .count() as u64;
        let critical_frames = observations
            .iter()
            .filter(|o| vocabulary.is_critical(&o.label))
            .count() as u64;

        let summary = vocabulary
            .iter()
            .map(|label| {
                let count = counts.get(label).copied().unwrap_or(0);
                (label.clone(), percentage(count, total_observations))
            })
            .collect();

        Self {
            category: category.to_string(),
            stride,
            total_frames,
            summary,
            total_observations,
            analyzed_frame_count: total_observations,
            damage_percentage: percentage(damaged, total_observations),
            critical_frames,
            counts,
            geotags: observations,
        }
    }

    /// Most frequent label. Ties resolve to the label that sorts first.
    pub fn dominant_label(&self) -> Option<&Label> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(label, _)| label)
    }

    /// Geotags as a GeoJSON `FeatureCollection` of points.
    ///
    /// Each feature carries `frame` and `damage` properties; positions are
    /// `[longitude, latitude]` per RFC 7946.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .geotags
            .iter()
            .map(|tag| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [tag.coordinate.longitude, tag.coordinate.latitude],
                    },
                    "properties": {
                        "frame": tag.frame_index,
                        "damage": tag.label,
                    },
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}
