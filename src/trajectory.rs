//! Simulated GPS trajectory.
//!
//! Videos carry no position data, so every analysis run synthesizes a path with
//! one coordinate per frame. The path is a random walk biased eastward: each
//! step adds a fixed drift plus a bounded uniform perturbation per axis, and the
//! perturbations compound from step to step.
//!
//! - `Coordinate`: a latitude/longitude value.
//! - `Geofence`: optional rectangular bounds every emitted coordinate is clamped into.
//! - `TrajectoryConfig`: start point, drift, jitter and geofence.
//! - `Trajectory`: the generated path, indexed by frame.
//!
//! Randomness is injected, so a seeded RNG reproduces a trajectory exactly.

use anyhow::{anyhow, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_START_LATITUDE: f64 = 35.6895;
pub const DEFAULT_START_LONGITUDE: f64 = 139.6917;
pub const DEFAULT_LATITUDE_STEP: f64 = 0.00001;
pub const DEFAULT_LONGITUDE_STEP: f64 = 0.00005;
pub const DEFAULT_JITTER: f64 = 0.00001;

// ----------------------------------------------------------------------------
// Coordinate / Geofence
// ----------------------------------------------------------------------------

/// A point on the map, in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Rectangular latitude/longitude bounds (inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Geofence {
    pub fn validate(&self) -> Result<()> {
        let bounds = [
            self.min_latitude,
            self.max_latitude,
            self.min_longitude,
            self.max_longitude,
        ];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("geofence bounds must be finite"));
        }
        if self.min_latitude > self.max_latitude {
            return Err(anyhow!(
                "geofence min_latitude {} exceeds max_latitude {}",
                self.min_latitude,
                self.max_latitude
            ));
        }
        if self.min_longitude > self.max_longitude {
            return Err(anyhow!(
                "geofence min_longitude {} exceeds max_longitude {}",
                self.min_longitude,
                self.max_longitude
            ));
        }
        Ok(())
    }

    /// Clamp a coordinate into the fence. Bounds must already be validated.
    pub fn clamp(&self, coordinate: Coordinate) -> Coordinate {
        Coordinate {
            latitude: coordinate
                .latitude
                .clamp(self.min_latitude, self.max_latitude),
            longitude: coordinate
                .longitude
                .clamp(self.min_longitude, self.max_longitude),
        }
    }

    pub fn contains(&self, coordinate: Coordinate) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&coordinate.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&coordinate.longitude)
    }
}

// ----------------------------------------------------------------------------
// TrajectoryConfig
// ----------------------------------------------------------------------------

/// Parameters of the simulated random walk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    pub start: Coordinate,
    /// Fixed latitude drift per frame.
    pub latitude_step: f64,
    /// Fixed longitude drift per frame (eastward travel).
    pub longitude_step: f64,
    /// Half-width of the uniform latitude perturbation.
    pub latitude_jitter: f64,
    /// Half-width of the uniform longitude perturbation.
    pub longitude_jitter: f64,
    pub geofence: Option<Geofence>,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            start: Coordinate::new(DEFAULT_START_LATITUDE, DEFAULT_START_LONGITUDE),
            latitude_step: DEFAULT_LATITUDE_STEP,
            longitude_step: DEFAULT_LONGITUDE_STEP,
            latitude_jitter: DEFAULT_JITTER,
            longitude_jitter: DEFAULT_JITTER,
            geofence: None,
        }
    }
}

impl TrajectoryConfig {
    pub fn validate(&self) -> Result<()> {
        let finite = [
            self.start.latitude,
            self.start.longitude,
            self.latitude_step,
            self.longitude_step,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("trajectory start and steps must be finite"));
        }
        for (name, jitter) in [
            ("latitude_jitter", self.latitude_jitter),
            ("longitude_jitter", self.longitude_jitter),
        ] {
            if !jitter.is_finite() || jitter < 0.0 {
                return Err(anyhow!("{} must be a finite, non-negative number", name));
            }
        }
        if let Some(fence) = &self.geofence {
            fence.validate()?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Trajectory
// ----------------------------------------------------------------------------

/// One simulated coordinate per video frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    points: Vec<Coordinate>,
}

impl Trajectory {
    /// Coordinate for a frame index, if the index is inside the trajectory.
    pub fn get(&self, frame_index: u64) -> Option<Coordinate> {
        usize::try_from(frame_index)
            .ok()
            .and_then(|i| self.points.get(i))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }
}

/// Generate a trajectory of exactly `num_frames` coordinates.
///
/// The cursor starts at `config.start`; every step moves it by the configured
/// drift plus an independent uniform draw per axis, then clamps into the
/// geofence when one is set. The clamped point becomes the next cursor.
///
/// `config` is expected to pass [`TrajectoryConfig::validate`]; callers bound
/// `num_frames`, the whole walk is held in memory.
pub fn generate<R: Rng + ?Sized>(
    num_frames: u64,
    config: &TrajectoryConfig,
    rng: &mut R,
) -> Trajectory {
    let mut points = Vec::new();
    let mut cursor = config.start;

    for _ in 0..num_frames {
        let mut next = Coordinate {
            latitude: cursor.latitude
                + config.latitude_step
                + perturbation(rng, config.latitude_jitter),
            longitude: cursor.longitude
                + config.longitude_step
                + perturbation(rng, config.longitude_jitter),
        };
        if let Some(fence) = &config.geofence {
            next = fence.clamp(next);
        }
        points.push(next);
        cursor = next;
    }

    Trajectory { points }
}

fn perturbation<R: Rng + ?Sized>(rng: &mut R, jitter: f64) -> f64 {
    if jitter > 0.0 {
        rng.gen_range(-jitter..=jitter)
    } else {
        0.0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
