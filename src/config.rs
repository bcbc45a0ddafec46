use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::classify::Vocabulary;
use crate::trajectory::{
    Coordinate, Geofence, TrajectoryConfig, DEFAULT_JITTER, DEFAULT_LATITUDE_STEP,
    DEFAULT_LONGITUDE_STEP, DEFAULT_START_LATITUDE, DEFAULT_START_LONGITUDE,
};

/// Model path that selects the deterministic stub backend.
pub const STUB_MODEL: &str = "stub://";
/// Frames between two classified frames.
pub const DEFAULT_STRIDE: u64 = 5;
/// Largest frame count a source may declare before it is refused.
pub const DEFAULT_MAX_FRAMES: u64 = 10_000_000;

const DEFAULT_CATEGORY: &str = "Road";
const DEFAULT_ROAD_LABELS: [&str; 4] = ["good", "poor", "satisfactory", "very poor"];
const DEFAULT_ROAD_INTACT: [&str; 1] = ["good"];
const DEFAULT_ROAD_CRITICAL: [&str; 1] = ["very poor"];
const DEFAULT_INPUT_SIZE: u32 = 128;

#[derive(Debug, Deserialize, Default)]
struct AnalyzerConfigFile {
    default_category: Option<String>,
    stride: Option<u64>,
    seed: Option<u64>,
    max_frames: Option<u64>,
    categories: Option<BTreeMap<String, CategoryConfigFile>>,
    trajectory: Option<TrajectoryConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CategoryConfigFile {
    labels: Option<Vec<String>>,
    model: Option<String>,
    input_size: Option<u32>,
    intact_labels: Option<Vec<String>>,
    critical_labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct TrajectoryConfigFile {
    start_latitude: Option<f64>,
    start_longitude: Option<f64>,
    latitude_step: Option<f64>,
    longitude_step: Option<f64>,
    latitude_jitter: Option<f64>,
    longitude_jitter: Option<f64>,
    geofence: Option<Geofence>,
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub default_category: String,
    pub stride: u64,
    /// Seed for the trajectory RNG. `None` draws from the OS.
    pub seed: Option<u64>,
    /// Sources declaring more frames than this are refused before reading.
    pub max_frames: u64,
    pub categories: BTreeMap<String, CategorySettings>,
    pub trajectory: TrajectoryConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorySettings {
    /// Labels in model output order.
    pub labels: Vec<String>,
    /// `stub://` or a local ONNX model path.
    pub model: String,
    /// Square input edge length the model expects.
    pub input_size: u32,
    /// Labels that do not count toward `damage_percentage`.
    pub intact_labels: Vec<String>,
    /// Labels counted in `critical_frames`.
    pub critical_labels: Vec<String>,
}

impl CategorySettings {
    /// The graded label vocabulary these settings describe.
    pub fn vocabulary(&self) -> Result<Vocabulary> {
        Vocabulary::new(self.labels.iter().cloned())?
            .with_grades(self.intact_labels.iter().cloned(), self.critical_labels.iter().cloned())
    }
}

impl AnalyzerConfig {
    /// Load from the file named by `ROADSCAN_CONFIG` (if set), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROADSCAN_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (JSON, or TOML for `.toml` paths), then apply
    /// environment overrides and validate.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AnalyzerConfigFile) -> Self {
        let default_category = file
            .default_category
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let categories = match file.categories {
            Some(categories) => categories
                .into_iter()
                .map(|(name, category)| {
                    let settings = category_settings(&name, category);
                    (name, settings)
                })
                .collect(),
            None => BTreeMap::from([(
                DEFAULT_CATEGORY.to_string(),
                category_settings(DEFAULT_CATEGORY, CategoryConfigFile::default()),
            )]),
        };
        let trajectory = file.trajectory.unwrap_or_default();
        let trajectory = TrajectoryConfig {
            start: Coordinate::new(
                trajectory.start_latitude.unwrap_or(DEFAULT_START_LATITUDE),
                trajectory.start_longitude.unwrap_or(DEFAULT_START_LONGITUDE),
            ),
            latitude_step: trajectory.latitude_step.unwrap_or(DEFAULT_LATITUDE_STEP),
            longitude_step: trajectory.longitude_step.unwrap_or(DEFAULT_LONGITUDE_STEP),
            latitude_jitter: trajectory.latitude_jitter.unwrap_or(DEFAULT_JITTER),
            longitude_jitter: trajectory.longitude_jitter.unwrap_or(DEFAULT_JITTER),
            geofence: trajectory.geofence,
        };
        Self {
            default_category,
            stride: file.stride.unwrap_or(DEFAULT_STRIDE),
            seed: file.seed,
            max_frames: file.max_frames.unwrap_or(DEFAULT_MAX_FRAMES),
            categories,
            trajectory,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(category) = std::env::var("ROADSCAN_CATEGORY") {
            if !category.trim().is_empty() {
                self.default_category = category.trim().to_string();
            }
        }
        if let Ok(stride) = std::env::var("ROADSCAN_STRIDE") {
            self.stride = stride
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROADSCAN_STRIDE must be a positive integer"))?;
        }
        if let Ok(seed) = std::env::var("ROADSCAN_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROADSCAN_SEED must be an unsigned integer"))?;
            self.seed = Some(seed);
        }
        if let Ok(max_frames) = std::env::var("ROADSCAN_MAX_FRAMES") {
            self.max_frames = max_frames
                .trim()
                .parse()
                .map_err(|_| anyhow!("ROADSCAN_MAX_FRAMES must be a positive integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(anyhow!("stride must be greater than zero"));
        }
        if self.max_frames == 0 {
            return Err(anyhow!("max_frames must be greater than zero"));
        }
        if !self.categories.contains_key(&self.default_category) {
            return Err(anyhow!(
                "default category '{}' is not configured (configured: {:?})",
                self.default_category,
                self.categories.keys().collect::<Vec<_>>()
            ));
        }
        for (name, category) in &self.categories {
            category
                .vocabulary()
                .map_err(|e| anyhow!("category '{}': {}", name, e))?;
            if category.model.trim().is_empty() {
                return Err(anyhow!("category '{}': model must not be empty", name));
            }
            if category.input_size == 0 {
                return Err(anyhow!("category '{}': input_size must be greater than zero", name));
            }
        }
        self.trajectory.validate()
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self::from_file(AnalyzerConfigFile::default())
    }
}

fn category_settings(name: &str, file: CategoryConfigFile) -> CategorySettings {
    let is_road = name == DEFAULT_CATEGORY;
    let labels: Vec<String> = file.labels.unwrap_or_else(|| {
        if is_road {
            DEFAULT_ROAD_LABELS.iter().map(|l| l.to_string()).collect()
        } else {
            Vec::new()
        }
    });
    // Road grades default only for the labels the category actually has.
    let graded = |road: &[&str]| -> Vec<String> {
        if !is_road {
            return Vec::new();
        }
        road.iter()
            .filter(|l| labels.iter().any(|label| label.as_str() == **l))
            .map(|l| l.to_string())
            .collect()
    };
    let intact_labels = file
        .intact_labels
        .unwrap_or_else(|| graded(&DEFAULT_ROAD_INTACT));
    let critical_labels = file
        .critical_labels
        .unwrap_or_else(|| graded(&DEFAULT_ROAD_CRITICAL));
    CategorySettings {
        labels,
        model: file.model.unwrap_or_else(|| STUB_MODEL.to_string()),
        input_size: file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        intact_labels,
        critical_labels,
    }
}

fn read_config_file(path: &Path) -> Result<AnalyzerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
