use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use thiserror::Error;

use crate::config::{AnalyzerConfig, CategorySettings, STUB_MODEL};
use crate::frame::Frame;

use super::backend::ClassifierBackend;
use super::backends::StubBackend;
use super::label::{Label, Vocabulary};

/// Classification failures a caller can branch on.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The category has no registered model.
    #[error("unknown category '{category}' (known categories: {known:?})")]
    UnknownCategory { category: String, known: Vec<String> },
    /// The model could not produce a label for this input.
    #[error("classification failed for category '{category}': {reason}")]
    Classification { category: String, reason: String },
}

struct CategoryModel {
    backend: Arc<Mutex<dyn ClassifierBackend>>,
    vocabulary: Vocabulary,
}

/// Category -> (model handle, vocabulary) table.
///
/// Built once at startup and shared read-only (`Arc<ClassifierRegistry>`).
/// Backends are wrapped in `Mutex` because `ClassifierBackend::classify` takes
/// `&mut self`; concurrent analyses serialize per model invocation.
pub struct ClassifierRegistry {
    categories: HashMap<String, CategoryModel>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
        }
    }

    /// Build the registry described by the configuration.
    ///
    /// `stub://` models get the deterministic [`StubBackend`]; anything else is
    /// a local ONNX model path and needs the `backend-tract` feature.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self> {
        let mut registry = Self::new();
        let mut names: Vec<&String> = config.categories.keys().collect();
        names.sort();
        for name in names {
            let settings = &config.categories[name];
            let vocabulary = settings.vocabulary()?;
            if settings.model == STUB_MODEL {
                registry.register(name, vocabulary.clone(), StubBackend::new(vocabulary.len()))?;
            } else {
                register_model_file(&mut registry, name, vocabulary, settings)?;
            }
            log::info!("classifier: registered category '{}' ({})", name, settings.model);
        }
        Ok(registry)
    }

    /// Register a backend for a category, replacing any previous entry.
    ///
    /// The backend's warm-up hook runs here, so load failures surface at
    /// startup rather than on the first frame.
    pub fn register<B: ClassifierBackend + 'static>(
        &mut self,
        category: &str,
        vocabulary: Vocabulary,
        mut backend: B,
    ) -> Result<()> {
        if category.trim().is_empty() {
            return Err(anyhow!("category name must not be blank"));
        }
        backend.warm_up()?;
        if self
            .categories
            .insert(
                category.to_string(),
                CategoryModel {
                    backend: Arc::new(Mutex::new(backend)),
                    vocabulary,
                },
            )
            .is_some()
        {
            log::warn!("classifier: replaced model for category '{}'", category);
        }
        Ok(())
    }

    /// Registered category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.categories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Vocabulary of a category, or `UnknownCategory`.
    pub fn vocabulary(&self, category: &str) -> Result<&Vocabulary, ClassifyError> {
        self.model(category).map(|model| &model.vocabulary)
    }

    /// Classify a frame for a category.
    pub fn classify(&self, category: &str, frame: &Frame) -> Result<Label, ClassifyError> {
        self.classify_pixels(category, frame.pixels(), frame.width, frame.height)
    }

    /// Classify raw RGB24 pixels for a category.
    pub fn classify_pixels(
        &self,
        category: &str,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Label, ClassifyError> {
        let model = self.model(category)?;
        let failure = |reason: String| ClassifyError::Classification {
            category: category.to_string(),
            reason,
        };

        let scores = {
            let mut guard = model
                .backend
                .lock()
                .map_err(|_| failure("classifier lock poisoned".to_string()))?;
            guard
                .classify(pixels, width, height)
                .map_err(|e| failure(format!("{} backend: {:#}", guard.name(), e)))?
        };

        let index = argmax(&scores, model.vocabulary.len()).map_err(failure)?;
        model
            .vocabulary
            .label_for_index(index)
            .cloned()
            .ok_or_else(|| failure(format!("class index {} outside vocabulary", index)))
    }

    fn model(&self, category: &str) -> Result<&CategoryModel, ClassifyError> {
        self.categories
            .get(category)
            .ok_or_else(|| ClassifyError::UnknownCategory {
                category: category.to_string(),
                known: self.categories(),
            })
    }
}

impl Default for ClassifierRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the highest score. Ties resolve to the lowest index.
fn argmax(scores: &[f32], expected: usize) -> std::result::Result<usize, String> {
    if scores.len() != expected {
        return Err(format!(
            "model produced {} scores for {} labels",
            scores.len(),
            expected
        ));
    }
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            return Err(format!("model produced non-finite score at index {}", i));
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| "model produced no scores".to_string())
}

#[cfg(feature = "backend-tract")]
fn register_model_file(
    registry: &mut ClassifierRegistry,
    category: &str,
    vocabulary: Vocabulary,
    settings: &CategorySettings,
) -> Result<()> {
    let backend = super::backends::TractBackend::new(&settings.model, settings.input_size)?;
    registry.register(category, vocabulary, backend)
}

#[cfg(not(feature = "backend-tract"))]
fn register_model_file(
    _registry: &mut ClassifierRegistry,
    category: &str,
    _vocabulary: Vocabulary,
    settings: &CategorySettings,
) -> Result<()> {
    Err(anyhow!(
        "category '{}' uses model file {} which requires the backend-tract feature",
        category,
        settings.model
    ))
}
