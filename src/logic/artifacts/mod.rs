//! Artifact Store
//!
//! Loads the weight table, the fitted normalizer, the selected feature
//! list and the classifier ensemble, in that order. Loading is all or
//! nothing; after it succeeds the store is immutable and shared via `Arc`.

pub mod manifest;
pub mod normalizer;
pub mod weights;


use std::collections::HashSet;
use std::path::Path;
use serde::de::DeserializeOwned;

use crate::logic::error::ArtifactLoadError;
use crate::logic::model::{LogisticModel, Model, OnnxModel, RegisteredModel};

pub use manifest::{ArtifactManifest, ModelEntry, ModelFormat};
pub use normalizer::FittedNormalizer;
pub use weights::WeightTable;

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug)]
pub struct ArtifactStore {
    weights: WeightTable,
    normalizer: FittedNormalizer,
    selected_features: Vec<String>,
    models: Vec<RegisteredModel>,
}

impl ArtifactStore {
    /// Load every artifact from `dir`. Fails fast on the first problem.
    pub fn load(dir: &Path) -> Result<Self, ArtifactLoadError> {
        log::info!("Loading detection artifacts from {:?}", dir);

        if !dir.is_dir() {
            return Err(ArtifactLoadError::Missing(dir.to_path_buf()));
        }

        let manifest = ArtifactManifest::load(dir)?;

        let pairs: Vec<(String, f64)> = read_json(&dir.join(&manifest.weights))?;
        let weights = WeightTable::new(pairs)?;

        let normalizer: FittedNormalizer = read_json(&dir.join(&manifest.normalizer))?;
        let selected_features: Vec<String> = read_json(&dir.join(&manifest.selected_features))?;

        let mut models = Vec::with_capacity(manifest.models.len());
        for entry in &manifest.models {
            models.push(load_model(dir, entry)?);
        }

        let store = Self::from_parts(weights, normalizer, selected_features, models)?;
        log::info!(
            "Artifacts loaded: {} weighted features, {} selected features, {} models",
            store.weights.len(),
            store.selected_features.len(),
            store.models.len()
        );
        Ok(store)
    }

    /// Assemble a store from in-memory parts, with the same structural checks as `load`
    pub fn from_parts(
        weights: WeightTable,
        normalizer: FittedNormalizer,
        selected_features: Vec<String>,
        models: Vec<RegisteredModel>,
    ) -> Result<Self, ArtifactLoadError> {
        normalizer.validate()?;

        if weights.len() != normalizer.dimension() {
            return Err(ArtifactLoadError::DimensionMismatch {
                what: "weight table vs normalizer".to_string(),
                expected: normalizer.dimension(),
                got: weights.len(),
            });
        }

        if selected_features.is_empty() {
            return Err(ArtifactLoadError::Invalid("selected feature list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = selected_features.iter().find(|f| !seen.insert(f.as_str())) {
            return Err(ArtifactLoadError::Invalid(format!("duplicate selected feature: {}", dup)));
        }

        if models.is_empty() {
            return Err(ArtifactLoadError::NoModels);
        }
        let mut names = HashSet::new();
        for entry in &models {
            if !names.insert(entry.name()) {
                return Err(ArtifactLoadError::Invalid(format!(
                    "duplicate model name: {}", entry.name()
                )));
            }
            if let Some(dim) = entry.model().input_dimension() {
                if dim != selected_features.len() {
                    return Err(ArtifactLoadError::DimensionMismatch {
                        what: format!("model '{}' input", entry.name()),
                        expected: selected_features.len(),
                        got: dim,
                    });
                }
            }
        }

        Ok(Self { weights, normalizer, selected_features, models })
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn normalizer(&self) -> &FittedNormalizer {
        &self.normalizer
    }

    pub fn selected_features(&self) -> &[String] {
        &self.selected_features
    }

    /// Models in registration order
    pub fn models(&self) -> &[RegisteredModel] {
        &self.models
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn load_model(dir: &Path, entry: &ModelEntry) -> Result<RegisteredModel, ArtifactLoadError> {
    let path = dir.join(&entry.path);
    if !path.exists() {
        return Err(ArtifactLoadError::Missing(path));
    }

    if let Some(expected) = &entry.sha256 {
        manifest::verify_checksum(&path, expected)?;
        log::debug!("Checksum verified for '{}'", entry.name);
    }

    let model: Box<dyn Model> = match entry.format {
        ModelFormat::Onnx => Box::new(OnnxModel::load(&entry.name, &path)?),
        ModelFormat::Logistic => Box::new(LogisticModel::load(&entry.name, &path)?),
    };

    Ok(RegisteredModel::from_boxed(entry.name.clone(), model))
}

/// Read and parse a JSON artifact
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactLoadError> {
    if !path.exists() {
        return Err(ArtifactLoadError::Missing(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ArtifactLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
