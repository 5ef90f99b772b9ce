//! Artifact manifest
//!
//! Names the files of an artifact directory and the ordered model list.
//! Without a `manifest.json` the reference five-model layout is assumed.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::error::ArtifactLoadError;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Number of models in the reference ensemble
pub const REFERENCE_MODEL_COUNT: usize = 5;

/// Serialized model kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    #[default]
    Onnx,
    Logistic,
}

/// One classifier in registration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub format: ModelFormat,
    /// Hex SHA-256 of the model file, verified before loading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    #[serde(default = "default_weights")]
    pub weights: PathBuf,
    #[serde(default = "default_normalizer")]
    pub normalizer: PathBuf,
    #[serde(default = "default_selected")]
    pub selected_features: PathBuf,
    #[serde(default = "default_models")]
    pub models: Vec<ModelEntry>,
}

fn default_weights() -> PathBuf {
    PathBuf::from("feature_weights.json")
}

fn default_normalizer() -> PathBuf {
    PathBuf::from("normalizer.json")
}

fn default_selected() -> PathBuf {
    PathBuf::from("selected_features.json")
}

fn default_models() -> Vec<ModelEntry> {
    (1..=REFERENCE_MODEL_COUNT)
        .map(|i| ModelEntry {
            name: format!("Model {}", i),
            path: PathBuf::from(format!("model_{}.onnx", i)),
            format: ModelFormat::Onnx,
            sha256: None,
        })
        .collect()
}

impl Default for ArtifactManifest {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            normalizer: default_normalizer(),
            selected_features: default_selected(),
            models: default_models(),
        }
    }
}

impl ArtifactManifest {
    /// Read `manifest.json` from `dir`, or fall back to the reference layout
    pub fn load(dir: &Path) -> Result<Self, ArtifactLoadError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            log::info!("No {} in {:?}, using reference layout", MANIFEST_FILE, dir);
            return Ok(Self::default());
        }
        super::read_json(&path)
    }
}

// ============================================================================
// CHECKSUM
// ============================================================================

/// Hex SHA-256 of a file
pub fn file_sha256(path: &Path) -> Result<String, ArtifactLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Verify a file against an expected hex digest (case-insensitive)
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), ArtifactLoadError> {
    let actual = file_sha256(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(ArtifactLoadError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}
