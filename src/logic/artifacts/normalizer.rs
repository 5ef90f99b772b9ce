//! Fitted normalizer
//!
//! Parameters come from training and are frozen at load time.
//! Shared read-only by every loop iteration and batch caller.

use serde::{Deserialize, Serialize};

use crate::logic::error::{ArtifactLoadError, TransformError};

/// Normalization parameters from training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedNormalizer {
    /// `(x - min) / (max - min)`
    MinMax { min: Vec<f64>, max: Vec<f64> },
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// Pass-through of a fixed width
    Identity { dimension: usize },
}

impl FittedNormalizer {
    /// Number of columns the normalizer was fitted on
    pub fn dimension(&self) -> usize {
        match self {
            FittedNormalizer::MinMax { min, .. } => min.len(),
            FittedNormalizer::Standard { mean, .. } => mean.len(),
            FittedNormalizer::Identity { dimension } => *dimension,
        }
    }

    /// Check the fitted parameters are self-consistent
    pub fn validate(&self) -> Result<(), ArtifactLoadError> {
        let (a, b, what) = match self {
            FittedNormalizer::MinMax { min, max } => (min, max, "min_max normalizer"),
            FittedNormalizer::Standard { mean, scale } => (mean, scale, "standard normalizer"),
            FittedNormalizer::Identity { dimension } => {
                if *dimension == 0 {
                    return Err(ArtifactLoadError::Invalid(
                        "identity normalizer has zero dimension".to_string(),
                    ));
                }
                return Ok(());
            }
        };

        if a.is_empty() {
            return Err(ArtifactLoadError::Invalid(format!("{} has no columns", what)));
        }
        if a.len() != b.len() {
            return Err(ArtifactLoadError::DimensionMismatch {
                what: what.to_string(),
                expected: a.len(),
                got: b.len(),
            });
        }
        if a.iter().chain(b).any(|v| !v.is_finite()) {
            return Err(ArtifactLoadError::Invalid(format!(
                "{} has non-finite parameters", what
            )));
        }
        Ok(())
    }

    /// Normalize a row given in fitted column order
    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>, TransformError> {
        let expected = self.dimension();
        if row.len() != expected {
            return Err(TransformError::ShapeMismatch { expected, got: row.len() });
        }

        let normalized = match self {
            FittedNormalizer::MinMax { min, max } => row
                .iter()
                .zip(min.iter().zip(max))
                .map(|(x, (lo, hi))| (x - lo) / non_zero(hi - lo))
                .collect(),
            FittedNormalizer::Standard { mean, scale } => row
                .iter()
                .zip(mean.iter().zip(scale))
                .map(|(x, (mu, s))| (x - mu) / non_zero(*s))
                .collect(),
            FittedNormalizer::Identity { .. } => row.to_vec(),
        };

        Ok(normalized)
    }
}

/// Constant columns are fitted with a zero spread; divide by 1 instead
fn non_zero(spread: f64) -> f64 {
    if spread == 0.0 { 1.0 } else { spread }
}
