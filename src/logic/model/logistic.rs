//! Logistic classifier stored as JSON
//!
//! `sigmoid(coefficients · x + intercept)`. Useful for linear baselines
//! exported next to the ONNX ensemble.

use std::path::Path;
use serde::{Deserialize, Serialize};

use super::inference::Model;
use crate::logic::error::{ArtifactLoadError, ModelPredictionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self { coefficients, intercept }
    }

    pub fn load(name: &str, path: &Path) -> Result<Self, ArtifactLoadError> {
        let model: Self = crate::logic::artifacts::read_json(path)?;
        if model.coefficients.is_empty() {
            return Err(ArtifactLoadError::Model {
                name: name.to_string(),
                reason: "no coefficients".to_string(),
            });
        }
        if model.coefficients.iter().any(|c| !c.is_finite()) || !model.intercept.is_finite() {
            return Err(ArtifactLoadError::Model {
                name: name.to_string(),
                reason: "non-finite parameters".to_string(),
            });
        }
        Ok(model)
    }
}

impl Model for LogisticModel {
    fn predict(&self, input: &[f64]) -> Result<f64, ModelPredictionError> {
        if input.len() != self.coefficients.len() {
            return Err(ModelPredictionError::ShapeMismatch {
                expected: self.coefficients.len(),
                got: input.len(),
            });
        }

        let z: f64 = input
            .iter()
            .zip(&self.coefficients)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.intercept;

        Ok(1.0 / (1.0 + (-z).exp()))
    }

    fn input_dimension(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}
