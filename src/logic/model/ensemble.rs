//! Ensemble Scorer
//!
//! Runs one model input through every registered classifier, in
//! registration order. One model failing never hides the others.

use std::panic::{self, AssertUnwindSafe};
use serde::{Deserialize, Serialize};

use super::inference::RegisteredModel;
use super::threshold::{format_confidence, format_probability, Verdict};
use crate::logic::error::{panic_message, ModelPredictionError};
use crate::logic::features::ModelInput;

/// Placeholder for fields a failed model cannot fill
const UNAVAILABLE: &str = "-";

/// One model's verdict on one packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub model: String,
    pub verdict: Verdict,
    /// Probability x 100, one decimal, e.g. `"51.0%"`
    pub confidence: String,
    /// Probability, four decimals, e.g. `"0.5100"`
    pub raw_probability: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unrounded probability, kept for aggregation
    #[serde(skip)]
    pub probability: Option<f64>,
}

impl DetectionResult {
    pub fn scored(model: &str, probability: f64) -> Self {
        Self {
            model: model.to_string(),
            verdict: Verdict::from_probability(probability),
            confidence: format_confidence(probability),
            raw_probability: format_probability(probability),
            error: None,
            probability: Some(probability),
        }
    }

    pub fn failed(model: &str, error: &ModelPredictionError) -> Self {
        Self {
            model: model.to_string(),
            verdict: Verdict::Error,
            confidence: UNAVAILABLE.to_string(),
            raw_probability: UNAVAILABLE.to_string(),
            error: Some(error.to_string()),
            probability: None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.verdict == Verdict::Error
    }
}

/// Score `input` with every model, preserving registration order
pub fn score(input: &ModelInput, models: &[RegisteredModel]) -> Vec<DetectionResult> {
    models
        .iter()
        .map(|entry| match predict_checked(entry, input) {
            Ok(probability) => DetectionResult::scored(entry.name(), probability),
            Err(e) => {
                log::warn!("Model '{}' failed: {}", entry.name(), e);
                DetectionResult::failed(entry.name(), &e)
            }
        })
        .collect()
}

/// Predict and reject anything that is not a probability.
/// A panicking model counts as a runtime failure of that model alone.
fn predict_checked(entry: &RegisteredModel, input: &ModelInput) -> Result<f64, ModelPredictionError> {
    let probability = panic::catch_unwind(AssertUnwindSafe(|| entry.model().predict(input.values())))
        .map_err(|payload| {
            ModelPredictionError::Runtime(format!("model panicked: {}", panic_message(&*payload)))
        })??;
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(ModelPredictionError::OutOfRange(probability));
    }
    Ok(probability)
}
