//! Feature Transformer
//!
//! Raw flow -> model-ready row:
//! 1. order the packet by the weight table (missing -> 0.0)
//! 2. normalize with the fitted normalizer
//! 3. combined importance score = normalized · weights
//! 4. add the score to the packet's features
//! 5. project onto the selected features (missing -> 0.0)

use serde::Serialize;

use super::vector::FeatureVector;
use crate::constants::COMBINED_SCORE_FEATURE;
use crate::logic::artifacts::ArtifactStore;
use crate::logic::error::TransformError;

/// Fixed-length input row shared by every model of the ensemble
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInput {
    values: Vec<f64>,
    combined_score: f64,
}

impl ModelInput {
    pub fn new(values: Vec<f64>, combined_score: f64) -> Self {
        Self { values, combined_score }
    }

    /// Values in selected-feature order
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn combined_score(&self) -> f64 {
        self.combined_score
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build the model input for one packet
pub fn transform(packet: &FeatureVector, store: &ArtifactStore) -> Result<ModelInput, TransformError> {
    let weights = store.weights();

    let row = weights.ordered_row(packet);
    let normalized = store.normalizer().transform(&row)?;

    let combined_score = weights.dot(&normalized);
    if !combined_score.is_finite() {
        return Err(TransformError::NonFiniteScore(combined_score));
    }

    // The derived score shadows any same-named packet feature
    let values = store
        .selected_features()
        .iter()
        .map(|name| {
            if name == COMBINED_SCORE_FEATURE {
                combined_score
            } else {
                packet.resolve(name)
            }
        })
        .collect();

    Ok(ModelInput { values, combined_score })
}
