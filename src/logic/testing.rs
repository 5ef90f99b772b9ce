//! Shared fixtures for unit tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::constants::COMBINED_SCORE_FEATURE;
use crate::logic::artifacts::{ArtifactStore, FittedNormalizer, WeightTable};
use crate::logic::error::ModelPredictionError;
use crate::logic::model::{Model, RegisteredModel};

/// Always answers the same probability
pub struct StubModel(pub f64);

impl Model for StubModel {
    fn predict(&self, _input: &[f64]) -> Result<f64, ModelPredictionError> {
        Ok(self.0)
    }
}

/// Always fails
pub struct FailingModel;

impl Model for FailingModel {
    fn predict(&self, _input: &[f64]) -> Result<f64, ModelPredictionError> {
        Err(ModelPredictionError::Runtime("stub failure".to_string()))
    }
}

/// Panics on every call
pub struct PanickingModel;

impl Model for PanickingModel {
    fn predict(&self, _input: &[f64]) -> Result<f64, ModelPredictionError> {
        panic!("corrupt model state")
    }
}

/// Counts its calls, answers 0.9
#[derive(Clone, Default)]
pub struct CountingModel(pub Arc<AtomicU64>);

impl Model for CountingModel {
    fn predict(&self, _input: &[f64]) -> Result<f64, ModelPredictionError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(0.9)
    }
}

pub const WEIGHTED: &[(&str, f64)] = &[
    ("Flow Duration", 0.4),
    ("Flow Bytes/s", 0.25),
    ("SYN Flag Count", 0.2),
    ("Unmapped Feature", 0.15),
];

pub fn weight_table() -> WeightTable {
    WeightTable::new(WEIGHTED.iter().map(|(n, w)| (n.to_string(), *w)).collect()).unwrap()
}

pub fn selected() -> Vec<String> {
    ["Flow Duration", "ACK Flag Count", COMBINED_SCORE_FEATURE, "Idle Mean"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn identity() -> FittedNormalizer {
    FittedNormalizer::Identity { dimension: WEIGHTED.len() }
}

/// Store with an identity normalizer and the given models
pub fn store_with(models: Vec<RegisteredModel>) -> ArtifactStore {
    ArtifactStore::from_parts(weight_table(), identity(), selected(), models).unwrap()
}

/// Store with one stub model per probability
pub fn stub_store(probabilities: &[f64]) -> Arc<ArtifactStore> {
    let models = probabilities
        .iter()
        .enumerate()
        .map(|(i, p)| RegisteredModel::new(format!("Model {}", i + 1), StubModel(*p)))
        .collect();
    Arc::new(store_with(models))
}
