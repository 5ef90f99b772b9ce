//! Feature importance weights
//!
//! Ordered (feature, weight) pairs. The order is the column order the
//! normalizer was fitted on and the order of the importance dot product.

use std::collections::HashSet;

use crate::logic::error::ArtifactLoadError;
use crate::logic::features::FeatureVector;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    names: Vec<String>,
    weights: Vec<f64>,
}

impl WeightTable {
    /// Build a table from ordered pairs.
    ///
    /// Rejects an empty table, duplicate names and non-finite weights.
    pub fn new(pairs: Vec<(String, f64)>) -> Result<Self, ArtifactLoadError> {
        if pairs.is_empty() {
            return Err(ArtifactLoadError::Invalid("weight table is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(pairs.len());
        for (name, weight) in &pairs {
            if !seen.insert(name.as_str()) {
                return Err(ArtifactLoadError::Invalid(format!(
                    "duplicate feature in weight table: {}", name
                )));
            }
            if !weight.is_finite() {
                return Err(ArtifactLoadError::Invalid(format!(
                    "weight for {} is not finite", name
                )));
            }
        }

        let (names, weights) = pairs.into_iter().unzip();
        Ok(Self { names, weights })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Packet values in table order, missing features as 0.0
    pub fn ordered_row(&self, packet: &FeatureVector) -> Vec<f64> {
        self.names.iter().map(|name| packet.resolve(name)).collect()
    }

    /// Dot product of a row (in table order) with the weights
    pub fn dot(&self, row: &[f64]) -> f64 {
        row.iter().zip(&self.weights).map(|(x, w)| x * w).sum()
    }
}
