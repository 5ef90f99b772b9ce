//! Feature Vector - Core data structure for one observed flow
//!
//! A flow is a bag of named numeric attributes. Lookups are total:
//! anything absent (or not a finite number) reads as 0.0.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// Named numeric attributes of one flow record
///
/// Deserializes from a flat JSON object. `null` entries are dropped,
/// which makes them resolve to 0.0 like any other missing feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, Option<f64>>", into = "HashMap<String, f64>")]
pub struct FeatureVector {
    values: HashMap<String, f64>,
}

impl FeatureVector {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a feature by name.
    ///
    /// Never fails: missing, NaN and infinite values all resolve to 0.0.
    pub fn resolve(&self, name: &str) -> f64 {
        self.values
            .get(name)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// Raw lookup, without default fill
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Set feature by name
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    /// Set feature only if it is not already present
    pub fn fill_default(&mut self, name: &str) {
        if !self.values.contains_key(name) {
            self.values.insert(name.to_string(), 0.0);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (name, value) pairs in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl From<HashMap<String, f64>> for FeatureVector {
    fn from(values: HashMap<String, f64>) -> Self {
        Self { values }
    }
}

impl From<HashMap<String, Option<f64>>> for FeatureVector {
    fn from(raw: HashMap<String, Option<f64>>) -> Self {
        let values = raw
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();
        Self { values }
    }
}

impl From<FeatureVector> for HashMap<String, f64> {
    fn from(vector: FeatureVector) -> Self {
        vector.values
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
