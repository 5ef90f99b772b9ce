//! Verdict threshold and output formatting
//!
//! Probabilities stay full precision until they reach these helpers.

use serde::{Deserialize, Serialize};

use crate::constants::MALICIOUS_THRESHOLD;

/// Per-model verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Benign,
    Malicious,
    /// The model failed for this packet
    Error,
}

impl Verdict {
    /// Malicious strictly above the threshold; exactly 0.5 is benign
    pub fn from_probability(probability: f64) -> Self {
        if probability > MALICIOUS_THRESHOLD {
            Verdict::Malicious
        } else {
            Verdict::Benign
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Benign => "Benign",
            Verdict::Malicious => "Malicious",
            Verdict::Error => "Error",
        }
    }

    pub fn is_malicious(&self) -> bool {
        matches!(self, Verdict::Malicious)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// `0.2` -> `"20.0%"`
pub fn format_confidence(probability: f64) -> String {
    format!("{:.1}%", probability * 100.0)
}

/// `0.2` -> `"0.2000"`
pub fn format_probability(probability: f64) -> String {
    format!("{:.4}", probability)
}
