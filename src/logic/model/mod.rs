//! Model Module - Ensemble inference
//!
//! Model capability, its ONNX and logistic variants, the verdict
//! threshold and the ensemble scorer.

pub mod inference;
pub mod logistic;
pub mod threshold;
pub mod ensemble;

// Re-export common types
pub use inference::{Model, OnnxModel, RegisteredModel};
pub use logistic::LogisticModel;
pub use threshold::Verdict;
pub use ensemble::{score, DetectionResult};
