//! Inference Engine - ONNX Runtime Integration
//!
//! Every classifier in the ensemble sits behind the `Model` trait so the
//! scorer treats ONNX graphs, linear models and test stubs uniformly.

use std::path::Path;
use ndarray::Array2;
use parking_lot::Mutex;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;

use crate::logic::error::{ArtifactLoadError, ModelPredictionError};

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// A pre-trained binary classifier
pub trait Model: Send + Sync {
    /// Probability that the input row is malicious
    fn predict(&self, input: &[f64]) -> Result<f64, ModelPredictionError>;

    /// Input width the model was trained on, when the model can tell
    fn input_dimension(&self) -> Option<usize> {
        None
    }
}

/// A model under its stable logical name
pub struct RegisteredModel {
    name: String,
    model: Box<dyn Model>,
}

impl RegisteredModel {
    pub fn new(name: impl Into<String>, model: impl Model + 'static) -> Self {
        Self {
            name: name.into(),
            model: Box::new(model),
        }
    }

    pub fn from_boxed(name: impl Into<String>, model: Box<dyn Model>) -> Self {
        Self { name: name.into(), model }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }
}

impl std::fmt::Debug for RegisteredModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModel")
            .field("name", &self.name)
            .field("input_dimension", &self.model.input_dimension())
            .finish()
    }
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX classifier with a single `[1, n]` float input and a sigmoid output
pub struct OnnxModel {
    session: Mutex<Session>,
}

impl OnnxModel {
    /// Load ONNX model from file
    pub fn load(name: &str, model_path: &Path) -> Result<Self, ArtifactLoadError> {
        log::info!("Loading ONNX model '{}' from: {:?}", name, model_path);

        let fail = |reason: String| ArtifactLoadError::Model {
            name: name.to_string(),
            reason,
        };

        let session = Session::builder()
            .map_err(|e| fail(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| fail(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| fail(format!("Failed to load model: {}", e)))?;

        Ok(Self { session: Mutex::new(session) })
    }
}

impl Model for OnnxModel {
    fn predict(&self, input: &[f64]) -> Result<f64, ModelPredictionError> {
        let runtime = |msg: String| ModelPredictionError::Runtime(msg);

        // Models are exported with float32 inputs
        let input_data: Vec<f32> = input.iter().map(|v| *v as f32).collect();
        let input_array = Array2::<f32>::from_shape_vec((1, input.len()), input_data)
            .map_err(|e| runtime(format!("Array error: {}", e)))?;

        let mut session = self.session.lock();

        let output_name = session.outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| runtime("No output defined".to_string()))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| runtime(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| runtime(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| runtime("No output".to_string()))?;

        let output_tensor = output.try_extract_tensor::<f32>()
            .map_err(|e| runtime(format!("Extract error: {}", e)))?;

        output_tensor.1
            .first()
            .map(|p| f64::from(*p))
            .ok_or_else(|| runtime("Empty output tensor".to_string()))
    }
}
