//! Classifier Oracle - ONNX Runtime Integration
//!
//! Wraps the exported ExtraTrees classifier behind a trait so the guardrail
//! pipeline never touches ONNX directly. One inference pass returns both the
//! predicted label index and the full probability distribution; the
//! probability output must be a plain tensor (the model is exported without
//! zipmap).

use ndarray::Array2;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use thiserror::Error;

use super::dataset::SENSOR_COUNT;

/// Model family reported in prediction payloads
pub const MODEL_NAME: &str = "ExtraTrees";

/// Raw output of one classifier invocation
#[derive(Debug, Clone)]
pub struct RawPrediction {
    /// Index into the region label encoding
    pub label_index: usize,
    /// Probability mass per label, same ordering as the encoding
    pub probabilities: Vec<f64>,
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to load model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("model returned label index {index} outside the {regions} known regions")]
    LabelOutOfRange { index: i64, regions: usize },

    #[error("model returned {found} probabilities for {expected} regions")]
    DistributionShape { found: usize, expected: usize },
}

/// Opaque pre-trained classifier: one call, label plus distribution
pub trait ClassifierOracle: Send + Sync {
    fn infer(&self, sensors: &[f64; SENSOR_COUNT]) -> Result<RawPrediction, OracleError>;
}

/// ONNX-backed oracle. The session needs `&mut` to run, so it sits behind a
/// lock; concurrent requests serialize on inference only.
pub struct OnnxOracle {
    session: Mutex<Session>,
    label_output: String,
    prob_output: String,
    num_regions: usize,
}

impl OnnxOracle {
    /// Load the exported model and capture its output names. `num_regions`
    /// comes from the training dataset and pins the expected distribution
    /// width.
    pub fn load(model_path: &str, num_regions: usize) -> Result<Self, OracleError> {
        if !std::path::Path::new(model_path).exists() {
            return Err(OracleError::Load(format!("model not found: {}", model_path)));
        }

        let session = Session::builder()
            .map_err(|e| OracleError::Load(format!("failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| OracleError::Load(format!("failed to set optimization: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| OracleError::Load(format!("failed to load model: {}", e)))?;

        if session.outputs.len() < 2 {
            return Err(OracleError::Load(format!(
                "model exposes {} output(s), expected label and probability tensors",
                session.outputs.len()
            )));
        }

        let label_output = session.outputs[0].name.clone();
        let prob_output = session.outputs[1].name.clone();

        Ok(Self {
            session: Mutex::new(session),
            label_output,
            prob_output,
            num_regions,
        })
    }
}

impl ClassifierOracle for OnnxOracle {
    fn infer(&self, sensors: &[f64; SENSOR_COUNT]) -> Result<RawPrediction, OracleError> {
        let input: Vec<f32> = sensors.iter().map(|&v| v as f32).collect();
        let input_array = Array2::<f32>::from_shape_vec((1, SENSOR_COUNT), input)
            .map_err(|e| OracleError::Inference(format!("array error: {}", e)))?;

        let input_tensor = Value::from_array(input_array)
            .map_err(|e| OracleError::Inference(format!("tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| OracleError::Inference(format!("inference failed: {}", e)))?;

        let label_tensor = outputs
            .get(&self.label_output)
            .ok_or_else(|| OracleError::Inference("no label output".to_string()))?
            .try_extract_tensor::<i64>()
            .map_err(|e| OracleError::Inference(format!("label extract error: {}", e)))?;

        let label = label_tensor
            .1
            .first()
            .copied()
            .ok_or_else(|| OracleError::Inference("empty label output".to_string()))?;

        let prob_tensor = outputs
            .get(&self.prob_output)
            .ok_or_else(|| OracleError::Inference("no probability output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| OracleError::Inference(format!("probability extract error: {}", e)))?;

        let probabilities: Vec<f64> = prob_tensor.1.iter().map(|&p| p as f64).collect();

        if probabilities.len() != self.num_regions {
            return Err(OracleError::DistributionShape {
                found: probabilities.len(),
                expected: self.num_regions,
            });
        }

        if label < 0 || label as usize >= self.num_regions {
            return Err(OracleError::LabelOutOfRange {
                index: label,
                regions: self.num_regions,
            });
        }

        Ok(RawPrediction {
            label_index: label as usize,
            probabilities,
        })
    }
}
