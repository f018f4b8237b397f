use rten::{Model, Value};
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;
use std::sync::Arc;

use crate::error::DetectError;
use crate::models::{DetectionResult, InferenceInput, NUM_CLASSES};

/// A loaded classifier that maps one preprocessed image to 10 logits
pub trait DigitModel: Send + Sync {
    fn forward(&self, input: &InferenceInput) -> Result<Vec<f32>, DetectError>;
}

/// Turns raw model-file bytes into a runnable model
pub trait ModelLoader {
    fn load(&self, bytes: Vec<u8>) -> Result<Arc<dyn DigitModel>, DetectError>;
}

/// Loader for `.rten` model files
#[derive(Debug, Default, Clone, Copy)]
pub struct RtenLoader;

impl ModelLoader for RtenLoader {
    fn load(&self, bytes: Vec<u8>) -> Result<Arc<dyn DigitModel>, DetectError> {
        let model = Model::load(bytes).map_err(|e| DetectError::ModelLoad(e.to_string()))?;
        Ok(Arc::new(RtenModel { model }))
    }
}

/// CNN classifier executed by rten
pub struct RtenModel {
    model: Model,
}

impl DigitModel for RtenModel {
    fn forward(&self, input: &InferenceInput) -> Result<Vec<f32>, DetectError> {
        let tensor = NdTensor::from_data(input.shape, input.pixels.clone());

        let value = self
            .model
            .run_one(tensor.view().into(), None)
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        logits_from_value(value)
    }
}

/// Flatten a `[batch, classes]` float output into logits
fn logits_from_value(value: Value) -> Result<Vec<f32>, DetectError> {
    let output = NdTensor::<f32, 2>::try_from(value)
        .map_err(|e| DetectError::Inference(format!("unexpected model output: {e}")))?;
    Ok(output.to_vec())
}

/// Read a model file from disk and hand it to `loader`
pub fn load_model(path: &Path, loader: &dyn ModelLoader) -> Result<Arc<dyn DigitModel>, DetectError> {
    let bytes = std::fs::read(path).map_err(|source| DetectError::ModelRead {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), size = bytes.len(), "read model file");
    loader.load(bytes)
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Softmax the logits and pick the most probable digit
pub fn classify_logits(logits: &[f32]) -> Result<DetectionResult, DetectError> {
    let probabilities: [f32; NUM_CLASSES] = softmax(logits)
        .try_into()
        .map_err(|_| DetectError::OutputShape(logits.len()))?;

    Ok(DetectionResult::from_probabilities(probabilities))
}
