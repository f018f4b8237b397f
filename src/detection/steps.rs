use std::path::PathBuf;
use std::sync::Arc;

use crate::detection::dataset::SampleSource;
use crate::detection::inference::{self, DigitModel};
use crate::detection::preprocessing::{self, PreprocessOptions};
use crate::models::{DetectionResult, InferenceInput, LabeledSample};
use crate::pipeline::Pipeline;

/// How many samples to pull from the test split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetConfig {
    pub sample_count: usize,
}

/// Image file path -> model input
///
/// Steps: load-image, grayscale, resize, to-tensor
pub fn image_pipeline(options: PreprocessOptions) -> Pipeline<PathBuf, InferenceInput> {
    Pipeline::builder("image-pipeline")
        .try_step("load-image", |path: PathBuf| preprocessing::load_image(&path))
        .add_step("grayscale", |img| preprocessing::to_grayscale(&img))
        .add_step("resize", |gray| preprocessing::resize_to_mnist(&gray))
        .add_step("to-tensor", move |gray| preprocessing::to_tensor(&gray, &options))
        .build()
}

/// Model input -> prediction, using an already loaded model
///
/// Steps: forward, argmax
pub fn inference_pipeline(model: Arc<dyn DigitModel>) -> Pipeline<InferenceInput, DetectionResult> {
    Pipeline::builder("inference-pipeline")
        .try_step("forward", move |input: InferenceInput| model.forward(&input))
        .try_step("argmax", |logits: Vec<f32>| inference::classify_logits(&logits))
        .build()
}

/// Dataset config -> labeled samples from `source`
pub fn dataset_pipeline(source: Arc<dyn SampleSource>) -> Pipeline<DatasetConfig, Vec<LabeledSample>> {
    Pipeline::builder("dataset-pipeline")
        .try_step("load-samples", move |config: DatasetConfig| {
            source.load_samples(config.sample_count)
        })
        .build()
}
