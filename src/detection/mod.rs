pub mod dataset;
pub mod inference;
pub mod preprocessing;
pub mod steps;

use crate::models::{DetectionResult, InferenceInput, LabeledSample};
use crate::pipeline::Pipeline;

pub use dataset::{IdxDataset, SampleSource};
pub use inference::{DigitModel, ModelLoader, RtenLoader};
pub use preprocessing::{Normalization, PreprocessOptions};
pub use steps::{DatasetConfig, dataset_pipeline, image_pipeline, inference_pipeline};

/// Prediction for one labeled sample
#[derive(Debug, Clone)]
pub struct SampleOutcome {
    /// 1-based position in the evaluated set
    pub index: usize,
    pub label: u8,
    pub result: DetectionResult,
}

impl SampleOutcome {
    pub fn is_correct(&self) -> bool {
        self.result.predicted_digit == self.label
    }
}

/// Results of running a model over a labeled set
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub outcomes: Vec<SampleOutcome>,
}

impl Evaluation {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn correct(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_correct()).count()
    }

    /// Fraction of correct predictions, 0.0 for an empty set
    pub fn accuracy(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.correct() as f64 / self.total() as f64
    }
}

/// Run every sample through `inference`, stopping at the first failure
pub fn evaluate(
    samples: &[LabeledSample],
    inference: &Pipeline<InferenceInput, DetectionResult>,
) -> anyhow::Result<Evaluation> {
    let mut outcomes = Vec::with_capacity(samples.len());

    for (i, sample) in samples.iter().enumerate() {
        let result = inference.execute(InferenceInput::from_sample(sample))?;
        tracing::debug!(
            sample = i + 1,
            label = sample.label,
            predicted = result.predicted_digit,
            "classified sample"
        );
        outcomes.push(SampleOutcome {
            index: i + 1,
            label: sample.label,
            result,
        });
    }

    Ok(Evaluation { outcomes })
}
