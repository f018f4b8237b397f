pub mod bridge;
pub mod cli;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use cli::{Command, Invocation};
pub use error::DetectError;
pub use models::{DetectionResult, InferenceInput, LabeledSample};
pub use pipeline::{Pipeline, PipelineBuilder};
