use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the detection flows
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Image file not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Cannot read image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to read model file {}: {source}", path.display())]
    ModelRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Forward pass failed: {0}")]
    Inference(String),

    #[error("Model produced {0} outputs, expected 10")]
    OutputShape(usize),

    #[error("Invalid dataset file {}: {reason}", path.display())]
    Dataset { path: PathBuf, reason: String },

    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
