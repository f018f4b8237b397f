mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from mnist_detect for tests
pub use mnist_detect::detection::inference::DigitModel;
pub use mnist_detect::{DetectError, InferenceInput};
