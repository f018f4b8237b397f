/// Number of digit classes
pub const NUM_CLASSES: usize = 10;

/// Side length of an MNIST image
pub const IMAGE_SIDE: u32 = 28;

/// Pixels in one MNIST image
pub const IMAGE_PIXELS: usize = (IMAGE_SIDE * IMAGE_SIDE) as usize;

/// Model input shape (batch, channels, height, width)
pub const INPUT_SHAPE: [usize; 4] = [1, 1, IMAGE_SIDE as usize, IMAGE_SIDE as usize];

/// Outcome of classifying a single digit image
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Digit with the highest probability (0-9)
    pub predicted_digit: u8,
    /// Probability of `predicted_digit`
    pub confidence: f32,
    /// Probability distribution over all 10 digits
    pub probabilities: [f32; NUM_CLASSES],
}

impl DetectionResult {
    /// Build a result from a probability vector.
    /// Ties go to the lowest digit.
    pub fn from_probabilities(probabilities: [f32; NUM_CLASSES]) -> Self {
        let mut predicted = 0;
        for (digit, p) in probabilities.iter().enumerate() {
            if *p > probabilities[predicted] {
                predicted = digit;
            }
        }

        Self {
            predicted_digit: predicted as u8,
            confidence: probabilities[predicted],
            probabilities,
        }
    }
}

/// Preprocessed pixels ready for a forward pass
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceInput {
    /// Row-major 28x28 values
    pub pixels: Vec<f32>,
    pub shape: [usize; 4],
}

impl InferenceInput {
    pub fn new(pixels: Vec<f32>) -> Self {
        Self {
            pixels,
            shape: INPUT_SHAPE,
        }
    }

    /// Convert a raw dataset sample, scaling bytes to [0, 1]
    pub fn from_sample(sample: &LabeledSample) -> Self {
        Self::new(sample.pixels.iter().map(|&b| b as f32 / 255.0).collect())
    }
}

/// One image from a labeled dataset
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    /// Raw 28x28 grayscale bytes, white digit on black
    pub pixels: Vec<u8>,
    pub label: u8,
}
