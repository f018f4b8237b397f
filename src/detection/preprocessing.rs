use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader};
use std::path::Path;

use crate::error::DetectError;
use crate::models::{IMAGE_SIDE, InferenceInput};

/// Mean and standard deviation of the MNIST training set
pub const MNIST_MEAN: f32 = 0.1307;
pub const MNIST_STD: f32 = 0.3081;

/// Per-pixel normalization applied after scaling to [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: f32,
    pub std: f32,
}

impl Normalization {
    pub fn mnist() -> Self {
        Self {
            mean: MNIST_MEAN,
            std: MNIST_STD,
        }
    }
}

/// How an arbitrary image is turned into model input
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PreprocessOptions {
    /// Invert intensities, for dark digits on a light background
    pub invert: bool,
    pub normalization: Option<Normalization>,
}

/// Load and decode an image file
pub fn load_image(path: &Path) -> Result<DynamicImage, DetectError> {
    if !path.exists() {
        return Err(DetectError::ImageNotFound(path.to_path_buf()));
    }

    let decode_err = |source| DetectError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };

    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(decode_err)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Resize to 28x28, ignoring aspect ratio
pub fn resize_to_mnist(img: &GrayImage) -> GrayImage {
    if img.dimensions() == (IMAGE_SIDE, IMAGE_SIDE) {
        return img.clone();
    }
    imageops::resize(img, IMAGE_SIDE, IMAGE_SIDE, FilterType::Triangle)
}

/// Scale pixels to [0, 1], optionally inverting and normalizing
pub fn to_tensor(img: &GrayImage, options: &PreprocessOptions) -> InferenceInput {
    let pixels = img
        .pixels()
        .map(|p| {
            let mut v = p[0] as f32 / 255.0;
            if options.invert {
                v = 1.0 - v;
            }
            match options.normalization {
                Some(n) => (v - n.mean) / n.std,
                None => v,
            }
        })
        .collect();

    InferenceInput::new(pixels)
}
