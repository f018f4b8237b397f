use flate2::Compression;
use flate2::write::GzEncoder;
use image::{GrayImage, Luma};
use mnist_detect::detection::dataset::{TEST_IMAGES_FILE, TEST_LABELS_FILE};
use mnist_detect::detection::inference::{DigitModel, ModelLoader};
use mnist_detect::{DetectError, InferenceInput, LabeledSample};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{NamedTempFile, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Creates a 56x56 PNG with a black square in the middle of a white
/// background. The file is removed when dropped.
pub fn create_digit_image() -> NamedTempFile {
    let img = GrayImage::from_fn(56, 56, |x, y| {
        if (16..40).contains(&x) && (16..40).contains(&y) {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Creates a `.png` file whose contents are not an image
pub fn create_corrupt_image() -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp file");
    std::fs::write(file.path(), b"definitely not a png").expect("Failed to write temp file");
    file
}

/// Sample whose pixels all equal `fill`
pub fn make_sample(label: u8, fill: u8) -> LabeledSample {
    LabeledSample {
        pixels: vec![fill; 28 * 28],
        label,
    }
}

/// Encodes `samples` as the (images, labels) pair of IDX files
pub fn idx_bytes(samples: &[LabeledSample]) -> (Vec<u8>, Vec<u8>) {
    let mut images = Vec::new();
    images.extend_from_slice(&2051u32.to_be_bytes());
    images.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    images.extend_from_slice(&28u32.to_be_bytes());
    images.extend_from_slice(&28u32.to_be_bytes());
    for s in samples {
        images.extend_from_slice(&s.pixels);
    }

    let mut labels = Vec::new();
    labels.extend_from_slice(&2049u32.to_be_bytes());
    labels.extend_from_slice(&(samples.len() as u32).to_be_bytes());
    labels.extend(samples.iter().map(|s| s.label));

    (images, labels)
}

/// Writes MNIST-style IDX test files for `samples` into a fresh temp dir
pub fn write_idx_dataset(samples: &[LabeledSample]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let (images, labels) = idx_bytes(samples);

    std::fs::write(dir.path().join(TEST_IMAGES_FILE), images).expect("Failed to write images");
    std::fs::write(dir.path().join(TEST_LABELS_FILE), labels).expect("Failed to write labels");
    dir
}

/// Gzip-compresses `bytes` the way the MNIST distribution ships them
pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("Failed to compress");
    encoder.finish().expect("Failed to finish gzip stream")
}

/// Writes only the `.gz` form of the IDX test files into a fresh temp dir
pub fn write_gz_idx_dataset(samples: &[LabeledSample]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let (images, labels) = idx_bytes(samples);

    std::fs::write(dir.path().join(format!("{TEST_IMAGES_FILE}.gz")), gzip(&images))
        .expect("Failed to write images");
    std::fs::write(dir.path().join(format!("{TEST_LABELS_FILE}.gz")), gzip(&labels))
        .expect("Failed to write labels");
    dir
}

/// Minimal HTTP server answering `GET /<name>` from `files`, 404 otherwise.
/// Returns the base URL and a counter of requests served.
pub async fn spawn_mirror(files: HashMap<String, Vec<u8>>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mirror");
    let addr = listener.local_addr().expect("Failed to read mirror address");
    let hits = Arc::new(AtomicUsize::new(0));
    let files = Arc::new(files);

    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let files = Arc::clone(&files);
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);

                let request = String::from_utf8_lossy(&request);
                let path = request.split_whitespace().nth(1).unwrap_or("/");
                let (status, body) = match files.get(path.trim_start_matches('/')) {
                    Some(body) => ("200 OK", body.clone()),
                    None => ("404 Not Found", Vec::new()),
                };

                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(&body).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (format!("http://{addr}/"), hits)
}

/// Logits strongly favouring one digit
pub fn one_hot_logits(digit: usize) -> Vec<f32> {
    let mut logits = vec![0.0; 10];
    logits[digit] = 10.0;
    logits
}

/// Model that always predicts the same digit and counts its calls
#[derive(Default)]
pub struct FixedModel {
    pub digit: usize,
    pub calls: AtomicUsize,
}

impl FixedModel {
    pub fn new(digit: usize) -> Self {
        Self {
            digit,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DigitModel for FixedModel {
    fn forward(&self, _input: &InferenceInput) -> Result<Vec<f32>, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(one_hot_logits(self.digit))
    }
}

/// Model that predicts the digit matching the mean brightness (0.0 -> 0, 1.0 -> 9)
pub struct BrightnessModel;

impl DigitModel for BrightnessModel {
    fn forward(&self, input: &InferenceInput) -> Result<Vec<f32>, DetectError> {
        let mean = input.pixels.iter().sum::<f32>() / input.pixels.len() as f32;
        Ok(one_hot_logits((mean * 9.0).round() as usize))
    }
}

/// Model whose forward pass always fails
pub struct FailingModel;

impl DigitModel for FailingModel {
    fn forward(&self, _input: &InferenceInput) -> Result<Vec<f32>, DetectError> {
        Err(DetectError::Inference("backend exploded".to_string()))
    }
}

/// Model emitting the wrong number of logits
pub struct WideModel;

impl DigitModel for WideModel {
    fn forward(&self, _input: &InferenceInput) -> Result<Vec<f32>, DetectError> {
        Ok(vec![0.0; 12])
    }
}

/// Loader that records the bytes it was given and returns a `FixedModel`
#[derive(Default)]
pub struct RecordingLoader {
    pub seen: std::sync::Mutex<Vec<u8>>,
}

impl ModelLoader for RecordingLoader {
    fn load(&self, bytes: Vec<u8>) -> Result<Arc<dyn DigitModel>, DetectError> {
        *self.seen.lock().unwrap() = bytes;
        Ok(Arc::new(FixedModel::new(4)))
    }
}
