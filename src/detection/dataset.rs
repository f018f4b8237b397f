use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge;
use crate::error::DetectError;
use crate::models::{IMAGE_PIXELS, IMAGE_SIDE, LabeledSample};

/// File names of the MNIST test split
pub const TEST_IMAGES_FILE: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS_FILE: &str = "t10k-labels-idx1-ubyte";

/// CVDF mirror of the original MNIST distribution
pub const DEFAULT_MIRROR: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Supplies labeled samples in a stable order
pub trait SampleSource: Send + Sync {
    /// Return at most `count` samples, fewer if the set is smaller
    fn load_samples(&self, count: usize) -> Result<Vec<LabeledSample>, DetectError>;
}

impl SampleSource for Vec<LabeledSample> {
    fn load_samples(&self, count: usize) -> Result<Vec<LabeledSample>, DetectError> {
        Ok(self.iter().take(count).cloned().collect())
    }
}

/// Default dataset location: `~/.cache/mnist`
pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".cache/mnist")
}

/// MNIST test split cached as IDX files in one directory.
///
/// Each file is looked up as the plain `t10k-*-ubyte` name first, then as
/// its gzip-compressed `.gz` sibling. With a mirror configured, a file found
/// in neither form is downloaded as `.gz` into the directory and kept there
/// for the next run.
#[derive(Debug, Clone)]
pub struct IdxDataset {
    dir: PathBuf,
    mirror: Option<String>,
}

impl IdxDataset {
    /// Read-only dataset: missing files are an error
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            mirror: None,
        }
    }

    /// Download missing files from `base_url`
    pub fn with_mirror(mut self, base_url: impl Into<String>) -> Self {
        self.mirror = Some(base_url.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fetch both files concurrently
    async fn read_files(&self) -> Result<(IdxFile, IdxFile), DetectError> {
        tokio::try_join!(self.fetch(TEST_IMAGES_FILE), self.fetch(TEST_LABELS_FILE))
    }

    async fn fetch(&self, name: &str) -> Result<IdxFile, DetectError> {
        let raw = self.dir.join(name);
        if tokio::fs::try_exists(&raw).await.unwrap_or(false) {
            let bytes = read_file(&raw).await?;
            return Ok(IdxFile { path: raw, bytes });
        }

        let gz = self.dir.join(format!("{name}.gz"));
        if !tokio::fs::try_exists(&gz).await.unwrap_or(false) {
            let Some(mirror) = &self.mirror else {
                return Err(DetectError::Dataset {
                    path: raw,
                    reason: "file not found and downloading is disabled".to_string(),
                });
            };
            download(&mirror_url(mirror, name), &gz).await?;
        }

        let bytes = gunzip(&gz, &read_file(&gz).await?)?;
        Ok(IdxFile { path: gz, bytes })
    }
}

impl SampleSource for IdxDataset {
    fn load_samples(&self, count: usize) -> Result<Vec<LabeledSample>, DetectError> {
        let (images_file, labels_file) = bridge::block_on(self.read_files())?;

        let images = parse_images(&images_file.path, &images_file.bytes, count)?;
        let labels = parse_labels(&labels_file.path, &labels_file.bytes, count)?;

        if images.len() != labels.len() {
            return Err(DetectError::Dataset {
                path: labels_file.path,
                reason: format!("{} labels for {} images", labels.len(), images.len()),
            });
        }

        tracing::debug!(samples = images.len(), "parsed MNIST test split");

        Ok(images
            .into_iter()
            .zip(labels)
            .map(|(pixels, label)| LabeledSample { pixels, label })
            .collect())
    }
}

/// Decompressed contents of one IDX file and where they came from
struct IdxFile {
    path: PathBuf,
    bytes: Vec<u8>,
}

/// `<base>/<name>.gz`, tolerating a base with or without a trailing slash
pub fn mirror_url(base: &str, name: &str) -> String {
    format!("{}/{name}.gz", base.trim_end_matches('/'))
}

async fn read_file(path: &Path) -> Result<Vec<u8>, DetectError> {
    tokio::fs::read(path).await.map_err(|e| DetectError::Dataset {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Download `url` to `dest`, writing through a `.part` file so an
/// interrupted transfer never leaves a truncated archive behind
async fn download(url: &str, dest: &Path) -> Result<(), DetectError> {
    let download_error = |source| DetectError::Download {
        url: url.to_string(),
        source,
    };

    tracing::info!(%url, "downloading MNIST file");
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(download_error)?;
    let bytes = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(download_error)?
        .bytes()
        .await
        .map_err(download_error)?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = dest.with_extension("gz.part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, dest).await?;

    tracing::debug!(path = %dest.display(), size = bytes.len(), "cached download");
    Ok(())
}

fn gunzip(path: &Path, compressed: &[u8]) -> Result<Vec<u8>, DetectError> {
    let mut bytes = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut bytes)
        .map_err(|e| DetectError::Dataset {
            path: path.to_path_buf(),
            reason: format!("invalid gzip data: {e}"),
        })?;
    Ok(bytes)
}

/// Big-endian header reader over an IDX file
struct IdxReader<'a> {
    path: &'a Path,
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> IdxReader<'a> {
    fn new(path: &'a Path, bytes: &'a [u8]) -> Self {
        Self {
            path,
            bytes,
            offset: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> DetectError {
        DetectError::Dataset {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }

    fn read_u32(&mut self) -> Result<u32, DetectError> {
        let end = self.offset + 4;
        let chunk = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| self.error("truncated header"))?;
        self.offset = end;
        Ok(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    fn expect_magic(&mut self, magic: u32) -> Result<(), DetectError> {
        let found = self.read_u32()?;
        if found != magic {
            return Err(self.error(format!("bad magic number {found}, expected {magic}")));
        }
        Ok(())
    }

    /// Remaining payload, which must hold at least `len` bytes
    fn payload(&self, len: usize) -> Result<&'a [u8], DetectError> {
        self.bytes
            .get(self.offset..self.offset + len)
            .ok_or_else(|| self.error(format!("truncated payload, expected {len} bytes")))
    }
}

/// Parse up to `limit` images from an IDX3 file
pub fn parse_images(path: &Path, bytes: &[u8], limit: usize) -> Result<Vec<Vec<u8>>, DetectError> {
    let mut reader = IdxReader::new(path, bytes);
    reader.expect_magic(IMAGES_MAGIC)?;
    let count = reader.read_u32()? as usize;
    let rows = reader.read_u32()?;
    let cols = reader.read_u32()?;

    if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
        return Err(reader.error(format!("unexpected image size {rows}x{cols}")));
    }

    let take = count.min(limit);
    let payload = reader.payload(take * IMAGE_PIXELS)?;

    Ok(payload.chunks_exact(IMAGE_PIXELS).map(<[u8]>::to_vec).collect())
}

/// Parse up to `limit` labels from an IDX1 file
pub fn parse_labels(path: &Path, bytes: &[u8], limit: usize) -> Result<Vec<u8>, DetectError> {
    let mut reader = IdxReader::new(path, bytes);
    reader.expect_magic(LABELS_MAGIC)?;
    let count = reader.read_u32()? as usize;

    let take = count.min(limit);
    let payload = reader.payload(take)?;

    if let Some(bad) = payload.iter().find(|&&l| l > 9) {
        return Err(reader.error(format!("label {bad} out of range")));
    }

    Ok(payload.to_vec())
}
