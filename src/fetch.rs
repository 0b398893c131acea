//! Source retrieval.
//!
//! A [`Fetcher`] turns a source URL into a [`LocalHandle`]: a temporary file
//! the pixel engine can open by path. The file is deleted when the handle is
//! dropped, whichever way the request ends.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Image is too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
    #[error("Not a supported image: {0}")]
    NotAnImage(String),
}

/// A fetched source on local disk, removed on drop.
#[derive(Debug)]
pub struct LocalHandle {
    file: NamedTempFile,
}

impl LocalHandle {
    /// Spill `bytes` into a fresh temporary file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FetchError> {
        let mut file = tempfile::Builder::new().prefix("imgchain-").tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Retrieves a source image by URL.
pub trait Fetcher: Sync {
    fn fetch(&self, url: &str) -> Result<LocalHandle, FetchError>;
}

/// Reads `file://` URLs and bare paths from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher {
    /// Largest accepted source in bytes; 0 disables the check.
    max_image_size: u64,
}

impl LocalFetcher {
    pub fn new(max_image_size: u64) -> Self {
        Self { max_image_size }
    }

    fn resolve(url: &str) -> Result<PathBuf, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        match url.split_once("://") {
            Some((scheme, _)) => Err(FetchError::UnsupportedScheme(scheme.to_string())),
            None => Ok(PathBuf::from(url)),
        }
    }
}

impl Fetcher for LocalFetcher {
    fn fetch(&self, url: &str) -> Result<LocalHandle, FetchError> {
        let path = Self::resolve(url)?;
        let size = std::fs::metadata(&path)?.len();
        if self.max_image_size > 0 && size > self.max_image_size {
            return Err(FetchError::TooLarge {
                size,
                limit: self.max_image_size,
            });
        }

        let bytes = std::fs::read(&path)?;
        image::guess_format(&bytes).map_err(|_| FetchError::NotAnImage(url.to_string()))?;
        LocalHandle::from_bytes(&bytes)
    }
}

/// Lower-case extension of a source URL or path, with `jpeg` folded to
/// `jpg`. Empty when there is none.
pub fn source_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext == "jpeg" { "jpg".to_string() } else { ext }
}
