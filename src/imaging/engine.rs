//! Pixel engine trait and shared types.
//!
//! The [`ImageEngine`] trait covers the two operations that touch encoded
//! bytes: decoding a file into an [`ImageHandle`] and encoding a handle into
//! a target format. Everything in between works on the decoded handle
//! directly (see [`pixel`](super::pixel)).
//!
//! The production implementation is
//! [`RustEngine`](super::rust_engine::RustEngine).

use super::handle::{AccessMode, ImageHandle};
use super::params::EncodingOptions;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Decode/encode backend.
///
/// Implementations must be `Sync`: one engine instance serves every request
/// a [`Pipeline`](crate::pipeline::Pipeline) handles, possibly from several
/// threads at once.
pub trait ImageEngine: Sync {
    /// Decode the file at `path`. `access` tells the engine whether the
    /// pipeline will read pixels out of order.
    fn load(&self, path: &Path, access: AccessMode) -> Result<ImageHandle, EngineError>;

    /// Encode into the format named by `extension`.
    fn encode(
        &self,
        image: &ImageHandle,
        extension: &str,
        options: &EncodingOptions,
    ) -> Result<Vec<u8>, EngineError>;

    /// Whether [`encode`](Self::encode) supports `extension`.
    fn can_write(&self, extension: &str) -> bool;
}
