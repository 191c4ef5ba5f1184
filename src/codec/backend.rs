//! Codec trait and shared error type.
//!
//! The [`Codec`] trait is the seam between transcoding logic and whatever
//! actually produces WebP bytes. Production uses
//! [`CwebpCodec`](super::cwebp::CwebpCodec), an external `cwebp` process;
//! tests use the recording `MockCodec` below.

use super::params::EncodeParams;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "codec `{program}` not found on PATH. Install the WebP tools first \
         (macOS: `brew install webp`, Debian/Ubuntu: `sudo apt-get install webp`, \
         Windows: https://developers.google.com/speed/webp/download)"
    )]
    NotFound { program: String },
    #[error("codec `{program}` is not usable: {reason}")]
    Unusable { program: String, reason: String },
    #[error("codec exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("codec timed out after {0:?}")]
    Timeout(Duration),
    #[error("codec reported success but wrote no output to {}", .0.display())]
    MissingOutput(PathBuf),
    #[error("cannot read dimensions of {}: {reason}", .path.display())]
    Identify { path: PathBuf, reason: String },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Read image dimensions from the file header without decoding pixels.
pub fn probe_dimensions(path: &Path) -> Result<Dimensions, CodecError> {
    let (width, height) =
        image::image_dimensions(path).map_err(|e| CodecError::Identify {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(Dimensions { width, height })
}

/// An image encoder producing derived variants.
///
/// Implementations must be `Sync`: one codec is shared by every worker of
/// the transcoding pool.
pub trait Codec: Sync {
    /// Short name for logs and error messages.
    fn name(&self) -> &str;

    /// Check the codec can run at all. Called once before any file is touched.
    fn probe(&self) -> Result<(), CodecError>;

    /// Encode `params.source` into `params.output`.
    fn encode(&self, params: &EncodeParams) -> Result<(), CodecError>;

    /// Source dimensions, used to avoid upscaling full renditions.
    fn identify(&self, path: &Path) -> Result<Dimensions, CodecError> {
        probe_dimensions(path)
    }
}
