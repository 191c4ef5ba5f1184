//! Parameter types for codec invocations.
//!
//! These describe *what* to encode; the [`Codec`](super::Codec)
//! implementation decides *how*. Keeping them apart lets tests swap in a
//! recording codec without touching transcoding logic.

use std::path::PathBuf;

/// Quality setting for lossy encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// One encode: source image in, derived image out.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Resize to this width with proportional height; `None` keeps the size.
    pub width: Option<u32>,
    pub quality: Quality,
}
