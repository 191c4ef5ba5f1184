//! Shared types passed between pipeline stages.
//!
//! Values here are created once by one stage (scan → process → manifest) and
//! never mutated afterwards. The manifest module owns the serialized shape;
//! these are the in-memory records it is built from.

use crate::codec::Quality;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// Which derived rendition a file or profile refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Thumbnail,
    Full,
}

impl VariantKind {
    /// Production order within one source: thumbnail first, then full.
    pub const ALL: [VariantKind; 2] = [VariantKind::Thumbnail, VariantKind::Full];

    pub fn label(self) -> &'static str {
        match self {
            VariantKind::Thumbnail => "thumbnail",
            VariantKind::Full => "full",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One discovered original image.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    /// File name including extension (`beach.jpg`).
    pub name: String,
    /// Path relative to the asset root, `/`-separated (`travel/beach.jpg`).
    pub relative_path: String,
    /// Path on disk.
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
    pub media_type: &'static str,
}

impl SourceImage {
    /// Relative directory of this source, empty for files at the root.
    pub fn relative_dir(&self) -> &str {
        self.relative_path
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or("")
    }
}

/// Media type for a lowercase file extension.
pub fn media_type_for_extension(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

/// How a profile's width is applied to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Always resize to the profile width, even if that upscales.
    Exact,
    /// Resize only when the source is wider than the profile width.
    AtMost,
}

/// Encoding profile for one variant kind. Read-only for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantProfile {
    pub kind: VariantKind,
    /// Target width for thumbnails, maximum width for full renditions.
    pub width: u32,
    pub quality: Quality,
    /// Size ceiling; larger outputs are flagged, not rejected.
    pub max_size_kb: u64,
    /// Quality for a second encode when the first output is over
    /// `max_size_kb`. `None` keeps the oversize output as is.
    pub fallback_quality: Option<Quality>,
}

impl VariantProfile {
    pub fn resize_mode(&self) -> ResizeMode {
        match self.kind {
            VariantKind::Thumbnail => ResizeMode::Exact,
            VariantKind::Full => ResizeMode::AtMost,
        }
    }

    pub fn exceeds_budget(&self, bytes: u64) -> bool {
        bytes > self.max_size_kb.saturating_mul(1024)
    }
}

/// The two profiles used for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Profiles {
    pub thumbnail: VariantProfile,
    pub full: VariantProfile,
}

impl Profiles {
    pub fn get(&self, kind: VariantKind) -> &VariantProfile {
        match kind {
            VariantKind::Thumbnail => &self.thumbnail,
            VariantKind::Full => &self.full,
        }
    }
}

/// How a variant outcome came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStatus {
    /// Existing output was newer than the source; codec not invoked.
    Cached,
    /// Codec ran and produced the output.
    Encoded,
    /// Codec failed, timed out, or produced nothing.
    Failed,
    /// Never attempted (name conflict or cancelled run).
    Skipped,
}

impl VariantStatus {
    pub fn label(self) -> &'static str {
        match self {
            VariantStatus::Cached => "cached",
            VariantStatus::Encoded => "encoded",
            VariantStatus::Failed => "failed",
            VariantStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of producing (or reusing) one derived file.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedVariant {
    pub kind: VariantKind,
    pub path: PathBuf,
    /// Path relative to the asset root, `/`-separated.
    pub relative_path: String,
    /// Output size in bytes; zero unless the variant succeeded.
    pub size: u64,
    pub status: VariantStatus,
    pub error: Option<String>,
    /// Output is larger than the profile's `max_size_kb`.
    pub oversize: bool,
}

impl DerivedVariant {
    pub fn cached(
        kind: VariantKind,
        path: PathBuf,
        relative_path: String,
        size: u64,
        oversize: bool,
    ) -> Self {
        Self {
            kind,
            path,
            relative_path,
            size,
            status: VariantStatus::Cached,
            error: None,
            oversize,
        }
    }

    pub fn encoded(
        kind: VariantKind,
        path: PathBuf,
        relative_path: String,
        size: u64,
        oversize: bool,
    ) -> Self {
        Self {
            kind,
            path,
            relative_path,
            size,
            status: VariantStatus::Encoded,
            error: None,
            oversize,
        }
    }

    pub fn failed(
        kind: VariantKind,
        path: PathBuf,
        relative_path: String,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path,
            relative_path,
            size: 0,
            status: VariantStatus::Failed,
            error: Some(reason.into()),
            oversize: false,
        }
    }

    pub fn skipped(
        kind: VariantKind,
        path: PathBuf,
        relative_path: String,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path,
            relative_path,
            size: 0,
            status: VariantStatus::Skipped,
            error: Some(reason.into()),
            oversize: false,
        }
    }

    /// True when a usable output file exists for this variant.
    pub fn success(&self) -> bool {
        matches!(self.status, VariantStatus::Cached | VariantStatus::Encoded)
    }
}

/// Both variant outcomes for one source, in scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutcome {
    pub source: SourceImage,
    pub thumbnail: DerivedVariant,
    pub full: DerivedVariant,
}

impl ImageOutcome {
    pub fn variant(&self, kind: VariantKind) -> &DerivedVariant {
        match kind {
            VariantKind::Thumbnail => &self.thumbnail,
            VariantKind::Full => &self.full,
        }
    }
}
