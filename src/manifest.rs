//! The `image-info.json` manifest.
//!
//! Final stage of the pipeline. One JSON document describing every source
//! and its derived variants, consumed by the page generator:
//!
//! ```json
//! {
//!   "generatedAt": "2026-10-18T10:00:00.000Z",
//!   "totalImages": 1,
//!   "thumbnails": 1,
//!   "fullSize": 1,
//!   "images": [{
//!     "original":  {"name": "beach.jpg", "path": "beach.jpg", "size": 2400000, "sizeKB": 2344,
//!                   "mediaType": "image/jpeg", "modified": "2026-10-01T08:30:00.000Z"},
//!     "thumbnail": {"path": "beach_thumb.webp", "size": 81234, "sizeKB": 79},
//!     "fullSize":  {"path": "beach_full.webp", "size": 612345, "sizeKB": 598}
//!   }]
//! }
//! ```
//!
//! A variant that was not produced is `null`. Paths are relative to the asset
//! root with `/` separators. The file is rewritten in full on every run.

use crate::types::{DerivedVariant, SourceImage};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_MANIFEST_NAME: &str = "image-info.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(
        "result lists differ in length: {sources} sources, {thumbnails} thumbnails, {fulls} full"
    )]
    LengthMismatch {
        sources: usize,
        thumbnails: usize,
        fulls: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    pub total_images: usize,
    /// Successful thumbnails.
    pub thumbnails: usize,
    /// Successful full renditions.
    pub full_size: usize,
    pub images: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub original: OriginalInfo,
    pub thumbnail: Option<VariantInfo>,
    pub full_size: Option<VariantInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(rename = "sizeKB")]
    pub size_kb: u64,
    pub media_type: String,
    /// Source modification time, RFC 3339 UTC.
    pub modified: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantInfo {
    pub path: String,
    pub size: u64,
    #[serde(rename = "sizeKB")]
    pub size_kb: u64,
}

/// Kilobytes rounded to nearest.
pub fn size_kb(bytes: u64) -> u64 {
    (bytes + 512) / 1024
}

impl From<&SourceImage> for OriginalInfo {
    fn from(source: &SourceImage) -> Self {
        Self {
            name: source.name.clone(),
            path: source.relative_path.clone(),
            size: source.size,
            size_kb: size_kb(source.size),
            media_type: source.media_type.to_string(),
            modified: DateTime::<Utc>::from(source.modified)
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

impl VariantInfo {
    /// `None` unless the variant has a usable output.
    pub fn from_variant(variant: &DerivedVariant) -> Option<Self> {
        variant.success().then(|| Self {
            path: variant.relative_path.clone(),
            size: variant.size,
            size_kb: size_kb(variant.size),
        })
    }
}

impl Manifest {
    /// Zip per-source results, stamped with the current time.
    pub fn from_results(
        sources: &[SourceImage],
        thumbnails: &[DerivedVariant],
        fulls: &[DerivedVariant],
    ) -> Result<Self, ManifestError> {
        Self::from_results_at(sources, thumbnails, fulls, Utc::now())
    }

    pub fn from_results_at(
        sources: &[SourceImage],
        thumbnails: &[DerivedVariant],
        fulls: &[DerivedVariant],
        generated_at: DateTime<Utc>,
    ) -> Result<Self, ManifestError> {
        if thumbnails.len() != sources.len() || fulls.len() != sources.len() {
            return Err(ManifestError::LengthMismatch {
                sources: sources.len(),
                thumbnails: thumbnails.len(),
                fulls: fulls.len(),
            });
        }

        let images: Vec<ManifestEntry> = sources
            .iter()
            .zip(thumbnails)
            .zip(fulls)
            .map(|((source, thumb), full)| ManifestEntry {
                original: source.into(),
                thumbnail: VariantInfo::from_variant(thumb),
                full_size: VariantInfo::from_variant(full),
            })
            .collect();

        Ok(Self {
            generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_images: images.len(),
            thumbnails: images.iter().filter(|e| e.thumbnail.is_some()).count(),
            full_size: images.iter().filter(|e| e.full_size.is_some()).count(),
            images,
        })
    }

    /// Write pretty JSON, creating the parent directory if needed.
    ///
    /// The document goes to a hidden sibling first and is renamed over
    /// `path`, so a failed write leaves the previous manifest in place.
    pub fn write(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let staging = staging_path(path);
        let result = fs::write(&staging, json).and_then(|()| fs::rename(&staging, path));
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        Ok(result?)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_MANIFEST_NAME.to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Build and write a manifest in one step.
pub fn write(
    path: &Path,
    sources: &[SourceImage],
    thumbnails: &[DerivedVariant],
    fulls: &[DerivedVariant],
) -> Result<Manifest, ManifestError> {
    let manifest = Manifest::from_results(sources, thumbnails, fulls)?;
    manifest.write(path)?;
    Ok(manifest)
}
