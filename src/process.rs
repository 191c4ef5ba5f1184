//! Producing derived variants from source images.
//!
//! Stage 3 of the pipeline. For each source the [`Transcoder`] produces a
//! thumbnail, then a full rendition, each written next to the source:
//!
//! ```text
//! travel/
//! ├── beach.jpg            source
//! ├── beach_thumb.webp     600px wide, q75
//! └── beach_full.webp      at most 2400px wide, q85
//! ```
//!
//! ## Resizing
//!
//! - **Thumbnail**: always resized to the profile width, height proportional.
//! - **Full**: resized only when the source is wider than the profile width.
//!   Narrower sources are re-encoded at their own size. If the source width
//!   cannot be read, the resize is requested anyway.
//!
//! ## Atomic outputs
//!
//! The codec writes to a hidden sibling (`.beach_thumb.webp.tmp`) which is
//! renamed over the target only after a successful encode. An interrupted or
//! failed encode therefore never leaves a partial file that a later run would
//! mistake for a current output. Temp files orphaned by a killed process are
//! removed by the reconciler.
//!
//! ## Size budget
//!
//! An output larger than the profile's `max_size_kb` is flagged as
//! oversize, whether it was just encoded or reused from an earlier run.
//! When the profile has a `fallback_quality`, an over-budget encode is
//! redone once at that quality through the same temp-and-rename path.
//!
//! ## Failures
//!
//! Nothing here is fatal. A failed encode becomes a
//! [`DerivedVariant`] with [`VariantStatus::Failed`](crate::types::VariantStatus)
//! and a reason; the caller carries on with the next variant.

use crate::cache;
use crate::codec::{Codec, CodecError, EncodeParams};
use crate::naming::{self, NamingConvention};
use crate::types::{
    DerivedVariant, ImageOutcome, Profiles, ResizeMode, SourceImage, VariantKind, VariantProfile,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Produces derived variants through a [`Codec`].
///
/// Holds only shared references, so one transcoder can be used from every
/// worker of a pool.
pub struct Transcoder<'a, C: Codec + ?Sized> {
    codec: &'a C,
    naming: &'a NamingConvention,
    force: bool,
}

impl<'a, C: Codec + ?Sized> Transcoder<'a, C> {
    pub fn new(codec: &'a C, naming: &'a NamingConvention) -> Self {
        Self {
            codec,
            naming,
            force: false,
        }
    }

    /// Re-encode even when the existing output is current.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Absolute and root-relative path of a source's derived file.
    pub fn target_path(&self, source: &SourceImage, kind: VariantKind) -> (PathBuf, String) {
        let name = self.naming.derived_file_name(&source.name, kind);
        let path = match source.path.parent() {
            Some(dir) => dir.join(&name),
            None => PathBuf::from(&name),
        };
        let relative = match source.relative_dir() {
            "" => name,
            dir => format!("{dir}/{name}"),
        };
        (path, relative)
    }

    /// Produce one variant, reusing a current output when allowed.
    pub fn produce(&self, source: &SourceImage, profile: &VariantProfile) -> DerivedVariant {
        let (path, relative) = self.target_path(source, profile.kind);

        if !self.force
            && cache::is_current(&path, source.modified)
            && let Ok(meta) = fs::metadata(&path)
        {
            debug!("{} is current, skipping encode", relative);
            let size = meta.len();
            return DerivedVariant::cached(
                profile.kind,
                path,
                relative,
                size,
                profile.exceeds_budget(size),
            );
        }

        let params = EncodeParams {
            source: source.path.clone(),
            output: temp_path(&path),
            width: self.target_width(source, profile),
            quality: profile.quality,
        };

        let result = self
            .encode_atomically(&params, &path)
            .map(|size| self.fit_budget(&params, &path, &relative, profile, size));
        match result {
            Ok(size) => {
                let oversize = profile.exceeds_budget(size);
                if oversize {
                    warn!(
                        "{} is {} KB, over the {} KB {} budget",
                        relative,
                        size.div_ceil(1024),
                        profile.max_size_kb,
                        profile.kind
                    );
                }
                DerivedVariant::encoded(profile.kind, path, relative, size, oversize)
            }
            Err(e) => {
                warn!("{} {} failed: {}", source.relative_path, profile.kind, e);
                DerivedVariant::failed(profile.kind, path, relative, e.to_string())
            }
        }
    }

    /// Thumbnail then full, sequentially. A failed thumbnail does not stop the full.
    pub fn process_source(&self, source: &SourceImage, profiles: &Profiles) -> ImageOutcome {
        ImageOutcome {
            source: source.clone(),
            thumbnail: self.produce(source, &profiles.thumbnail),
            full: self.produce(source, &profiles.full),
        }
    }

    /// Outcome for a source that is not processed at all.
    pub fn skip(&self, source: &SourceImage, reason: &str) -> ImageOutcome {
        let skipped = |kind| {
            let (path, relative) = self.target_path(source, kind);
            DerivedVariant::skipped(kind, path, relative, reason)
        };
        ImageOutcome {
            source: source.clone(),
            thumbnail: skipped(VariantKind::Thumbnail),
            full: skipped(VariantKind::Full),
        }
    }

    fn target_width(&self, source: &SourceImage, profile: &VariantProfile) -> Option<u32> {
        match profile.resize_mode() {
            ResizeMode::Exact => Some(profile.width),
            ResizeMode::AtMost => match self.codec.identify(&source.path) {
                Ok(dims) if dims.width <= profile.width => None,
                Ok(_) => Some(profile.width),
                Err(e) => {
                    debug!("{}; resizing to {}px", e, profile.width);
                    Some(profile.width)
                }
            },
        }
    }

    /// Second encode at the profile's fallback quality for an over-budget output.
    ///
    /// Returns the size of whatever ends up at `target`. A failed retry keeps
    /// the first output.
    fn fit_budget(
        &self,
        params: &EncodeParams,
        target: &Path,
        relative: &str,
        profile: &VariantProfile,
        size: u64,
    ) -> u64 {
        let Some(fallback) = profile.fallback_quality else {
            return size;
        };
        if !profile.exceeds_budget(size) || fallback.value() >= params.quality.value() {
            return size;
        }
        info!(
            "{} is {} KB, re-encoding at quality {}",
            relative,
            size.div_ceil(1024),
            fallback.value()
        );
        let retry = EncodeParams {
            quality: fallback,
            ..params.clone()
        };
        match self.encode_atomically(&retry, target) {
            Ok(smaller) => smaller,
            Err(e) => {
                warn!("{} re-encode failed, keeping first output: {}", relative, e);
                size
            }
        }
    }

    /// Encode into the temp path, then move it onto `target`. Returns the output size.
    fn encode_atomically(&self, params: &EncodeParams, target: &Path) -> Result<u64, CodecError> {
        let result = self.codec.encode(params).and_then(|()| {
            if !params.output.is_file() {
                return Err(CodecError::MissingOutput(target.to_path_buf()));
            }
            fs::rename(&params.output, target)?;
            Ok(fs::metadata(target)?.len())
        });
        if result.is_err() {
            let _ = fs::remove_file(&params.output);
        }
        result
    }
}

/// Hidden sibling used while encoding: `dir/.name.tmp`.
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(naming::partial_file_name(&name))
}
