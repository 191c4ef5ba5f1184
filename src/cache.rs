//! Staleness checks for incremental builds.
//!
//! Encoding is the slow part of a run. This module lets the transcoder skip
//! the codec when a derived file is already up to date.
//!
//! # Rule
//!
//! A derived file is **current** when it exists and its modification time is
//! strictly newer than its source's. Nothing else is compared: no content
//! hashes, no record of the encoding parameters.
//!
//! Consequences worth knowing:
//!
//! - Changing a profile (width, quality) does not invalidate existing
//!   outputs. Use `--force` after editing the config.
//! - Restoring an older source over a newer output (e.g. `git checkout`) is
//!   invisible until the source is touched.
//! - A file with equal timestamps is treated as stale.
//!
//! ## Bypassing the cache
//!
//! Pass `--force` to `build` to re-encode every variant. Existing outputs
//! are replaced in place.

use crate::types::{DerivedVariant, VariantStatus};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// True if `derived` exists and was modified strictly after `source_mtime`.
///
/// Any error reading the derived file's metadata counts as "not current",
/// which makes the caller re-encode.
pub fn is_current(derived: &Path, source_mtime: SystemTime) -> bool {
    fs::metadata(derived)
        .and_then(|meta| meta.modified())
        .map(|derived_mtime| derived_mtime > source_mtime)
        .unwrap_or(false)
}

/// Per-run variant counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub failures: u32,
    pub skipped: u32,
}

impl CacheStats {
    pub fn record(&mut self, variant: &DerivedVariant) {
        match variant.status {
            VariantStatus::Cached => self.hits += 1,
            VariantStatus::Encoded => self.misses += 1,
            VariantStatus::Failed => self.failures += 1,
            VariantStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.attempted() + self.skipped
    }

    /// Variants that reached the cache check or the codec.
    pub fn attempted(&self) -> u32 {
        self.hits + self.misses + self.failures
    }

    pub fn succeeded(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(f, "{} cached, {} encoded", self.hits, self.misses)?;
        } else {
            write!(f, "{} encoded", self.misses)?;
        }
        if self.failures > 0 {
            write!(f, ", {} failed", self.failures)?;
        }
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.hits > 0 || self.failures > 0 || self.skipped > 0 {
            write!(f, " ({} total)", self.total())?;
        }
        Ok(())
    }
}
