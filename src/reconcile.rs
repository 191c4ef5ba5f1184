//! Removal of duplicate derived artifacts.
//!
//! Stage 1 of the pipeline. Earlier versions of the site tooling treated
//! derived files as sources on a re-run and produced compounded names:
//!
//! ```text
//! beach_thumb.webp              keep
//! beach_thumb_thumb.webp        duplicate
//! beach_thumb_full.webp         duplicate
//! beach_full_full_thumb.webp    duplicate
//! ```
//!
//! This module finds every such file (see
//! [`FileClass::Duplicate`](crate::naming::FileClass)) and deletes it, so that
//! each source has at most one thumbnail and one full rendition on disk.
//! Encoder temp files orphaned by a killed run
//! ([`FileClass::Partial`](crate::naming::FileClass), `.beach_thumb.webp.tmp`)
//! are removed in the same pass.
//!
//! A deletion that fails is logged and reported; the rest continue.

use crate::naming::{FileClass, NamingConvention};
use crate::scan::{ExcludeSet, scan};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A derived file violating the one-thumbnail/one-full invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateArtifact {
    pub path: PathBuf,
    pub relative_path: String,
    pub name: String,
    pub size: u64,
}

/// What a reconcile pass found and removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub found: usize,
    pub deleted: Vec<DuplicateArtifact>,
    /// Artifacts that could not be removed, with the reason.
    pub failures: Vec<(DuplicateArtifact, String)>,
}

impl ReconcileReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    /// Bytes freed by successful deletions only.
    pub fn bytes_reclaimed(&self) -> u64 {
        self.deleted.iter().map(|d| d.size).sum()
    }
}

/// Every duplicate artifact and orphaned temp file under `root`, in scan
/// order. Deletes nothing.
pub fn find_duplicates(
    root: &Path,
    exclude: &ExcludeSet,
    naming: &NamingConvention,
) -> Vec<DuplicateArtifact> {
    scan(root, exclude)
        .filter(|entry| {
            !entry.is_dir
                && matches!(
                    naming.classify(&entry.name),
                    FileClass::Duplicate | FileClass::Partial
                )
        })
        .map(|entry| DuplicateArtifact {
            path: entry.path,
            relative_path: entry.relative_path,
            name: entry.name,
            size: entry.size,
        })
        .collect()
}

/// Delete each artifact, collecting successes and failures.
pub fn remove_all(duplicates: Vec<DuplicateArtifact>) -> ReconcileReport {
    let mut report = ReconcileReport {
        found: duplicates.len(),
        ..ReconcileReport::default()
    };
    for dup in duplicates {
        match fs::remove_file(&dup.path) {
            Ok(()) => {
                debug!("deleted duplicate {}", dup.relative_path);
                report.deleted.push(dup);
            }
            Err(e) => {
                warn!("could not delete {}: {}", dup.relative_path, e);
                report.failures.push((dup, e.to_string()));
            }
        }
    }
    report
}

/// Find and delete all duplicate artifacts under `root`.
pub fn reconcile(root: &Path, exclude: &ExcludeSet, naming: &NamingConvention) -> ReconcileReport {
    remove_all(find_duplicates(root, exclude, naming))
}
