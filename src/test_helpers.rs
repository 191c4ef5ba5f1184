//! Shared test utilities for the folio-assets test suite.
//!
//! Builds throwaway asset trees and controls file timestamps so staleness
//! can be tested without sleeping.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let src = write_file(tmp.path(), "travel/beach.jpg", b"jpeg");
//! set_mtime(&src, hours_ago(2));
//!
//! let config = test_config(tmp.path());
//! assert_eq!(file_names(tmp.path()), vec!["beach.jpg"]);
//! ```

use crate::config::PipelineConfig;
use crate::naming;
use crate::types::{SourceImage, media_type_for_extension};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

// =========================================================================
// Fixture trees
// =========================================================================

/// Write `contents` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Stock config rooted at `root`.
pub fn test_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        assets_dir: root.to_path_buf(),
        ..PipelineConfig::default()
    }
}

/// Build a [`SourceImage`] for an existing file under `root`.
pub fn source_image(root: &Path, rel: &str) -> SourceImage {
    let path = root.join(rel);
    let meta = fs::metadata(&path)
        .unwrap_or_else(|e| panic!("fixture {rel} missing: {e}"));
    let name = rel.rsplit('/').next().unwrap().to_string();
    let ext = naming::extension(&name).unwrap_or_default();
    SourceImage {
        media_type: media_type_for_extension(&ext),
        name,
        relative_path: rel.to_string(),
        path,
        size: meta.len(),
        modified: meta.modified().unwrap(),
    }
}

// =========================================================================
// Timestamps
// =========================================================================

pub fn hours_ago(hours: u64) -> SystemTime {
    SystemTime::now() - Duration::from_secs(hours * 3600)
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, when: SystemTime) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(when).unwrap();
}

/// A file's modification time.
pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

// =========================================================================
// Snapshots (independent of the scanner under test)
// =========================================================================

/// Names of all regular files under `root`, sorted.
pub fn file_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Relative `/`-separated paths of all regular files under `root`, sorted.
pub fn relative_files(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| crate::scan::relative_slash_path(root, e.path()))
        .collect();
    paths.sort();
    paths
}
