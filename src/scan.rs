//! Directory tree traversal and source discovery.
//!
//! Stage 2 of the pipeline (after duplicate reconciliation). Walks the asset
//! root and yields one [`ScanEntry`] per file and directory. Traversal uses
//! an explicit work stack, so deep trees never grow the call stack.
//!
//! ## Order
//!
//! Within a directory, children are sorted by name. Files are yielded first,
//! then each subdirectory followed by its contents (preorder):
//!
//! ```text
//! assets/
//! ├── b.jpg          1
//! ├── z.png          2
//! ├── a/             3
//! │   └── x.jpg      4
//! └── c/             5
//!     └── y.jpg      6
//! ```
//!
//! ## Exclusions
//!
//! Directory names in the [`ExcludeSet`] are dropped before they are queued,
//! at any depth. Nothing inside them is ever read.
//!
//! ## Errors
//!
//! An unreadable directory or entry is logged and skipped; its siblings are
//! still scanned. Symlinks are followed. Cycles are not detected.

use crate::naming::{self, FileClass, NamingConvention};
use crate::types::{SourceImage, media_type_for_extension};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// One filesystem entry found during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEntry {
    /// Path relative to the scan root, `/`-separated.
    pub relative_path: String,
    pub path: PathBuf,
    /// Bare file or directory name.
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
}

/// Directory names that are never visited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExcludeSet(HashSet<String>);

impl ExcludeSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }
}

impl FromIterator<String> for ExcludeSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for ExcludeSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Lazy preorder walk over a directory tree.
///
/// Created by [`scan`]. Each pending directory is expanded only when the
/// entries before it have been consumed.
pub struct Walk<'a> {
    root: PathBuf,
    exclude: &'a ExcludeSet,
    /// Directories still to expand, with the entry to yield on arrival.
    pending_dirs: Vec<(PathBuf, Option<ScanEntry>)>,
    ready: VecDeque<ScanEntry>,
}

impl Walk<'_> {
    /// Read one directory: queue its files, stack its subdirectories.
    fn expand(&mut self, dir: &Path) {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) => {
                warn!("skipping unreadable directory {}: {}", dir.display(), e);
                return;
            }
        };

        let mut children: Vec<(String, PathBuf)> = Vec::new();
        for item in read {
            match item {
                Ok(item) => {
                    let name = item.file_name().to_string_lossy().into_owned();
                    children.push((name, item.path()));
                }
                Err(e) => warn!("skipping unreadable entry in {}: {}", dir.display(), e),
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));

        let mut subdirs = Vec::new();
        for (name, path) in children {
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            if meta.is_dir() && self.exclude.contains(&name) {
                continue;
            }
            let Some(entry) = self.entry(name, path.clone(), &meta) else {
                continue;
            };
            if entry.is_dir {
                subdirs.push((path, Some(entry)));
            } else {
                self.ready.push_back(entry);
            }
        }

        // Stack pops from the end; reverse so the first name is visited first.
        self.pending_dirs.extend(subdirs.into_iter().rev());
    }

    fn entry(&self, name: String, path: PathBuf, meta: &fs::Metadata) -> Option<ScanEntry> {
        let relative_path = relative_slash_path(&self.root, &path)?;
        let modified = match meta.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!("skipping {}: no modification time: {}", path.display(), e);
                return None;
            }
        };
        Some(ScanEntry {
            relative_path,
            path,
            name,
            size: if meta.is_dir() { 0 } else { meta.len() },
            modified,
            is_dir: meta.is_dir(),
        })
    }
}

impl Iterator for Walk<'_> {
    type Item = ScanEntry;

    fn next(&mut self) -> Option<ScanEntry> {
        loop {
            if let Some(entry) = self.ready.pop_front() {
                return Some(entry);
            }
            let (dir, entry) = self.pending_dirs.pop()?;
            if let Some(entry) = entry {
                self.ready.push_back(entry);
            }
            self.expand(&dir);
        }
    }
}

/// Walk `root`, skipping excluded directory names at any depth.
///
/// A missing or unreadable root yields nothing; callers that need the root
/// to exist check it first.
pub fn scan<'a>(root: &Path, exclude: &'a ExcludeSet) -> Walk<'a> {
    Walk {
        root: root.to_path_buf(),
        exclude,
        pending_dirs: vec![(root.to_path_buf(), None)],
        ready: VecDeque::new(),
    }
}

/// All source images under `root`, in scan order.
pub fn discover_sources(
    root: &Path,
    exclude: &ExcludeSet,
    naming: &NamingConvention,
) -> Vec<SourceImage> {
    scan(root, exclude)
        .filter(|entry| !entry.is_dir && naming.classify(&entry.name) == FileClass::Source)
        .map(|entry| {
            let ext = naming::extension(&entry.name).unwrap_or_default();
            SourceImage {
                media_type: media_type_for_extension(&ext),
                name: entry.name,
                relative_path: entry.relative_path,
                path: entry.path,
                size: entry.size,
                modified: entry.modified,
            }
        })
        .collect()
}

/// `path` relative to `root` with `/` separators on every platform.
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn default_exclude() -> ExcludeSet {
        PipelineConfig::default().exclude_set()
    }

    fn relative_paths(root: &Path, exclude: &ExcludeSet) -> Vec<String> {
        scan(root, exclude).map(|e| e.relative_path).collect()
    }

    // =========================================================================
    // Traversal order
    // =========================================================================

    #[test]
    fn files_before_subdirectories_in_name_order() {
        let tmp = TempDir::new().unwrap();
        for rel in ["z.png", "b.jpg", "c/y.jpg", "a/x.jpg"] {
            write_file(tmp.path(), rel, b"x");
        }

        assert_eq!(
            relative_paths(tmp.path(), &ExcludeSet::default()),
            vec!["b.jpg", "z.png", "a", "a/x.jpg", "c", "c/y.jpg"]
        );
    }

    #[test]
    fn nested_directories_are_preorder() {
        let tmp = TempDir::new().unwrap();
        for rel in ["a/b/c/deep.jpg", "a/top.jpg", "b/other.jpg"] {
            write_file(tmp.path(), rel, b"x");
        }

        assert_eq!(
            relative_paths(tmp.path(), &ExcludeSet::default()),
            vec![
                "a",
                "a/top.jpg",
                "a/b",
                "a/b/c",
                "a/b/c/deep.jpg",
                "b",
                "b/other.jpg"
            ]
        );
    }

    #[test]
    fn entries_carry_size_and_kind() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "album/beach.jpg", b"12345");

        let entries: Vec<ScanEntry> = scan(tmp.path(), &ExcludeSet::default()).collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].name, "album");
        assert!(!entries[1].is_dir);
        assert_eq!(entries[1].size, 5);
        assert_eq!(entries[1].path, tmp.path().join("album").join("beach.jpg"));
    }

    #[test]
    fn missing_root_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let exclude = ExcludeSet::default();
        assert_eq!(scan(&tmp.path().join("nope"), &exclude).count(), 0);
    }

    // =========================================================================
    // Exclusions
    // =========================================================================

    #[test]
    fn excluded_directories_skipped_at_any_depth() {
        let tmp = TempDir::new().unwrap();
        for rel in [
            "keep.jpg",
            "raw/secret.jpg",
            "travel/node_modules/pkg.png",
            "travel/__MACOSX/._beach.jpg",
            "travel/beach.jpg",
        ] {
            write_file(tmp.path(), rel, b"x");
        }

        let paths = relative_paths(tmp.path(), &default_exclude());
        assert_eq!(paths, vec!["keep.jpg", "travel", "travel/beach.jpg"]);
    }

    #[test]
    fn exclusion_matches_directories_not_files() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "raw", b"a file named raw");

        let paths = relative_paths(tmp.path(), &default_exclude());
        assert_eq!(paths, vec!["raw"]);
    }

    // =========================================================================
    // Source discovery
    // =========================================================================

    #[test]
    fn discover_sources_skips_derived_and_unsupported() {
        let tmp = TempDir::new().unwrap();
        for rel in [
            "beach.jpg",
            "beach_thumb.webp",
            "beach_full.webp",
            "notes.txt",
            "album/Sunset.PNG",
            "album/sunset_thumb_thumb.webp",
        ] {
            write_file(tmp.path(), rel, b"x");
        }
        let config = test_config(tmp.path());

        let sources = discover_sources(tmp.path(), &config.exclude_set(), &config.naming());
        let names: Vec<&str> = sources.iter().map(|s| s.relative_path.as_str()).collect();
        assert_eq!(names, vec!["beach.jpg", "album/Sunset.PNG"]);
        assert_eq!(sources[0].media_type, "image/jpeg");
        assert_eq!(sources[1].media_type, "image/png");
        assert_eq!(sources[1].name, "Sunset.PNG");
    }

    #[test]
    fn webp_originals_are_sources() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "photo.webp", b"x");
        let config = test_config(tmp.path());

        let sources = discover_sources(tmp.path(), &config.exclude_set(), &config.naming());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].media_type, "image/webp");
    }

    #[test]
    fn discovery_matches_independent_walk() {
        let tmp = TempDir::new().unwrap();
        for rel in ["a/1.jpg", "a/b/2.png", "c/3.jpeg", "4.webp", "thumbs/5.jpg"] {
            write_file(tmp.path(), rel, b"x");
        }
        let config = test_config(tmp.path());

        let mut found: Vec<String> =
            discover_sources(tmp.path(), &config.exclude_set(), &config.naming())
                .into_iter()
                .map(|s| s.name)
                .collect();
        found.sort();

        let mut expected: Vec<String> = file_names(tmp.path())
            .into_iter()
            .filter(|n| n != "5.jpg")
            .collect();
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn relative_slash_path_joins_components() {
        let root = Path::new("/assets");
        assert_eq!(
            relative_slash_path(root, &root.join("a").join("b.jpg")).as_deref(),
            Some("a/b.jpg")
        );
        assert_eq!(relative_slash_path(root, Path::new("/elsewhere/x")), None);
    }
}
