//! End-to-end runs of the build pipeline over temporary asset trees.
//!
//! Uses a fake codec that copies the source bytes to the output, so these
//! tests need no `cwebp` binary. See `cwebp_process.rs` for the real
//! process plumbing.

use folio_assets::codec::{Codec, CodecError, EncodeParams};
use folio_assets::config::{PipelineConfig, resolve_config};
use folio_assets::manifest::Manifest;
use folio_assets::naming::FileClass;
use folio_assets::pipeline::{CancelToken, Pipeline, PipelineError, PipelineState, RunOptions};
use folio_assets::reconcile::find_duplicates;
use folio_assets::scan::scan;
use folio_assets::types::VariantStatus;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// =========================================================================
// Fake codec
// =========================================================================

#[derive(Default)]
struct FakeCodec {
    encodes: Mutex<Vec<(String, Option<u32>)>>,
    fail_outputs: Vec<&'static str>,
    absent: bool,
    /// Fired on the first encode, as an interrupt arriving mid-run would be.
    cancel_on_encode: Option<CancelToken>,
}

impl FakeCodec {
    fn failing(pattern: &'static str) -> Self {
        Self {
            fail_outputs: vec![pattern],
            ..Self::default()
        }
    }

    fn absent() -> Self {
        Self {
            absent: true,
            ..Self::default()
        }
    }

    fn encode_count(&self) -> usize {
        self.encodes.lock().unwrap().len()
    }

    fn width_for(&self, output_fragment: &str) -> Option<u32> {
        self.encodes
            .lock()
            .unwrap()
            .iter()
            .find(|(out, _)| out.contains(output_fragment))
            .and_then(|(_, width)| *width)
    }
}

impl Codec for FakeCodec {
    fn name(&self) -> &str {
        "fake"
    }

    fn probe(&self) -> Result<(), CodecError> {
        if self.absent {
            return Err(CodecError::NotFound {
                program: "cwebp".into(),
            });
        }
        Ok(())
    }

    fn encode(&self, params: &EncodeParams) -> Result<(), CodecError> {
        let output = params.output.to_string_lossy().into_owned();
        self.encodes
            .lock()
            .unwrap()
            .push((output.clone(), params.width));
        if self.fail_outputs.iter().any(|p| output.contains(p)) {
            return Err(CodecError::Failed {
                status: "exit status: 255".into(),
                stderr: "Could not process file".into(),
            });
        }
        if let Some(cancel) = &self.cancel_on_encode {
            cancel.cancel();
        }
        fs::copy(&params.source, &params.output)?;
        Ok(())
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn write_file(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

/// Backdate a file so outputs written now are strictly newer.
fn backdate(path: &Path) {
    let file = fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
}

fn snapshot(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

fn config_for(root: &Path) -> PipelineConfig {
    PipelineConfig {
        assets_dir: root.to_path_buf(),
        ..PipelineConfig::default()
    }
}

fn sequential() -> RunOptions {
    RunOptions {
        force: false,
        threads: 1,
    }
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn single_source_gets_both_variants_and_a_manifest_entry() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "beach.jpg", &[7u8; 3000]);
    let config = config_for(tmp.path());
    let codec = FakeCodec::default();

    let report = Pipeline::new(&config, &codec)
        .with_options(sequential())
        .run();

    assert_eq!(report.state, PipelineState::Done);
    assert_eq!(
        snapshot(tmp.path()),
        vec!["beach.jpg", "beach_full.webp", "beach_thumb.webp", "image-info.json"]
    );

    let manifest = Manifest::load(&tmp.path().join("image-info.json")).unwrap();
    assert_eq!(manifest.total_images, 1);
    assert_eq!(manifest.thumbnails, 1);
    assert_eq!(manifest.full_size, 1);
    let entry = &manifest.images[0];
    assert_eq!(entry.original.name, "beach.jpg");
    assert_eq!(entry.original.size, 3000);
    assert_eq!(entry.original.size_kb, 3);
    assert_eq!(entry.original.media_type, "image/jpeg");
    assert_eq!(entry.thumbnail.as_ref().unwrap().path, "beach_thumb.webp");
    assert_eq!(entry.full_size.as_ref().unwrap().path, "beach_full.webp");
    assert_eq!(entry.full_size.as_ref().unwrap().size, 3000);
}

#[test]
fn second_run_over_unchanged_tree_encodes_nothing() {
    let tmp = TempDir::new().unwrap();
    for rel in ["a.jpg", "travel/b.png", "travel/2024/c.jpeg"] {
        backdate(&write_file(tmp.path(), rel, b"pixels"));
    }
    let config = config_for(tmp.path());

    let first_codec = FakeCodec::default();
    let first = Pipeline::new(&config, &first_codec).run();
    assert!(first.succeeded());
    assert_eq!(first_codec.encode_count(), 6);
    let files_after_first = snapshot(tmp.path());
    let manifest_first = Manifest::load(&first.manifest_path).unwrap();

    let second_codec = FakeCodec::default();
    let second = Pipeline::new(&config, &second_codec).run();

    assert!(second.succeeded());
    assert_eq!(second_codec.encode_count(), 0);
    assert_eq!(second.cache.hits, 6);
    assert_eq!(second.cache.misses, 0);
    assert_eq!(snapshot(tmp.path()), files_after_first);

    let manifest_second = Manifest::load(&second.manifest_path).unwrap();
    assert_eq!(
        Manifest {
            generated_at: String::new(),
            ..manifest_first
        },
        Manifest {
            generated_at: String::new(),
            ..manifest_second
        }
    );
}

#[test]
fn empty_tree_writes_empty_manifest_without_encoding() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "readme.txt", b"no images here");
    let config = config_for(tmp.path());
    let codec = FakeCodec::default();

    let report = Pipeline::new(&config, &codec).run();

    assert!(report.succeeded());
    assert_eq!(codec.encode_count(), 0);
    let manifest = Manifest::load(&report.manifest_path).unwrap();
    assert_eq!(manifest.total_images, 0);
    assert!(manifest.images.is_empty());
}

#[test]
fn missing_codec_leaves_filesystem_untouched() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "beach.jpg", b"x");
    write_file(tmp.path(), "beach_thumb_thumb.webp", b"left-over");
    let before = snapshot(tmp.path());
    let config = config_for(tmp.path());

    let report = Pipeline::new(&config, &FakeCodec::absent()).run();

    assert!(matches!(report.state, PipelineState::Failed(_)));
    assert!(matches!(report.error, Some(PipelineError::Codec(_))));
    let message = report.error.unwrap().to_string();
    assert!(message.contains("brew install webp"), "{message}");
    assert_eq!(snapshot(tmp.path()), before);
}

#[test]
fn missing_root_is_a_precondition_failure() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(&tmp.path().join("dist/assets"));

    let report = Pipeline::new(&config, &FakeCodec::default()).run();

    assert!(matches!(report.error, Some(PipelineError::MissingRoot(_))));
    assert!(snapshot(tmp.path()).is_empty());
}

#[test]
fn failed_thumbnail_is_null_and_run_still_completes() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "beach.jpg", b"x");
    let config = config_for(tmp.path());
    let codec = FakeCodec::failing("_thumb");

    let report = Pipeline::new(&config, &codec).run();

    assert_eq!(report.state, PipelineState::Done);
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report.manifest_path).unwrap()).unwrap();
    assert!(json["images"][0]["thumbnail"].is_null());
    assert_eq!(json["images"][0]["fullSize"]["path"], "beach_full.webp");
    assert_eq!(json["thumbnails"], 0);
    assert_eq!(json["fullSize"], 1);
    assert!(!tmp.path().join("beach_thumb.webp").exists());
}

#[test]
fn duplicates_are_gone_after_a_run() {
    let tmp = TempDir::new().unwrap();
    for rel in [
        "beach.jpg",
        "beach_thumb_thumb.webp",
        "beach_full_full.webp",
        "nested/sunset.jpg",
        "nested/sunset_thumb_full.webp",
        "nested/sunset_full_thumb_thumb.webp",
    ] {
        write_file(tmp.path(), rel, b"x");
    }
    let config = config_for(tmp.path());

    let report = Pipeline::new(&config, &FakeCodec::default()).run();

    assert_eq!(report.reconcile.deleted_count(), 4);
    let naming = config.naming();
    let exclude = config.exclude_set();
    assert!(find_duplicates(tmp.path(), &exclude, &naming).is_empty());
    for entry in scan(tmp.path(), &exclude) {
        assert_ne!(naming.classify(&entry.name), FileClass::Duplicate);
    }
    assert_eq!(
        snapshot(tmp.path()),
        vec![
            "beach.jpg",
            "beach_full.webp",
            "beach_thumb.webp",
            "image-info.json",
            "nested/sunset.jpg",
            "nested/sunset_full.webp",
            "nested/sunset_thumb.webp",
        ]
    );
}

#[test]
fn excluded_directories_are_never_touched() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "raw/DSC0001.jpg", b"x");
    write_file(tmp.path(), "thumbs/old_thumb_thumb.webp", b"x");
    write_file(tmp.path(), "album/node_modules/pkg.png", b"x");
    write_file(tmp.path(), "album/keep.jpg", b"x");
    let config = config_for(tmp.path());

    let report = Pipeline::new(&config, &FakeCodec::default()).run();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].source.relative_path, "album/keep.jpg");
    assert!(tmp.path().join("thumbs/old_thumb_thumb.webp").exists());
    assert!(!tmp.path().join("raw/DSC0001_thumb.webp").exists());
}

#[test]
fn full_rendition_never_upscales_real_images() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("gallery")).unwrap();
    image::RgbImage::new(800, 10)
        .save(tmp.path().join("gallery/narrow.png"))
        .unwrap();
    image::RgbImage::new(3000, 10)
        .save(tmp.path().join("gallery/wide.png"))
        .unwrap();
    let config = config_for(tmp.path());
    let codec = FakeCodec::default();

    let report = Pipeline::new(&config, &codec).run();

    assert!(report.succeeded());
    assert_eq!(codec.width_for("narrow_full"), None);
    assert_eq!(codec.width_for("wide_full"), Some(2400));
    assert_eq!(codec.width_for("narrow_thumb"), Some(600));
}

#[test]
fn custom_suffixes_and_manifest_location_from_config() {
    let tmp = TempDir::new().unwrap();
    let assets = tmp.path().join("public");
    write_file(&assets, "beach.jpg", b"x");
    write_file(&assets, "beach_sm_sm.webp", b"dup");
    let overlay: toml::Value = toml::from_str(&format!(
        r#"
assets_dir = "{}"
manifest = "../meta/images.json"

[thumbnail]
suffix = "_sm"

[full]
suffix = "_lg"
"#,
        assets.display().to_string().replace('\\', "/")
    ))
    .unwrap();
    let config = resolve_config(Some(overlay)).unwrap();

    let report = Pipeline::new(&config, &FakeCodec::default()).run();

    assert!(report.succeeded());
    assert_eq!(
        snapshot(&assets),
        vec!["beach.jpg", "beach_lg.webp", "beach_sm.webp"]
    );
    let manifest = Manifest::load(&tmp.path().join("meta/images.json")).unwrap();
    assert_eq!(
        manifest.images[0].thumbnail.as_ref().unwrap().path,
        "beach_sm.webp"
    );
}

#[test]
fn force_re_encodes_current_outputs() {
    let tmp = TempDir::new().unwrap();
    backdate(&write_file(tmp.path(), "a.jpg", b"x"));
    let config = config_for(tmp.path());
    Pipeline::new(&config, &FakeCodec::default()).run();

    let codec = FakeCodec::default();
    let report = Pipeline::new(&config, &codec)
        .with_options(RunOptions {
            force: true,
            threads: 2,
        })
        .run();

    assert!(report.succeeded());
    assert_eq!(codec.encode_count(), 2);
    assert_eq!(report.cache.hits, 0);
}

#[test]
fn cancelled_run_records_sources_as_skipped() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "a.jpg", b"x");
    let config = config_for(tmp.path());
    let cancel = CancelToken::new();
    cancel.cancel();
    let codec = FakeCodec::default();

    let report = Pipeline::new(&config, &codec).with_cancel(cancel).run();

    assert!(report.succeeded());
    assert_eq!(codec.encode_count(), 0);
    let manifest = Manifest::load(&report.manifest_path).unwrap();
    assert_eq!(manifest.total_images, 1);
    assert!(manifest.images[0].thumbnail.is_none());
    assert!(manifest.images[0].full_size.is_none());
}

#[test]
fn cancel_mid_run_finishes_current_source_and_skips_the_rest() {
    let tmp = TempDir::new().unwrap();
    for rel in ["a.jpg", "b.jpg", "c.jpg"] {
        write_file(tmp.path(), rel, b"x");
    }
    let config = config_for(tmp.path());
    let cancel = CancelToken::new();
    let codec = FakeCodec {
        cancel_on_encode: Some(cancel.clone()),
        ..FakeCodec::default()
    };

    let report = Pipeline::new(&config, &codec)
        .with_options(sequential())
        .with_cancel(cancel)
        .run();

    assert!(report.succeeded());
    assert_eq!(codec.encode_count(), 2);
    assert!(report.outcomes[0].thumbnail.success());
    assert!(report.outcomes[0].full.success());
    for outcome in &report.outcomes[1..] {
        assert_eq!(outcome.thumbnail.status, VariantStatus::Skipped);
        assert_eq!(outcome.full.status, VariantStatus::Skipped);
    }
    let manifest = Manifest::load(&report.manifest_path).unwrap();
    assert_eq!(manifest.total_images, 3);
    assert_eq!(manifest.thumbnails, 1);
}

#[test]
fn oversize_outputs_stay_flagged_when_reused() {
    let tmp = TempDir::new().unwrap();
    // Copied verbatim by the fake codec: 300 KB against a 100 KB thumbnail budget
    backdate(&write_file(tmp.path(), "beach.jpg", &vec![0u8; 300 * 1024]));
    let config = config_for(tmp.path());

    let first = Pipeline::new(&config, &FakeCodec::default()).run();
    let codec = FakeCodec::default();
    let second = Pipeline::new(&config, &codec).run();

    assert_eq!(first.oversize(), 1);
    assert_eq!(codec.encode_count(), 0);
    assert_eq!(second.outcomes[0].thumbnail.status, VariantStatus::Cached);
    assert_eq!(second.oversize(), 1);
    assert!(second.outcomes[0].thumbnail.oversize);
    assert!(!second.outcomes[0].full.oversize);
}

#[test]
fn stale_temp_files_from_a_killed_run_are_removed() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "beach.jpg", b"x");
    write_file(tmp.path(), "travel/.dunes_full.webp.tmp", b"half an enc");
    let config = config_for(tmp.path());

    let report = Pipeline::new(&config, &FakeCodec::default()).run();

    assert_eq!(report.reconcile.deleted_count(), 1);
    assert!(!tmp.path().join("travel/.dunes_full.webp.tmp").exists());
}
