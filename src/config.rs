//! Pipeline configuration.
//!
//! One [`PipelineConfig`] value is built at startup and passed by reference
//! to every stage; nothing reads configuration from global state.
//!
//! ## Loading
//!
//! Configuration comes from an optional TOML file (`folio-assets.toml` in
//! the working directory by default). The file is sparse: its values are
//! merged over the stock defaults with [`merge_toml`], so it only needs the
//! keys it wants to change. Command-line flags override the merged result.
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! assets_dir = "dist/assets"
//! manifest = "image-info.json"     # relative paths resolve against assets_dir
//! supported_extensions = ["jpg", "jpeg", "png", "webp"]
//! exclude_dirs = ["__MACOSX", ".DS_Store", "node_modules", "raw", "thumbs", "fullsize"]
//! output_extension = "webp"
//!
//! [thumbnail]
//! width = 600           # always resized to this width
//! quality = 75          # 1-100
//! max_size_kb = 100     # informational; larger outputs are flagged
//! suffix = "_thumb"
//!
//! [full]
//! width = 2400          # maximum width; narrower sources keep their size
//! quality = 85
//! max_size_kb = 1000
//! suffix = "_full"
//!
//! [codec]
//! program = "cwebp"
//! timeout_secs = 120
//!
//! [processing]
//! max_processes = 4     # omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::codec::Quality;
use crate::codec::cwebp::DEFAULT_PROGRAM;
use crate::naming::NamingConvention;
use crate::scan::ExcludeSet;
use crate::types::{Profiles, VariantKind, VariantProfile};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "folio-assets.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Complete configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root of the asset tree to scan.
    pub assets_dir: PathBuf,
    /// Manifest location; relative paths resolve against `assets_dir`.
    pub manifest: PathBuf,
    /// Source extensions, matched case-insensitively.
    pub supported_extensions: Vec<String>,
    /// Directory names never visited, at any depth.
    pub exclude_dirs: Vec<String>,
    /// Extension of derived files.
    pub output_extension: String,
    pub thumbnail: ProfileConfig,
    pub full: ProfileConfig,
    pub codec: CodecConfig,
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("dist/assets"),
            manifest: PathBuf::from(crate::manifest::DEFAULT_MANIFEST_NAME),
            supported_extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_dirs: [
                "__MACOSX",
                ".DS_Store",
                "node_modules",
                "raw",
                "thumbs",
                "fullsize",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            output_extension: "webp".to_string(),
            thumbnail: ProfileConfig {
                width: 600,
                quality: 75,
                max_size_kb: 100,
                suffix: "_thumb".to_string(),
                fallback_quality: None,
            },
            full: ProfileConfig {
                width: 2400,
                quality: 85,
                max_size_kb: 1000,
                suffix: "_full".to_string(),
                fallback_quality: None,
            },
            codec: CodecConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (section, profile) in [("thumbnail", &self.thumbnail), ("full", &self.full)] {
            if profile.quality == 0 || profile.quality > 100 {
                return Err(ConfigError::Validation(format!(
                    "{section}.quality must be 1-100"
                )));
            }
            if let Some(fallback) = profile.fallback_quality
                && (fallback == 0 || fallback >= profile.quality)
            {
                return Err(ConfigError::Validation(format!(
                    "{section}.fallback_quality must be at least 1 and below {section}.quality"
                )));
            }
            if profile.width == 0 {
                return Err(ConfigError::Validation(format!(
                    "{section}.width must be non-zero"
                )));
            }
            if profile.suffix.is_empty() || profile.suffix.contains(['.', '/', '\\']) {
                return Err(ConfigError::Validation(format!(
                    "{section}.suffix must be non-empty and must not contain '.', '/' or '\\'"
                )));
            }
        }
        if self.thumbnail.suffix == self.full.suffix {
            return Err(ConfigError::Validation(
                "thumbnail.suffix and full.suffix must differ".into(),
            ));
        }
        if self.supported_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "supported_extensions must not be empty".into(),
            ));
        }
        if self.output_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::Validation(
                "output_extension must not be empty".into(),
            ));
        }
        if self.codec.program.is_empty() {
            return Err(ConfigError::Validation(
                "codec.program must not be empty".into(),
            ));
        }
        if self.codec.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "codec.timeout_secs must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Manifest path resolved against the asset root.
    pub fn manifest_path(&self) -> PathBuf {
        self.assets_dir.join(&self.manifest)
    }

    pub fn naming(&self) -> NamingConvention {
        NamingConvention::from_config(self)
    }

    pub fn exclude_set(&self) -> ExcludeSet {
        self.exclude_dirs.iter().cloned().collect()
    }

    pub fn profiles(&self) -> Profiles {
        Profiles {
            thumbnail: self.thumbnail.to_profile(VariantKind::Thumbnail),
            full: self.full.to_profile(VariantKind::Full),
        }
    }
}

/// Settings for one derived variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Target width (thumbnail) or maximum width (full), in pixels.
    pub width: u32,
    /// WebP quality, 1-100.
    pub quality: u32,
    /// Expected upper bound on output size; exceeding it only warns.
    pub max_size_kb: u64,
    /// Token inserted between the source stem and the extension.
    pub suffix: String,
    /// Quality for a second encode of outputs over `max_size_kb`.
    /// Absent: oversize outputs are kept and reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_quality: Option<u32>,
}

impl ProfileConfig {
    pub fn to_profile(&self, kind: VariantKind) -> VariantProfile {
        VariantProfile {
            kind,
            width: self.width,
            quality: Quality::new(self.quality),
            max_size_kb: self.max_size_kb,
            fallback_quality: self.fallback_quality.map(Quality::new),
        }
    }
}

/// External encoder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Program name (looked up on PATH) or path to the encoder.
    pub program: String,
    /// Per-invocation limit; a hung encoder is killed after this long.
    pub timeout_secs: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            timeout_secs: 120,
        }
    }
}

impl CodecConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel transcoding workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.min(cores))
        .unwrap_or(cores)
        .max(1)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from a TOML file, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# folio-assets configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Root of the asset tree. Derived files are written next to their sources.
assets_dir = "dist/assets"

# Manifest consumed by the page generator. Relative paths resolve
# against assets_dir. Rewritten in full on every run.
manifest = "image-info.json"

# Source image extensions (case-insensitive).
supported_extensions = ["jpg", "jpeg", "png", "webp"]

# Directory names that are never visited, at any depth.
exclude_dirs = ["__MACOSX", ".DS_Store", "node_modules", "raw", "thumbs", "fullsize"]

# Extension of derived files.
output_extension = "webp"

# ---------------------------------------------------------------------------
# Thumbnail variant: <stem>_thumb.webp
# ---------------------------------------------------------------------------
[thumbnail]
# Width in pixels; height follows the source aspect ratio.
width = 600
# WebP quality (1 = worst, 100 = best).
quality = 75
# Expected maximum size. Larger outputs are reported, not rejected.
max_size_kb = 100
suffix = "_thumb"
# Re-encode outputs over max_size_kb once more at this quality.
# Omit to keep oversize outputs as they are.
# fallback_quality = 60

# ---------------------------------------------------------------------------
# Full-size variant: <stem>_full.webp
# ---------------------------------------------------------------------------
[full]
# Maximum width in pixels. Narrower sources are not upscaled.
width = 2400
quality = 85
max_size_kb = 1000
suffix = "_full"
# fallback_quality = 70

# ---------------------------------------------------------------------------
# Encoder
# ---------------------------------------------------------------------------
[codec]
# cwebp program name or path.
program = "cwebp"
# Seconds before a hung encode is killed and counted as failed.
timeout_secs = 120

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel transcoding workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
