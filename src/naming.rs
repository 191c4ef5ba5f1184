//! Suffix-token filename convention for derived images.
//!
//! Every source image `beach.jpg` gets two derived siblings named
//! `<stem><suffix>.<ext>`:
//!
//! ```text
//! beach.jpg           source
//! beach_thumb.webp    thumbnail
//! beach_full.webp     full rendition
//! ```
//!
//! Classification is purely structural: files are never opened. A suffix
//! token only counts when it ends the name or is directly followed by the
//! delimiter `_` or by a `.`, so `sunset_thumbnail.jpg` carries no token.
//!
//! ## Duplicates
//!
//! Earlier runs that treated derived files as sources produced names such
//! as `beach_thumb_thumb.webp` or `beach_thumb_full.webp`. A name with the
//! same token twice, or both tokens, is a [`FileClass::Duplicate`]. The
//! decision is made on token counts, not positions. Only image files (a
//! supported source extension or the derived extension) can be duplicates.

use crate::config::PipelineConfig;
use crate::types::VariantKind;

/// Separator that may directly follow a suffix token.
pub const TOKEN_DELIMITER: char = '_';

/// Extension of the hidden file a derived output is encoded into.
pub const PARTIAL_EXTENSION: &str = ".tmp";

/// Structural class of a filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    /// Original image eligible for transcoding.
    Source,
    /// A well-formed derived file (`<stem><suffix>.<ext>`).
    Derived(VariantKind),
    /// A derived file produced by overlapping runs.
    Duplicate,
    /// Encoder temp file (`.beach_thumb.webp.tmp`) left by an interrupted run.
    Partial,
    /// Anything else.
    Ignored,
}

/// Suffix tokens and extensions that define the convention for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NamingConvention {
    thumbnail_suffix: String,
    full_suffix: String,
    source_extensions: Vec<String>,
    output_extension: String,
}

impl NamingConvention {
    pub fn new(
        thumbnail_suffix: impl Into<String>,
        full_suffix: impl Into<String>,
        source_extensions: &[String],
        output_extension: impl Into<String>,
    ) -> Self {
        Self {
            thumbnail_suffix: thumbnail_suffix.into(),
            full_suffix: full_suffix.into(),
            source_extensions: source_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            output_extension: output_extension
                .into()
                .trim_start_matches('.')
                .to_ascii_lowercase(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.thumbnail.suffix.clone(),
            config.full.suffix.clone(),
            &config.supported_extensions,
            config.output_extension.clone(),
        )
    }

    pub fn suffix(&self, kind: VariantKind) -> &str {
        match kind {
            VariantKind::Thumbnail => &self.thumbnail_suffix,
            VariantKind::Full => &self.full_suffix,
        }
    }

    pub fn output_extension(&self) -> &str {
        &self.output_extension
    }

    /// Classify a bare file name (no directory components).
    pub fn classify(&self, file_name: &str) -> FileClass {
        if let Some(inner) = file_name
            .strip_prefix('.')
            .and_then(|n| n.strip_suffix(PARTIAL_EXTENSION))
            && matches!(
                self.classify(inner),
                FileClass::Derived(_) | FileClass::Duplicate
            )
        {
            return FileClass::Partial;
        }
        let Some(ext) = extension(file_name) else {
            return FileClass::Ignored;
        };
        let is_source_ext = self.source_extensions.iter().any(|e| *e == ext);
        if !is_source_ext && ext != self.output_extension {
            return FileClass::Ignored;
        }

        let thumbs = count_tokens(file_name, &self.thumbnail_suffix);
        let fulls = count_tokens(file_name, &self.full_suffix);
        if thumbs > 1 || fulls > 1 || (thumbs > 0 && fulls > 0) {
            return FileClass::Duplicate;
        }

        let stem = stem(file_name);
        if thumbs == 1 && stem.ends_with(&self.thumbnail_suffix) {
            return FileClass::Derived(VariantKind::Thumbnail);
        }
        if fulls == 1 && stem.ends_with(&self.full_suffix) {
            return FileClass::Derived(VariantKind::Full);
        }

        if is_source_ext {
            FileClass::Source
        } else {
            FileClass::Ignored
        }
    }

    /// Name of the derived file for a source, e.g. `beach.jpg` → `beach_thumb.webp`.
    ///
    /// The stem always comes from the source name, so repeated runs never
    /// compound suffixes.
    pub fn derived_file_name(&self, source_name: &str, kind: VariantKind) -> String {
        format!(
            "{}{}.{}",
            stem(source_name),
            self.suffix(kind),
            self.output_extension
        )
    }

    /// True if a source's own derived names would classify as duplicates.
    ///
    /// Happens when the source name already contains a suffix token
    /// (`my_full_moon.jpg` → `my_full_moon_thumb.webp`). Producing such
    /// outputs would feed the reconciler's next pass.
    pub fn derived_names_conflict(&self, source_name: &str) -> bool {
        VariantKind::ALL.iter().any(|&kind| {
            self.classify(&self.derived_file_name(source_name, kind)) != FileClass::Derived(kind)
        })
    }
}

/// Hidden temp name a derived file is encoded into before it is renamed.
pub fn partial_file_name(derived_name: &str) -> String {
    format!(".{derived_name}{PARTIAL_EXTENSION}")
}

/// Lowercased text after the final `.`, if any. Dotfiles have no extension.
pub fn extension(file_name: &str) -> Option<String> {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(ext.to_ascii_lowercase())
        }
        _ => None,
    }
}

/// File name with its final extension removed.
pub fn stem(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

/// Count occurrences of `token` that sit on a token boundary.
fn count_tokens(file_name: &str, token: &str) -> usize {
    if token.is_empty() {
        return 0;
    }
    file_name
        .match_indices(token)
        .filter(|(idx, _)| {
            match file_name[idx + token.len()..].chars().next() {
                None => true,
                Some(c) => c == TOKEN_DELIMITER || c == '.',
            }
        })
        .count()
}
