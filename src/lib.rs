//! # folio-assets
//!
//! Build-time image pipeline for a photo portfolio site. Walks a tree of
//! source photos, writes a small thumbnail and a full-size WebP rendition
//! next to each one, and records the results in `image-info.json` for the
//! page generator.
//!
//! # Architecture: One Run, Four Stages
//!
//! ```text
//! 1. Reconcile   delete artifacts like beach_thumb_thumb.webp
//! 2. Scan        assets/  →  Vec<SourceImage>        (sorted, exclusions applied)
//! 3. Transcode   sources  →  Vec<ImageOutcome>       (cwebp, worker pool, mtime cache)
//! 4. Manifest    outcomes →  image-info.json
//! ```
//!
//! [`pipeline::Pipeline`] drives the stages as a forward-only state machine.
//! Only two things can fail a run: a precondition (missing asset directory,
//! no usable `cwebp`) checked before anything is touched, or the final
//! manifest write. Everything per-file is recorded as an outcome.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`naming`] | Suffix-token filename convention: classify names, build derived names |
//! | [`scan`] | Explicit-stack tree walk with directory exclusions; source discovery |
//! | [`cache`] | mtime staleness oracle and per-run cache counters |
//! | [`codec`] | `Codec` trait, `cwebp` process backend with timeout, header probing |
//! | [`process`] | Transcoder: one source + profile → one derived variant |
//! | [`reconcile`] | Finds and deletes duplicate derived artifacts |
//! | [`pipeline`] | Run orchestration, worker pool, progress events, cancellation |
//! | [`manifest`] | `image-info.json` model and writer |
//! | [`config`] | `folio-assets.toml` loading, merging over defaults, validation |
//! | [`types`] | Records passed between stages |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Outputs Live Beside Their Sources
//!
//! `travel/beach.jpg` produces `travel/beach_thumb.webp` and
//! `travel/beach_full.webp`. The site references images by path, so keeping
//! variants next to originals means no path mapping in templates. The cost
//! is that derived files share the tree with sources, which is why naming
//! is a strict contract: a derived name always starts from the *source*
//! stem, and anything with compounded suffix tokens is a duplicate.
//!
//! ## External Encoder
//!
//! WebP encoding is delegated to Google's `cwebp`. The [`codec::Codec`]
//! trait keeps it behind a seam, so tests run against a recording mock and
//! never need the binary.
//!
//! ## Timestamp Cache
//!
//! An output newer than its source is reused. This is cheap and good enough
//! for a build step; `--force` covers profile changes.

pub mod cache;
pub mod codec;
pub mod config;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod reconcile;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
