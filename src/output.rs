//! CLI output formatting for all pipeline stages.
//!
//! # Display contract
//!
//! Every source is shown as its positional index plus its path relative to
//! the asset root, with one indented line per derived variant:
//!
//! ```text
//! 001 travel/beach.jpg
//!     thumbnail: encoded (79 KB)
//!     full: cached (598 KB)
//! 002 travel/dunes.png
//!     thumbnail: failed (codec exited with exit status: 1: ...)
//!     full: encoded (1204 KB, over budget)
//! ```
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! ==> Removing duplicate artifacts
//! Removed 2 duplicate artifacts (14 KB reclaimed)
//!     deleted: travel/beach_thumb_thumb.webp
//!     deleted: travel/beach_thumb_full.webp
//! ==> Scanning sources
//! Found 2 source images
//! ==> Transcoding
//! 001 travel/beach.jpg
//!     ...
//! ==> Writing manifest
//!
//! Images: 2 sources, 1 thumbnail, 2 full
//! Variants: 4 attempted, 3 succeeded, 1 failed
//! Cache: 1 cached, 2 encoded, 1 failed (4 total)
//! Output: 1881 KB
//! Reclaimed: 14 KB (2 duplicates)
//! ==> Manifest written: dist/assets/image-info.json
//! ```
//!
//! ## Clean / Scan
//!
//! ```text
//! Sources
//! 001 travel/beach.jpg (2344 KB)
//!
//! Duplicates
//! 001 travel/beach_thumb_thumb.webp (7 KB)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::manifest::size_kb;
use crate::pipeline::{PipelineEvent, PipelineState, RunReport};
use crate::reconcile::{DuplicateArtifact, ReconcileReport};
use crate::types::{DerivedVariant, ImageOutcome, SourceImage, VariantKind, VariantStatus};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn variant_line(variant: &DerivedVariant) -> String {
    let detail = match variant.status {
        VariantStatus::Cached | VariantStatus::Encoded if variant.oversize => {
            format!("{} KB, over budget", size_kb(variant.size))
        }
        VariantStatus::Cached | VariantStatus::Encoded => format!("{} KB", size_kb(variant.size)),
        VariantStatus::Failed | VariantStatus::Skipped => {
            variant.error.clone().unwrap_or_default()
        }
    };
    if detail.is_empty() {
        format!("    {}: {}", variant.kind, variant.status.label())
    } else {
        format!("    {}: {} ({})", variant.kind, variant.status.label(), detail)
    }
}

// ============================================================================
// Build progress
// ============================================================================

/// Header line announcing a stage, if the stage has one.
pub fn format_stage(state: &PipelineState) -> Option<String> {
    let label = match state {
        PipelineState::Reconciling => "Removing duplicate artifacts",
        PipelineState::Scanning => "Scanning sources",
        PipelineState::Transcoding => "Transcoding",
        PipelineState::ManifestWriting => "Writing manifest",
        PipelineState::Idle | PipelineState::Done | PipelineState::Failed(_) => return None,
    };
    Some(format!("==> {label}"))
}

/// One source with both variant outcomes.
pub fn format_outcome(index: usize, outcome: &ImageOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {}",
        format_index(index),
        outcome.source.relative_path
    )];
    for kind in VariantKind::ALL {
        lines.push(variant_line(outcome.variant(kind)));
    }
    lines
}

/// Format a single progress event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Stage(state) => format_stage(state).into_iter().collect(),
        PipelineEvent::Reconciled(report) => format_reconcile(report),
        PipelineEvent::Discovered { sources } => {
            vec![format!("Found {}", plural(*sources, "source image", "source images"))]
        }
        PipelineEvent::Processed { index, outcome } => format_outcome(*index, outcome),
    }
}

// ============================================================================
// Duplicates
// ============================================================================

/// Result of a reconcile pass.
pub fn format_reconcile(report: &ReconcileReport) -> Vec<String> {
    if report.found == 0 {
        return vec!["No duplicate artifacts".to_string()];
    }
    let mut lines = vec![format!(
        "Removed {} ({} KB reclaimed)",
        plural(
            report.deleted_count(),
            "duplicate artifact",
            "duplicate artifacts"
        ),
        size_kb(report.bytes_reclaimed())
    )];
    for dup in &report.deleted {
        lines.push(format!("    deleted: {}", dup.relative_path));
    }
    for (dup, reason) in &report.failures {
        lines.push(format!("    not deleted: {} ({})", dup.relative_path, reason));
    }
    lines
}

/// Duplicates listed without deleting (`clean --dry-run`, `scan`).
pub fn format_duplicates(duplicates: &[DuplicateArtifact]) -> Vec<String> {
    let mut lines = vec!["Duplicates".to_string()];
    if duplicates.is_empty() {
        lines.push("    none".to_string());
        return lines;
    }
    for (i, dup) in duplicates.iter().enumerate() {
        lines.push(format!(
            "{} {} ({} KB)",
            format_index(i + 1),
            dup.relative_path,
            size_kb(dup.size)
        ));
    }
    lines
}

pub fn format_dry_run(duplicates: &[DuplicateArtifact]) -> Vec<String> {
    let total: u64 = duplicates.iter().map(|d| d.size).sum();
    let mut lines = format_duplicates(duplicates);
    lines.push(String::new());
    lines.push(format!(
        "Would remove {} ({} KB)",
        plural(
            duplicates.len(),
            "duplicate artifact",
            "duplicate artifacts"
        ),
        size_kb(total)
    ));
    lines
}

// ============================================================================
// Scan
// ============================================================================

pub fn format_sources(sources: &[SourceImage]) -> Vec<String> {
    let mut lines = vec!["Sources".to_string()];
    if sources.is_empty() {
        lines.push("    none".to_string());
    }
    for (i, source) in sources.iter().enumerate() {
        lines.push(format!(
            "{} {} ({} KB)",
            format_index(i + 1),
            source.relative_path,
            size_kb(source.size)
        ));
    }
    lines
}

pub fn format_scan(sources: &[SourceImage], duplicates: &[DuplicateArtifact]) -> Vec<String> {
    let mut lines = format_sources(sources);
    lines.push(String::new());
    lines.extend(format_duplicates(duplicates));
    lines
}

// ============================================================================
// Summary
// ============================================================================

/// Final counts after a build. Printed for failed runs too, with zeros.
pub fn format_summary(report: &RunReport) -> Vec<String> {
    let mut lines = vec![String::new()];
    lines.push(format!(
        "Images: {}, {}, {} full",
        plural(report.outcomes.len(), "source", "sources"),
        plural(
            report.produced(VariantKind::Thumbnail),
            "thumbnail",
            "thumbnails"
        ),
        report.produced(VariantKind::Full)
    ));
    lines.push(format!(
        "Variants: {} attempted, {} succeeded, {} failed",
        report.cache.attempted(),
        report.cache.succeeded(),
        report.cache.failures
    ));
    lines.push(format!("Cache: {}", report.cache));
    lines.push(format!("Output: {} KB", size_kb(report.output_bytes())));
    lines.push(format!(
        "Reclaimed: {} KB ({})",
        size_kb(report.reconcile.bytes_reclaimed()),
        plural(report.reconcile.deleted_count(), "duplicate", "duplicates")
    ));
    let oversize = report.oversize();
    if oversize > 0 {
        lines.push(format!(
            "Warning: {} over the size budget",
            plural(oversize, "variant", "variants")
        ));
    }
    match &report.state {
        PipelineState::Done => lines.push(format!(
            "==> Manifest written: {}",
            report.manifest_path.display()
        )),
        PipelineState::Failed(reason) => lines.push(format!("==> Build failed: {reason}")),
        _ => {}
    }
    lines
}

// ============================================================================
// Print wrappers
// ============================================================================

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_event(event: &PipelineEvent) {
    print_lines(format_event(event));
}

pub fn print_summary(report: &RunReport) {
    print_lines(format_summary(report));
}

pub fn print_reconcile(report: &ReconcileReport) {
    print_lines(format_reconcile(report));
}

pub fn print_dry_run(duplicates: &[DuplicateArtifact]) {
    print_lines(format_dry_run(duplicates));
}

pub fn print_scan(sources: &[SourceImage], duplicates: &[DuplicateArtifact]) {
    print_lines(format_scan(sources, duplicates));
}
