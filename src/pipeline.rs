//! The build run: reconcile → scan → transcode → manifest.
//!
//! [`Pipeline::run`] drives a strictly forward state machine:
//!
//! ```text
//! Idle → Reconciling → Scanning → Transcoding → ManifestWriting → Done
//!   └──────────┴───────────┴───────────┴──────────────┴──→ Failed(reason)
//! ```
//!
//! Preconditions (asset root exists, codec usable) are checked before any
//! file is touched. After that, per-file problems are recorded in the
//! [`RunReport`] and never stop the run; only a manifest write failure
//! ends it in `Failed`.
//!
//! ## Concurrency
//!
//! Sources are transcoded on a local rayon pool of `RunOptions::threads`
//! workers. Each source's thumbnail and full rendition are produced by the
//! same worker, one after the other. Sources whose derived names would
//! collide are resolved before dispatch, so no two workers ever write the
//! same file. Outcomes come back in scan order.
//!
//! Progress is reported as [`PipelineEvent`]s over an optional mpsc channel.
//! A [`CancelToken`] stops new sources from starting; they are recorded as
//! skipped and the manifest is still written.

use crate::cache::CacheStats;
use crate::codec::{Codec, CodecError};
use crate::config::{PipelineConfig, effective_threads};
use crate::manifest::{self, ManifestError};
use crate::naming::NamingConvention;
use crate::process::Transcoder;
use crate::reconcile::{self, ReconcileReport};
use crate::scan;
use crate::types::{DerivedVariant, ImageOutcome, Profiles, SourceImage, VariantKind};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("asset directory {} does not exist or is not a directory", .0.display())]
    MissingRoot(PathBuf),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to write manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        source: ManifestError,
    },
}

/// Where a run is. Transitions only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Reconciling,
    Scanning,
    Transcoding,
    ManifestWriting,
    Done,
    Failed(String),
}

impl PipelineState {
    fn rank(&self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Reconciling => 1,
            PipelineState::Scanning => 2,
            PipelineState::Transcoding => 3,
            PipelineState::ManifestWriting => 4,
            PipelineState::Done => 5,
            PipelineState::Failed(_) => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Reconciling => f.write_str("reconciling"),
            PipelineState::Scanning => f.write_str("scanning"),
            PipelineState::Transcoding => f.write_str("transcoding"),
            PipelineState::ManifestWriting => f.write_str("writing manifest"),
            PipelineState::Done => f.write_str("done"),
            PipelineState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Shared flag that stops new sources from being dispatched.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications sent while a run is in flight.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Stage(PipelineState),
    Reconciled(ReconcileReport),
    Discovered {
        sources: usize,
    },
    /// `index` is the 1-based scan position; events arrive in completion order.
    Processed {
        index: usize,
        outcome: Box<ImageOutcome>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Re-encode even when outputs are current.
    pub force: bool,
    /// Transcoding workers; `1` processes sources sequentially.
    pub threads: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            force: false,
            threads: 1,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            force: false,
            threads: effective_threads(&config.processing),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub state: PipelineState,
    pub error: Option<PipelineError>,
    pub reconcile: ReconcileReport,
    /// One entry per source, in scan order.
    pub outcomes: Vec<ImageOutcome>,
    pub cache: CacheStats,
    pub manifest_path: PathBuf,
}

impl RunReport {
    fn new(manifest_path: PathBuf) -> Self {
        Self {
            state: PipelineState::Idle,
            error: None,
            reconcile: ReconcileReport::default(),
            outcomes: Vec::new(),
            cache: CacheStats::default(),
            manifest_path,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Done
    }

    /// Successful variants of one kind.
    pub fn produced(&self, kind: VariantKind) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.variant(kind).success())
            .count()
    }

    pub fn oversize(&self) -> usize {
        self.variants().filter(|v| v.oversize).count()
    }

    /// Total size of all usable derived files.
    pub fn output_bytes(&self) -> u64 {
        self.variants()
            .filter(|v| v.success())
            .map(|v| v.size)
            .sum()
    }

    fn variants(&self) -> impl Iterator<Item = &DerivedVariant> {
        self.outcomes.iter().flat_map(|o| [&o.thumbnail, &o.full])
    }
}

/// One build run over an asset tree.
pub struct Pipeline<'a, C: Codec + ?Sized> {
    config: &'a PipelineConfig,
    codec: &'a C,
    options: RunOptions,
    events: Option<Sender<PipelineEvent>>,
    cancel: CancelToken,
    state: PipelineState,
}

impl<'a, C: Codec + ?Sized> Pipeline<'a, C> {
    pub fn new(config: &'a PipelineConfig, codec: &'a C) -> Self {
        Self {
            config,
            codec,
            options: RunOptions::from_config(config),
            events: None,
            cancel: CancelToken::new(),
            state: PipelineState::Idle,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_events(mut self, events: Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run to `Done` or `Failed`. Consumes the event sender, so a printer
    /// thread draining the channel ends when the run does.
    pub fn run(mut self) -> RunReport {
        let mut report = RunReport::new(self.config.manifest_path());
        match self.execute(&mut report) {
            Ok(()) => self.advance(PipelineState::Done),
            Err(e) => {
                self.advance(PipelineState::Failed(e.to_string()));
                report.error = Some(e);
            }
        }
        report.state = self.state.clone();
        report
    }

    fn execute(&mut self, report: &mut RunReport) -> Result<(), PipelineError> {
        let config = self.config;
        let root = &config.assets_dir;
        if !root.is_dir() {
            return Err(PipelineError::MissingRoot(root.clone()));
        }
        self.codec.probe()?;
        info!("encoder: {}", self.codec.name());

        let naming = config.naming();
        let exclude = config.exclude_set();
        let profiles = config.profiles();

        self.advance(PipelineState::Reconciling);
        report.reconcile = reconcile::reconcile(root, &exclude, &naming);
        self.emit(PipelineEvent::Reconciled(report.reconcile.clone()));

        self.advance(PipelineState::Scanning);
        let sources = scan::discover_sources(root, &exclude, &naming);
        info!("found {} source images", sources.len());
        self.emit(PipelineEvent::Discovered {
            sources: sources.len(),
        });

        self.advance(PipelineState::Transcoding);
        report.outcomes = self.transcode(&sources, &naming, &profiles);
        for outcome in &report.outcomes {
            report.cache.record(&outcome.thumbnail);
            report.cache.record(&outcome.full);
        }

        self.advance(PipelineState::ManifestWriting);
        let (thumbnails, fulls): (Vec<DerivedVariant>, Vec<DerivedVariant>) = report
            .outcomes
            .iter()
            .map(|o| (o.thumbnail.clone(), o.full.clone()))
            .unzip();
        manifest::write(&report.manifest_path, &sources, &thumbnails, &fulls).map_err(
            |source| PipelineError::Manifest {
                path: report.manifest_path.clone(),
                source,
            },
        )?;
        Ok(())
    }

    fn transcode(
        &self,
        sources: &[SourceImage],
        naming: &NamingConvention,
        profiles: &Profiles,
    ) -> Vec<ImageOutcome> {
        let transcoder = Transcoder::new(self.codec, naming).force(self.options.force);
        let plan = plan_dispatch(sources, naming);

        let work = |(i, (source, skip)): (usize, (&SourceImage, &Option<String>))| {
            let outcome = match skip {
                Some(reason) => transcoder.skip(source, reason),
                None if self.cancel.is_cancelled() => transcoder.skip(source, "cancelled"),
                None => transcoder.process_source(source, profiles),
            };
            self.emit(PipelineEvent::Processed {
                index: i + 1,
                outcome: Box::new(outcome.clone()),
            });
            outcome
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads.max(1))
            .build()
        {
            Ok(pool) => {
                pool.install(|| {
                    sources
                        .par_iter()
                        .zip(plan.par_iter())
                        .enumerate()
                        .map(&work)
                        .collect()
                })
            }
            Err(e) => {
                warn!("could not start worker pool ({}), processing sequentially", e);
                sources.iter().zip(plan.iter()).enumerate().map(&work).collect()
            }
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            next.rank() > self.state.rank(),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        info!("pipeline: {} -> {}", self.state, next);
        self.state = next.clone();
        self.emit(PipelineEvent::Stage(next));
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }
}

/// Decide up front which sources must not be transcoded.
///
/// Returns one entry per source: `None` to process, or the reason to skip.
/// Two sources in one directory that share a stem (`beach.jpg`,
/// `beach.png`) would write the same outputs; the first in scan order wins.
pub fn plan_dispatch(sources: &[SourceImage], naming: &NamingConvention) -> Vec<Option<String>> {
    let mut claimed: HashMap<String, &str> = HashMap::new();
    sources
        .iter()
        .map(|source| {
            if naming.derived_names_conflict(&source.name) {
                return Some(format!(
                    "{} contains a suffix token; its derived names would be duplicates",
                    source.name
                ));
            }
            let key = match source.relative_dir() {
                "" => naming.derived_file_name(&source.name, VariantKind::Thumbnail),
                dir => format!(
                    "{dir}/{}",
                    naming.derived_file_name(&source.name, VariantKind::Thumbnail)
                ),
            };
            match claimed.get(&key) {
                Some(first) => Some(format!("derived names collide with {first}")),
                None => {
                    claimed.insert(key, &source.relative_path);
                    None
                }
            }
        })
        .collect()
}
