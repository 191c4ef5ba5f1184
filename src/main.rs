use clap::{Parser, Subcommand};
use folio_assets::codec::CwebpCodec;
use folio_assets::config::{self, DEFAULT_CONFIG_FILE, PipelineConfig};
use folio_assets::pipeline::{CancelToken, Pipeline, PipelineError, RunOptions};
use folio_assets::{output, reconcile, scan};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Flags for the `build` command.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Re-encode every variant, ignoring up-to-date outputs
    #[arg(long)]
    force: bool,

    /// Maximum parallel encodes (clamped to CPU cores)
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Seconds before a hung encode is killed
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Parser)]
#[command(name = "folio-assets")]
#[command(about = "Thumbnail and full-size WebP variants for a photo portfolio")]
#[command(long_about = "\
Thumbnail and full-size WebP variants for a photo portfolio

Every image under the asset directory gets two siblings, and a manifest
records what was produced:

  dist/assets/
  ├── image-info.json              # Manifest for the page generator
  └── travel/
      ├── beach.jpg                # Source (jpg, jpeg, png, webp)
      ├── beach_thumb.webp         # 600px wide, quality 75
      └── beach_full.webp          # At most 2400px wide, quality 85

Outputs newer than their source are reused. Files with compounded suffixes
(beach_thumb_thumb.webp) are left-overs and are deleted before each build.
Directories named raw, thumbs, fullsize, node_modules and __MACOSX are
never touched.

Ctrl-C stops new images from starting; those in flight finish and the
manifest is still written.

Requires cwebp from Google's WebP tools on PATH.

Run 'folio-assets gen-config' to generate a documented folio-assets.toml.")]
#[command(version)]
struct Cli {
    /// Asset directory (overrides `assets_dir` from the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file; missing file means stock defaults
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Manifest path, relative to the asset directory unless absolute
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Log more (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: reconcile → scan → transcode → manifest
    Build(BuildArgs),
    /// Delete duplicate artifacts only
    Clean {
        /// List what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// List sources and duplicates without changing anything
    Scan,
    /// Print a stock folio-assets.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Build(args) => {
            let config = load_config(&cli, Some(args))?;
            let codec = CwebpCodec::from_config(&config.codec);
            let options = RunOptions {
                force: args.force,
                threads: config::effective_threads(&config.processing),
            };

            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            if let Err(e) = ctrlc::set_handler(move || {
                warn!("interrupted: finishing in-flight encodes, skipping the rest");
                on_interrupt.cancel();
            }) {
                warn!("could not install Ctrl-C handler: {}", e);
            }

            println!("==> Building {}", config.assets_dir.display());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_event(&event);
                }
            });
            let report = Pipeline::new(&config, &codec)
                .with_options(options)
                .with_events(tx)
                .with_cancel(cancel)
                .run();
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_summary(&report);

            if report.error.is_some() {
                std::process::exit(1);
            }
        }
        Command::Clean { dry_run } => {
            let config = load_config(&cli, None)?;
            require_root(&config)?;
            let naming = config.naming();
            let exclude = config.exclude_set();
            if *dry_run {
                let duplicates = reconcile::find_duplicates(&config.assets_dir, &exclude, &naming);
                output::print_dry_run(&duplicates);
            } else {
                let report = reconcile::reconcile(&config.assets_dir, &exclude, &naming);
                output::print_reconcile(&report);
            }
        }
        Command::Scan => {
            let config = load_config(&cli, None)?;
            require_root(&config)?;
            let naming = config.naming();
            let exclude = config.exclude_set();
            let sources = scan::discover_sources(&config.assets_dir, &exclude, &naming);
            let duplicates = reconcile::find_duplicates(&config.assets_dir, &exclude, &naming);
            output::print_scan(&sources, &duplicates);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Diagnostics go to stderr so stdout stays the progress report.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

/// Config file, then command-line overrides, then validation.
fn load_config(
    cli: &Cli,
    build: Option<&BuildArgs>,
) -> Result<PipelineConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(root) = &cli.root {
        config.assets_dir = root.clone();
    }
    if let Some(manifest) = &cli.manifest {
        config.manifest = manifest.clone();
    }
    if let Some(args) = build {
        if let Some(jobs) = args.jobs {
            config.processing.max_processes = Some(jobs);
        }
        if let Some(timeout) = args.timeout {
            config.codec.timeout_secs = timeout;
        }
    }
    config.validate()?;
    Ok(config)
}

fn require_root(config: &PipelineConfig) -> Result<(), PipelineError> {
    if config.assets_dir.is_dir() {
        Ok(())
    } else {
        Err(PipelineError::MissingRoot(config.assets_dir.clone()))
    }
}
