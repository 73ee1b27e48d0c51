mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use facesort_core::{Layout, Reconciler, RunOptions, RunReport};
use facesort_onnx::{CosineComparator, OnnxExtractor};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser)]
#[command(
    name = "facesort",
    version,
    about = "Sort images into album directories by the faces they contain"
)]
struct Cli {
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// TOML file overriding marker, cache and training file names
    #[arg(long, global = true, value_name = "FILE")]
    layout: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the encoding cache
    ClearCache {
        /// Root directory containing the cache
        #[arg(short, long = "root-dir", value_name = "ROOT")]
        root: Option<PathBuf>,
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
    /// Process images anywhere in a directory hierarchy
    Run {
        /// Root directory containing the images to process
        #[arg(short, long = "root-dir", value_name = "ROOT")]
        root: Option<PathBuf>,
        #[command(flatten)]
        flags: RunFlags,
    },
    /// Process a single image
    ProcessImage {
        image: PathBuf,
        #[command(flatten)]
        flags: RunFlags,
    },
    /// Add training data for the persons in a training image to an album
    AddPersons {
        training_image: PathBuf,
        album_dir: PathBuf,
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Label prefixed to the training sample name
        #[arg(short = 'p', long = "training-prefix", value_name = "LABEL")]
        label: Option<String>,
    },
}

#[derive(Args)]
struct RunFlags {
    /// Root directory searched for albums (default: current directory)
    #[arg(long = "albums-root-dir", value_name = "DIR")]
    albums_root: Option<PathBuf>,
    /// Only log what would be done
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Keep previously placed images in album directories
    #[arg(long)]
    keep_old: bool,
    /// Symlink images into albums instead of copying them
    #[arg(short, long)]
    symlink: bool,
    /// Do not read or write the encoding cache
    #[arg(short = 'c', long)]
    no_cache: bool,
}

impl RunFlags {
    fn options(&self, cwd: &Path) -> RunOptions {
        RunOptions {
            dry_run: self.dry_run,
            delete_old: !self.keep_old,
            symlink: self.symlink,
            use_cache: !self.no_cache,
            ..RunOptions::new(self.albums_root.clone().unwrap_or_else(|| cwd.to_path_buf()))
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env();
    let layout = match cli.layout.as_ref().or(settings.layout.as_ref()) {
        Some(path) => Layout::load(path)
            .with_context(|| format!("failed to load layout from {}", path.display()))?,
        None => Layout::default(),
    };
    let cwd = std::env::current_dir().context("failed to read current directory")?;

    match cli.command {
        Commands::ClearCache { root, dry_run } => {
            let root = root.unwrap_or_else(|| cwd.clone());
            let removed = facesort_core::clear_cache(&root, &layout, dry_run)?;
            if removed {
                println!("cache cleared under {}", root.display());
            } else {
                println!("no previous cache found under {}", root.display());
            }
        }
        Commands::Run { root, flags } => {
            let root = root.unwrap_or_else(|| cwd.clone());
            let mut reconciler = reconciler(&settings, layout)?;
            let report = reconciler
                .process_directory(&root, &flags.options(&cwd))
                .with_context(|| format!("failed to process {}", root.display()))?;
            print_summary(&report, flags.dry_run);
        }
        Commands::ProcessImage { image, flags } => {
            let mut reconciler = reconciler(&settings, layout)?;
            let report = reconciler
                .process_image(&image, &flags.options(&cwd))
                .with_context(|| format!("failed to process {}", image.display()))?;
            print_summary(&report, flags.dry_run);
        }
        Commands::AddPersons {
            training_image,
            album_dir,
            dry_run,
            label,
        } => {
            let mut reconciler = reconciler(&settings, layout)?;
            let sample = reconciler
                .add_persons(&album_dir, &training_image, label.as_deref(), dry_run)
                .with_context(|| {
                    format!("failed to add persons from {}", training_image.display())
                })?;
            let verb = if dry_run { "would add" } else { "added" };
            println!(
                "{verb} training sample {} ({} faces) to {}",
                sample.id,
                sample.vectors.len(),
                album_dir.display()
            );
        }
    }

    Ok(())
}

fn reconciler(settings: &Settings, layout: Layout) -> Result<Reconciler> {
    let extractor = OnnxExtractor::load(&settings.model_dir).with_context(|| {
        format!(
            "failed to load face models from {} (set FACESORT_MODEL_DIR)",
            settings.model_dir.display()
        )
    })?;
    let comparator = CosineComparator {
        threshold: settings.match_threshold,
    };
    tracing::debug!(
        model_dir = %settings.model_dir.display(),
        threshold = settings.match_threshold,
        "face models ready"
    );
    Ok(Reconciler::new(layout, Box::new(extractor), Box::new(comparator)))
}

fn print_summary(report: &RunReport, dry_run: bool) {
    let prefix = if dry_run { "dry run: " } else { "" };
    println!(
        "{prefix}{} source images, {} albums, {} old images deleted, {} images placed",
        report.sources,
        report.albums,
        report.deleted.len(),
        report.placed.len()
    );
}
