// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! pictag: vision-model image tagging and renaming

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use pictag::batch::{process_batch, BatchOptions};
use pictag::config::{AppConfig, CollisionPolicy};
use pictag::gallery::render_gallery;
use pictag::image_prep::ImageSource;
use pictag::journal::{undo_renames, RenameJournal, UndoOutcome};
use pictag::progress::Verbosity;
use pictag::renamer::{apply_renames, RenameOptions};
use pictag::scan::{find_images, scramble_directory};
use pictag::tagger::{Tagger, TaggerOptions};
use pictag::vision::{OpenAiVisionClient, RetryPolicy, RetryingModel};
use pictag::Result;

/// pictag CLI - tag, rename and browse images with a vision model
#[derive(Parser, Debug)]
#[command(name = "pictag")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Tag and rename images with a vision model", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "pictag.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging and per-item output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tag images and append the results to the tagging log
    Tag {
        /// Image files, URLs or directories of images
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Tagging log (overrides config)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Re-attempt inputs that only have error rows
        #[arg(long)]
        retry_errors: bool,

        /// Only take directory entries modified within this many days
        #[arg(long, value_parser = parse_days)]
        max_days_old: Option<f64>,
    },

    /// Rename tagged files to their clean filenames
    Rename {
        /// Tagging log (overrides config)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Show what would be renamed without renaming
        #[arg(long)]
        dry_run: bool,

        /// Rename to the first free `_N` name when the target is taken
        #[arg(long)]
        resolve_collisions: bool,
    },

    /// Undo recent renames
    Undo {
        /// Number of renames to undo (0 for all)
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Show what would be undone
        #[arg(long)]
        dry_run: bool,
    },

    /// Render the tagging log as an HTML gallery
    Gallery {
        /// Tagging log (overrides config)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Template file (overrides config)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output file (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write downscaled copies of a directory under scrambled names
    Scramble {
        input_dir: PathBuf,
        output_dir: PathBuf,

        /// Longest side of each thumbnail, in pixels (defaults to config)
        #[arg(long)]
        max_dimension: Option<u32>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "pictag.json")]
        output: PathBuf,
    },
}

/// Day counts for `--max-days-old`: any non-negative number, `inf` included.
fn parse_days(raw: &str) -> std::result::Result<f64, String> {
    let days: f64 = raw.parse().map_err(|e| format!("{}", e))?;
    if days.is_nan() || days < 0.0 {
        return Err(format!("expected a non-negative number of days, got {}", raw));
    }
    Ok(days)
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Silent
        } else if self.verbose {
            Verbosity::Full
        } else {
            Verbosity::Dots
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let verbosity = cli.verbosity();

    match cli.command {
        Commands::Tag { inputs, log, retry_errors, max_days_old } => {
            let log_path = log.unwrap_or_else(|| config.tagging.log_path.clone());
            run_tag(&config, inputs, &log_path, retry_errors, max_days_old, verbosity).await
        }
        Commands::Rename { log, dry_run, resolve_collisions } => {
            let log_path = log.unwrap_or_else(|| config.tagging.log_path.clone());
            run_rename(&config, &log_path, dry_run, resolve_collisions, verbosity)
        }
        Commands::Undo { count, dry_run } => run_undo(&config, count, dry_run),
        Commands::Gallery { log, template, output } => {
            let log_path = log.unwrap_or_else(|| config.tagging.log_path.clone());
            let template = template.or_else(|| config.gallery.template.clone());
            let output = output.unwrap_or_else(|| config.gallery.output.clone());
            let count = render_gallery(&log_path, template.as_deref(), &output)?;
            println!("Wrote {} entries to {}", count, output.display());
            Ok(())
        }
        Commands::Scramble { input_dir, output_dir, max_dimension } => {
            let max_dimension = max_dimension.unwrap_or(config.image.max_dimension);
            let written = scramble_directory(&input_dir, &output_dir, max_dimension)?;
            println!("Wrote {} thumbnails to {}", written.len(), output_dir.display());
            Ok(())
        }
        Commands::Config { action } => run_config_command(&config, action),
    }
}

/// Directories expand to the files directly inside them; files and URLs
/// pass through unchanged.
fn expand_inputs(inputs: Vec<String>, max_days_old: Option<f64>) -> Result<Vec<String>> {
    let mut expanded = Vec::new();
    for input in inputs {
        let is_dir = matches!(ImageSource::parse(&input), ImageSource::Local(path) if path.is_dir());
        if is_dir {
            let found = find_images(&[Path::new(&input)], max_days_old)?;
            info!("{}: {} files", input, found.len());
            expanded.extend(found.into_iter().map(|p| p.to_string_lossy().into_owned()));
        } else {
            expanded.push(input);
        }
    }
    Ok(expanded)
}

async fn run_tag(
    config: &AppConfig,
    inputs: Vec<String>,
    log_path: &Path,
    retry_errors: bool,
    max_days_old: Option<f64>,
    verbosity: Verbosity,
) -> Result<()> {
    let inputs = expand_inputs(inputs, max_days_old)?;

    let client = OpenAiVisionClient::new(&config.engine)?;
    info!("Tagging {} inputs with {}", inputs.len(), client.model());
    let model = RetryingModel::new(client, RetryPolicy::from_config(&config.engine));
    let tagger = Tagger::new(model, reqwest::Client::new(), TaggerOptions::from_config(config));

    let options = BatchOptions::from_config(config, retry_errors, verbosity);
    let summary = process_batch(&tagger, &inputs, log_path, &options).await?;

    if verbosity != Verbosity::Silent {
        println!(
            "Tagged {}, failed {}, already processed {}, skipped {} ({})",
            summary.tagged,
            summary.failed,
            summary.already_processed,
            summary.blacklisted,
            log_path.display()
        );
    }
    Ok(())
}

fn run_rename(
    config: &AppConfig,
    log_path: &Path,
    dry_run: bool,
    resolve_collisions: bool,
    verbosity: Verbosity,
) -> Result<()> {
    let collisions = if resolve_collisions {
        CollisionPolicy::RenameWithSuffix
    } else {
        config.renamer.collisions
    };
    let options = RenameOptions { dry_run, verbosity, collisions };

    if dry_run {
        warn!("DRY RUN MODE - files will not be renamed");
    }

    let journal = RenameJournal::new(config.renamer.journal_path.clone());
    let report = apply_renames(log_path, &options, Some(&journal))?;

    if verbosity != Verbosity::Silent {
        println!(
            "{} {}, {} problems",
            if dry_run { "Would rename" } else { "Renamed" },
            report.renamed(),
            report.problems()
        );
    }
    Ok(())
}

fn run_undo(config: &AppConfig, count: usize, dry_run: bool) -> Result<()> {
    let journal = RenameJournal::new(config.renamer.journal_path.clone());
    let outcomes = undo_renames(&journal, count, dry_run)?;

    if outcomes.is_empty() {
        println!("No renames to undo");
        return Ok(());
    }

    for outcome in outcomes {
        match outcome {
            UndoOutcome::Restored { from, to } => {
                println!("Undone: {} -> {}", from.display(), to.display())
            }
            UndoOutcome::WouldRestore { from, to } => {
                println!("Would undo: {} -> {}", from.display(), to.display())
            }
            UndoOutcome::Missing { path } => println!("Missing: {}", path.display()),
            UndoOutcome::OriginalTaken { path } => {
                println!("Original name taken: {}", path.display())
            }
            UndoOutcome::Failed { from, error } => {
                println!("Failed: {}: {}", from.display(), error)
            }
        }
    }
    Ok(())
}

fn run_config_command(config: &AppConfig, action: ConfigCommands) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
    }
    Ok(())
}
