//! jp2d - JP2 derivative generation CLI

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use jp2d_core::PipelineConfig;
use jp2d_icc::StandardProfile;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "jp2d")]
#[command(author, version, about = "Create JPEG 2000 derivatives from TIFF and JPEG sources")]
#[command(long_about = r#"
Normalizes TIFF and JPEG images to an sRGB or grayscale intermediate TIFF
and encodes them to JP2 with an external encoder (kdu_compress by default).

Examples:
  jp2d create scan.tif                     # Writes scan.jp2 next to the source
  jp2d create scan.tif -o out.jp2 --overwrite
  jp2d batch /scans -r -j 8                # Every .tif under /scans into /scans/jp2
  jp2d info scan.tif scan.jp2 --json
  jp2d extract-page folio.tif folio-p1.tif
  jp2d add-profile /scans "Adobe RGB 1998" -r  # Tag untagged TIFFs before conversion

The encoder binary can be set in the --config file or with JP2D_ENCODER.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Pipeline configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of threads for batch conversion (0 = auto)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a JP2 from one image
    #[command(visible_alias = "c")]
    Create(CreateArgs),

    /// Create JP2s for every matching image in a directory
    #[command(visible_alias = "b")]
    Batch(BatchArgs),

    /// Display image information
    #[command(visible_alias = "i")]
    Info(InfoArgs),

    /// Write the first page of a multi-page TIFF as its own file
    #[command(name = "extract-page", visible_alias = "xp")]
    ExtractPage(ExtractPageArgs),

    /// Embed a built-in ICC profile in a TIFF, or in every TIFF of a directory
    #[command(name = "add-profile", visible_alias = "ap")]
    AddProfile(AddProfileArgs),
}

/// Arguments for the `create` command.
#[derive(Args)]
struct CreateArgs {
    /// Source TIFF or JPEG
    input: PathBuf,

    /// Output JP2 (default: source with .jp2 extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace an existing output
    #[arg(long)]
    overwrite: bool,

    /// Directory for the intermediate TIFF (default: system temp dir)
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// Keep the intermediate TIFF
    #[arg(long = "preserve-tmp")]
    preserve_tmp: bool,

    /// Convert only the first page of a multi-page TIFF
    #[arg(long)]
    first_page: bool,

    /// Encoder binary, overriding config and environment
    #[arg(long)]
    encoder: Option<PathBuf>,
}

/// Arguments for the `batch` command.
#[derive(Args)]
struct BatchArgs {
    /// Directory containing source images
    source_dir: PathBuf,

    /// Output directory (default: <source_dir>/jp2)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Source file extension
    #[arg(short, long, default_value = "tif")]
    extension: String,

    /// Descend into subdirectories, mirroring them in the output
    #[arg(short, long)]
    recursive: bool,

    /// Replace existing outputs
    #[arg(long)]
    overwrite: bool,

    /// Directory for intermediate TIFFs
    #[arg(long)]
    tmp_dir: Option<PathBuf>,

    /// Convert only the first page of multi-page TIFFs
    #[arg(long)]
    first_page: bool,
}

/// Arguments for the `info` command.
#[derive(Args)]
struct InfoArgs {
    /// Image(s) to describe
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Include the SHA-256 of each file
    #[arg(long)]
    checksum: bool,
}

/// Arguments for the `extract-page` command.
#[derive(Args)]
struct ExtractPageArgs {
    /// Multi-page TIFF
    input: PathBuf,

    /// Output TIFF
    output: PathBuf,

    /// Replace an existing output
    #[arg(long)]
    overwrite: bool,
}

/// Arguments for the `add-profile` command.
#[derive(Args)]
struct AddProfileArgs {
    /// TIFF file, or directory to process in batch
    input: PathBuf,

    /// Profile: srgb, adobe-rgb, display-p3, gray22 or generic-cmyk
    /// ("Adobe RGB 1998" style names also work)
    profile: StandardProfile,

    /// Replace a profile that is already embedded
    #[arg(long)]
    force: bool,

    /// Source file extension (directory input)
    #[arg(short, long, default_value = "tif")]
    extension: String,

    /// Descend into subdirectories (directory input)
    #[arg(short, long)]
    recursive: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    match cli.command {
        Commands::Create(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::create::run(args, config, cli.verbose)
        }
        Commands::Batch(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::batch::run(args, config, cli.verbose)
        }
        Commands::Info(args) => commands::info::run(args, cli.verbose),
        Commands::ExtractPage(args) => commands::extract::run(args, cli.verbose),
        Commands::AddProfile(args) => commands::profile::run(args, cli.verbose),
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
///
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            Ok(None)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    Ok(config.with_env())
}
