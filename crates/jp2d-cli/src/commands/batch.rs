//! Directory batch conversion.
//!
//! Every matching file is converted independently; one failure never stops
//! the others.

use crate::BatchArgs;
use anyhow::{Context, Result, bail};
use jp2d_core::{Jp2Options, Jp2Pipeline, PipelineConfig};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, trace, warn};

pub fn run(args: BatchArgs, config: PipelineConfig, verbose: u8) -> Result<()> {
    trace!(source = %args.source_dir.display(), ext = %args.extension, "batch::run");

    if !args.source_dir.is_dir() {
        bail!("Source directory does not exist: {}", args.source_dir.display());
    }
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.source_dir.join("jp2"));

    let pattern = source_pattern(&args.source_dir, &args.extension, args.recursive);
    let files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid pattern: {}", pattern))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && !p.starts_with(&output_dir))
        .collect();

    if files.is_empty() {
        bail!("No files match pattern: {}", pattern);
    }

    info!(files = files.len(), pattern = %pattern, "Starting batch conversion");
    if verbose > 0 {
        println!("Found {} files matching '{}'", files.len(), pattern);
    }

    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

    let pipeline = Jp2Pipeline::new(config);
    let base = super::options(None, args.overwrite, args.tmp_dir.clone(), args.first_page);

    let results: Vec<Result<PathBuf>> = files
        .par_iter()
        .map(|input| process_file(&pipeline, input, &args.source_dir, &output_dir, &base))
        .collect();

    let mut success = 0;
    let mut failed = 0;
    for (input, result) in files.iter().zip(results) {
        match result {
            Ok(output) => {
                success += 1;
                if verbose > 0 {
                    println!("{} -> {}", input.display(), output.display());
                }
            }
            Err(e) => {
                failed += 1;
                warn!(input = %input.display(), error = %format!("{:#}", e), "conversion failed");
                eprintln!("Error: {:#}", e);
            }
        }
    }

    info!(success, failed, "Batch conversion complete");
    println!("Processed: {} success, {} failed", success, failed);

    if failed > 0 {
        bail!("{} files failed", failed);
    }

    Ok(())
}

fn process_file(
    pipeline: &Jp2Pipeline,
    input: &Path,
    source_dir: &Path,
    output_dir: &Path,
    base: &Jp2Options,
) -> Result<PathBuf> {
    let output = output_path(input, source_dir, output_dir);
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let source = super::describe(input)?;
    let options = base.clone().with_output_path(&output);
    pipeline
        .create_jp2(&source, &options)
        .with_context(|| format!("Failed to create JP2 for {}", input.display()))?;
    Ok(output)
}

/// Glob pattern for sources directly in `dir`, or anywhere below it.
pub(super) fn source_pattern(dir: &Path, extension: &str, recursive: bool) -> String {
    let dir = glob::Pattern::escape(&dir.to_string_lossy());
    let ext = extension.trim_start_matches('.');
    if recursive {
        format!("{}/**/*.{}", dir, ext)
    } else {
        format!("{}/*.{}", dir, ext)
    }
}

/// Output path mirroring the input's position below `source_dir`.
fn output_path(input: &Path, source_dir: &Path, output_dir: &Path) -> PathBuf {
    let relative = input
        .strip_prefix(source_dir)
        .ok()
        .map(Path::to_path_buf)
        .or_else(|| input.file_name().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("output"));
    output_dir.join(relative).with_extension("jp2")
}
