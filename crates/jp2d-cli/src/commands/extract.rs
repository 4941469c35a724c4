//! First-page extraction command.

use crate::ExtractPageArgs;
use anyhow::{Context, Result, bail};
use tracing::trace;

pub fn run(args: ExtractPageArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "extract::run");

    if !args.overwrite && args.output.exists() {
        bail!("Output exists, use --overwrite: {}", args.output.display());
    }

    let source = super::describe(&args.input)?;
    if verbose > 0 && !source.is_multi_page() {
        println!("{} has a single page", args.input.display());
    }

    let page = jp2d_core::extract_first_page(&source, &args.output)
        .with_context(|| format!("Failed to extract first page of {}", args.input.display()))?;
    println!("{} -> {}", args.input.display(), page.path().display());
    Ok(())
}
