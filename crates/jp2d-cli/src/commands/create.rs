//! Single-image JP2 creation.

use crate::CreateArgs;
use anyhow::{Context, Result};
use jp2d_core::{Jp2Pipeline, PipelineConfig};
use tracing::trace;

pub fn run(args: CreateArgs, config: PipelineConfig, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), "create::run");

    let config = config.with_encoder_override(args.encoder);
    let source = super::describe(&args.input)?;
    let options = super::options(args.output, args.overwrite, args.tmp_dir, args.first_page);
    let options = options.with_preserve_temp_artifact(args.preserve_tmp);

    let result = Jp2Pipeline::new(config)
        .create_jp2(&source, &options)
        .with_context(|| format!("Failed to create JP2 for {}", args.input.display()))?;

    println!("{} -> {}", args.input.display(), result.image.path().display());
    if verbose > 0 {
        println!("  Layers:     {}", result.parameters.resolution_layers);
        println!("  Transform:  {:?}", result.plan.transform_kind);
        println!("  sRGB flag:  {}", result.parameters.force_srgb_space_flag);
    }
    if result.temp_preserved {
        println!("  Temp TIFF:  {}", result.temp_path.display());
    }

    Ok(())
}
