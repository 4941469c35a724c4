//! Image info command.
//!
//! Prints descriptor facts for sources and derivatives alike; JP2 files
//! additionally show their box header.

use crate::InfoArgs;
use anyhow::Result;
use jp2d_core::ImageDescriptor;
use jp2d_io::ImageInfo;
use jp2d_io::jp2::Jp2Header;
use serde::Serialize;
use tracing::{trace, warn};

/// Descriptor facts for one file.
#[derive(Serialize)]
struct Report<'a> {
    file: String,
    mimetype: &'static str,
    candidate: bool,
    multi_page: bool,
    #[serde(flatten)]
    info: Option<&'a ImageInfo>,
    profile_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    jp2: Option<Jp2Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Runs the info command.
pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    trace!(files = args.input.len(), "info::run");

    let descriptors = args
        .input
        .iter()
        .map(|path| super::describe(path))
        .collect::<Result<Vec<_>>>()?;
    let reports = descriptors
        .iter()
        .map(|d| report(d, args.checksum))
        .collect::<Result<Vec<_>>>()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    for (idx, report) in reports.iter().enumerate() {
        print_text(report, verbose);
        if idx + 1 < reports.len() {
            println!();
        }
    }
    Ok(())
}

fn report(descriptor: &ImageDescriptor, checksum: bool) -> Result<Report<'_>> {
    let (info, error) = match descriptor.info() {
        Ok(info) => (Some(info), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let profile_description = match descriptor.profile_description() {
        Ok(desc) => desc,
        Err(e) => {
            warn!(file = %descriptor.path().display(), error = %e, "unreadable ICC profile");
            None
        }
    };

    let jp2 = match descriptor.jp2_header() {
        Ok(header) => header,
        Err(e) => {
            warn!(file = %descriptor.path().display(), error = %e, "unreadable JP2 header");
            None
        }
    };

    let sha256 = if checksum {
        Some(descriptor.sha256()?.to_string())
    } else {
        None
    };

    Ok(Report {
        file: descriptor.path().display().to_string(),
        mimetype: descriptor.mimetype(),
        candidate: descriptor.is_candidate(),
        multi_page: descriptor.is_multi_page(),
        info,
        profile_description,
        sha256,
        jp2,
        error,
    })
}

fn print_text(report: &Report<'_>, verbose: u8) {
    println!("{}", report.file);
    println!("  Mimetype:   {}", report.mimetype);
    if let Some(info) = report.info {
        println!("  Resolution: {}x{}", info.width, info.height);
        println!("  Samples:    {} x {:?} bits", info.samples_per_pixel, info.bits_per_sample);
        println!("  Color:      {:?}", info.color);
        println!("  File size:  {}", super::format_size(info.file_size));
        if info.page_count > 1 {
            println!("  Pages:      {}", info.page_count);
        }
        if verbose > 0 {
            println!("  Orientation: {:?}", info.orientation);
        }
    }
    if let Some(desc) = &report.profile_description {
        println!("  Profile:    {}", desc);
    }
    println!("  Candidate:  {}", report.candidate);
    if let Some(jp2) = &report.jp2 {
        println!("  Components: {}", jp2.components);
        if let Some(space) = &jp2.color_space {
            println!("  JP2 space:  {:?}", space);
        }
        if let Some(layers) = jp2.quality_layers {
            println!("  Layers:     {}", layers);
        }
        if let Some(levels) = jp2.decomposition_levels {
            println!("  Levels:     {}", levels);
        }
    }
    if let Some(sha) = &report.sha256 {
        println!("  SHA-256:    {}", sha);
    }
    if let Some(error) = &report.error {
        println!("  Error:      {}", error);
    }
}
