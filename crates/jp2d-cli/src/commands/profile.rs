//! ICC profile assignment, for one TIFF or a directory of them.
//!
//! Files that already carry a profile are skipped unless `--force` is given.

use crate::AddProfileArgs;
use anyhow::{Context, Result, bail};
use jp2d_icc::StandardProfile;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, trace, warn};

pub fn run(args: AddProfileArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), profile = %args.profile, "profile::run");

    if !args.input.is_dir() {
        let tagged = assign(&args.input, args.profile, args.force)?;
        report(&args.input, tagged, args.profile);
        return Ok(());
    }

    let pattern = super::batch::source_pattern(&args.input, &args.extension, args.recursive);
    let files: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("Invalid pattern: {}", pattern))?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();

    if files.is_empty() {
        bail!("No files match pattern: {}", pattern);
    }
    info!(files = files.len(), pattern = %pattern, profile = %args.profile, "Assigning profiles");

    let results: Vec<Result<bool>> = files
        .par_iter()
        .map(|input| assign(input, args.profile, args.force))
        .collect();

    let (mut tagged, mut skipped, mut failed) = (0, 0, 0);
    for (input, result) in files.iter().zip(results) {
        match result {
            Ok(written) => {
                if written {
                    tagged += 1;
                } else {
                    skipped += 1;
                }
                if verbose > 0 {
                    report(input, written, args.profile);
                }
            }
            Err(e) => {
                failed += 1;
                warn!(input = %input.display(), error = %format!("{:#}", e), "profile assignment failed");
                eprintln!("Error: {:#}", e);
            }
        }
    }

    info!(tagged, skipped, failed, "Profile assignment complete");
    println!("Processed: {} tagged, {} skipped, {} failed", tagged, skipped, failed);

    if failed > 0 {
        bail!("{} files failed", failed);
    }
    Ok(())
}

/// Assigns `profile` to one file; true if the file was rewritten.
fn assign(input: &Path, profile: StandardProfile, force: bool) -> Result<bool> {
    let source = super::describe(input)?;
    let tagged = jp2d_core::assign_profile(&source, profile, force)
        .with_context(|| format!("Failed to assign {} to {}", profile, input.display()))?;
    Ok(tagged.is_some())
}

fn report(input: &Path, tagged: bool, profile: StandardProfile) {
    if tagged {
        println!("{}: embedded {}", input.display(), profile);
    } else {
        println!("{}: profile already embedded, skipped (use --force)", input.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jp2d_io::tiff::{self, TiffWriteOptions};
    use jp2d_io::{ColorModel, ImageData};

    fn rgb_tiff(path: &Path, icc: Option<Vec<u8>>) {
        let mut image = ImageData::from_u8(3, 2, ColorModel::Rgb, vec![90; 18]).unwrap();
        image.metadata.icc_profile = icc;
        tiff::write(path, &image, TiffWriteOptions::default()).unwrap();
    }

    fn has_profile(path: &Path) -> bool {
        jp2d_io::probe(path).unwrap().has_icc_profile()
    }

    fn args(input: &Path, force: bool, recursive: bool) -> AddProfileArgs {
        AddProfileArgs {
            input: input.to_path_buf(),
            profile: "Adobe RGB 1998".parse().unwrap(),
            force,
            extension: "tif".into(),
            recursive,
        }
    }

    #[test]
    fn test_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.tif");
        rgb_tiff(&path, None);

        assert!(assign(&path, StandardProfile::AdobeRgb, false).unwrap());
        assert!(has_profile(&path));
        assert!(!assign(&path, StandardProfile::Srgb, false).unwrap());
        assert!(assign(&path, StandardProfile::Srgb, true).unwrap());
    }

    #[test]
    fn test_directory_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("box1");
        std::fs::create_dir(&nested).unwrap();
        let marker = vec![0xAB; 128];
        rgb_tiff(&dir.path().join("a.tif"), None);
        rgb_tiff(&dir.path().join("b.tif"), Some(marker.clone()));
        rgb_tiff(&nested.join("c.tif"), None);

        run(args(dir.path(), false, false), 0).unwrap();

        assert!(has_profile(&dir.path().join("a.tif")));
        let kept = jp2d_io::probe(dir.path().join("b.tif")).unwrap();
        assert_eq!(kept.icc_profile, Some(marker));
        assert!(!has_profile(&nested.join("c.tif")));
    }

    #[test]
    fn test_directory_recursive_force() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("box1");
        std::fs::create_dir(&nested).unwrap();
        let marker = vec![0xAB; 128];
        rgb_tiff(&dir.path().join("b.tif"), Some(marker.clone()));
        rgb_tiff(&nested.join("c.tif"), None);

        run(args(dir.path(), true, true), 0).unwrap();

        let replaced = jp2d_io::probe(dir.path().join("b.tif")).unwrap();
        assert_ne!(replaced.icc_profile, Some(marker));
        assert!(has_profile(&nested.join("c.tif")));
    }

    #[test]
    fn test_failures_counted() {
        let dir = tempfile::tempdir().unwrap();
        let gray = ImageData::from_u8(1, 1, ColorModel::Gray, vec![7]).unwrap();
        tiff::write(dir.path().join("gray.tif"), &gray, TiffWriteOptions::default()).unwrap();
        rgb_tiff(&dir.path().join("rgb.tif"), None);

        let err = run(args(dir.path(), false, false), 0).unwrap_err();
        assert_eq!(err.to_string(), "1 files failed");
        assert!(has_profile(&dir.path().join("rgb.tif")));
    }
}
