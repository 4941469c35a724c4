//! CLI command implementations

pub mod batch;
pub mod create;
pub mod extract;
pub mod info;
pub mod profile;

use anyhow::{Context, Result};
use jp2d_core::{ImageDescriptor, Jp2Options, MultiPagePolicy};
use std::path::{Path, PathBuf};

/// Describe a source path
pub fn describe(path: &Path) -> Result<ImageDescriptor> {
    ImageDescriptor::describe(path).with_context(|| format!("Failed to open: {}", path.display()))
}

/// Build per-call options from flags
pub fn options(output: Option<PathBuf>, overwrite: bool, tmp_dir: Option<PathBuf>, first_page: bool) -> Jp2Options {
    let mut options = Jp2Options::default().with_overwrite(overwrite);
    if let Some(output) = output {
        options = options.with_output_path(output);
    }
    if let Some(dir) = tmp_dir {
        options = options.with_tmp_dir(dir);
    }
    if first_page {
        options = options.with_multi_page(MultiPagePolicy::FirstPage);
    }
    options
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_options() {
        let opts = options(None, true, None, true);
        assert!(opts.overwrite);
        assert_eq!(opts.output_path, None);
        assert_eq!(opts.multi_page, MultiPagePolicy::FirstPage);

        let opts = options(Some("a.jp2".into()), false, Some("/t".into()), false);
        assert_eq!(opts.output_path, Some(PathBuf::from("a.jp2")));
        assert_eq!(opts.tmp_dir, Some(PathBuf::from("/t")));
        assert_eq!(opts.multi_page, MultiPagePolicy::Reject);
    }
}
