//! First-page extraction for multi-page TIFFs.

use crate::{ImageDescriptor, Jp2Result, ValidationError};
use jp2d_io::Format;
use jp2d_io::tiff::{self, TiffWriteOptions};
use std::path::Path;

/// Writes page 0 of a TIFF, upright, as a standalone TIFF at `output`.
///
/// Returns a descriptor for the new file.
///
/// # Errors
///
/// [`ValidationError::NotTiff`] for any non-TIFF source; transcode errors
/// if the page cannot be decoded or written.
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_core::{ImageDescriptor, extract_first_page};
///
/// let scan = ImageDescriptor::describe("/scans/folio.tif").unwrap();
/// if scan.is_multi_page() {
///     let page = extract_first_page(&scan, "/scans/folio-p1.tif").unwrap();
///     assert!(!page.is_multi_page());
/// }
/// ```
pub fn extract_first_page(source: &ImageDescriptor, output: impl AsRef<Path>) -> Jp2Result<ImageDescriptor> {
    let output = output.as_ref();
    if source.format() != Format::Tiff {
        return Err(ValidationError::NotTiff(source.mimetype().to_string()).into());
    }

    let image = jp2d_io::read(source.path())?;
    tiff::write(output, &image, TiffWriteOptions::default())?;
    tracing::info!(
        source = %source.path().display(),
        output = %output.display(),
        "extracted first page"
    );
    ImageDescriptor::describe(output)
}
