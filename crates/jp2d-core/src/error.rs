//! Error taxonomy for derivative generation.
//!
//! Every failure of [`create_jp2`](crate::create_jp2) is terminal for that
//! call; nothing is retried. Variants map onto the five failure classes a
//! caller has to distinguish: missing input, rejected input, filesystem
//! trouble, transcoder failure and encoder failure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for derivative operations.
pub type Jp2Result<T> = Result<T, Jp2Error>;

/// Errors that can occur while creating a JP2 derivative.
#[derive(Debug, Error)]
pub enum Jp2Error {
    /// Source path is missing or is a directory.
    #[error("input file {} does not exist or is a directory", .path.display())]
    NotFound {
        /// Offending path.
        path: PathBuf,
    },

    /// Input or options were rejected before any work was done.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Filesystem failure, carrying the path involved.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being read, written or removed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The raster could not be loaded, color converted or written.
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// The encoder process exited unsuccessfully or could not be started.
    #[error("JP2 creation command failed: {command} with result {output}")]
    Encode {
        /// Command line as run.
        command: String,
        /// Exit status, `None` if the process was killed or never spawned.
        status: Option<i32>,
        /// Captured stdout and stderr.
        output: String,
    },

    /// Configuration file could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

/// Reasons a source or its options are rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not an accepted raster mimetype, or the header could not be read.
    #[error("input file is not a valid image, or is the wrong mimetype ({mimetype})")]
    NotCandidate {
        /// Detected mimetype.
        mimetype: String,
    },

    /// Output exists and overwrite was not requested.
    #[error("output {} exists, cannot overwrite", .0.display())]
    OutputExists(PathBuf),

    /// Source is a JP2 and the output path is the source itself.
    #[error("cannot recreate jp2 over itself")]
    Jp2OverItself,

    /// Multi-page source under the reject policy.
    #[error("input file has {pages} pages; only single-page images can be converted")]
    MultiPage {
        /// Number of pages found.
        pages: usize,
    },

    /// Page extraction or profile assignment requested for a non-TIFF source.
    #[error("operation needs a TIFF source, got mimetype {0}")]
    NotTiff(String),

    /// Assigned profile does not describe the source's samples.
    #[error("profile {profile} does not apply to {color} samples")]
    ProfileMismatch {
        /// Profile name.
        profile: String,
        /// Color interpretation of the source.
        color: String,
    },
}

impl Jp2Error {
    /// Wraps an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<jp2d_io::IoError> for Jp2Error {
    fn from(err: jp2d_io::IoError) -> Self {
        Jp2Error::Transcode(err.to_string())
    }
}

impl From<jp2d_icc::IccError> for Jp2Error {
    fn from(err: jp2d_icc::IccError) -> Self {
        Jp2Error::Transcode(err.to_string())
    }
}
