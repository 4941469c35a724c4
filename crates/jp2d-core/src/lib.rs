//! # jp2d-core
//!
//! JP2 derivative generation for digitization pipelines.
//!
//! A source TIFF or JPEG is inspected, normalized into an uncompressed
//! sRGB (or grayscale) intermediate TIFF and handed to an external JPEG 2000
//! encoder. The crate owns the decisions and the failure semantics; pixel
//! I/O lives in `jp2d-io` and color math in `jp2d-icc`.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use jp2d_core::{ImageDescriptor, Jp2Options, create_jp2};
//!
//! let source = ImageDescriptor::describe("/scans/page-001.tif")?;
//! let jp2 = create_jp2(&source, &Jp2Options::default())?;
//! println!("wrote {}", jp2.path().display());
//! # Ok::<(), jp2d_core::Jp2Error>(())
//! ```
//!
//! # Components
//!
//! | Stage | Type | Role |
//! |-------|------|------|
//! | Validating | [`ImageDescriptor`], [`check_preconditions`] | Source and output checks |
//! | Planning | [`Planner`] | Chooses the color transform and TIFF layout |
//! | Materializing | [`Materializer`] | Writes the intermediate TIFF |
//! | Encoding | [`EncoderInvoker`] | Runs the encoder, cleans up |
//!
//! [`layers()`] computes the resolution layer count passed to the encoder.
//! [`assign_profile`] tags untagged TIFF masters with a built-in ICC
//! profile ahead of conversion.
//!
//! # Cleanup
//!
//! Every failed call leaves no output file and no intermediate TIFF behind,
//! unless [`Jp2Options::preserve_temp_artifact`] was set.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod assign;
pub mod config;
pub mod descriptor;
pub mod encoder;
mod error;
pub mod layers;
pub mod materialize;
mod page;
pub mod pipeline;
pub mod plan;

pub use assign::assign_profile;
pub use config::{ColorConfig, EncoderConfig, Jp2Options, MultiPagePolicy, PipelineConfig};
pub use descriptor::{ImageDescriptor, default_jp2_path};
pub use encoder::{EncoderCommand, EncoderInvoker, ProcessOutput, ProcessRunner, SystemRunner, check_preconditions};
pub use error::{Jp2Error, Jp2Result, ValidationError};
pub use layers::{EncoderParameters, layers};
pub use materialize::{LcmsTranscoder, Materializer, RasterTranscoder, TempArtifact};
pub use page::extract_first_page;
pub use pipeline::{Derivative, Jp2Pipeline, Stage, create_jp2};
pub use plan::{BigTiffPolicy, ConversionPlan, Planner, TransformKind};
