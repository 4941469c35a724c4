//! The `CreateJp2` composition.
//!
//! A call moves through [`Stage`]s strictly in order. A failure ends the
//! call in [`Stage::Failed`] after the failing stage has cleaned up its own
//! files; nothing is retried.

use crate::config::{Jp2Options, MultiPagePolicy, PipelineConfig};
use crate::encoder::{EncoderInvoker, ProcessRunner, SystemRunner, check_preconditions};
use crate::layers::EncoderParameters;
use crate::materialize::{LcmsTranscoder, Materializer, RasterTranscoder};
use crate::plan::{ConversionPlan, Planner};
use crate::{ImageDescriptor, Jp2Result, ValidationError};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Source and options checks.
    Validating,
    /// Normalization planning.
    Planning,
    /// Writing the intermediate TIFF.
    Materializing,
    /// Running the encoder.
    Encoding,
    /// Output written.
    Done,
    /// Terminal failure.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::Planning => "planning",
            Stage::Materializing => "materializing",
            Stage::Encoding => "encoding",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of a successful [`Jp2Pipeline::create_jp2`].
#[derive(Debug)]
pub struct Derivative {
    /// Descriptor for the written JP2.
    pub image: ImageDescriptor,
    /// Intermediate TIFF path used during the call.
    pub temp_path: PathBuf,
    /// True if the intermediate TIFF was left on disk.
    pub temp_preserved: bool,
    /// Parameters passed to the encoder.
    pub parameters: EncoderParameters,
    /// Normalization applied to the source.
    pub plan: ConversionPlan,
}

impl Derivative {
    /// Consumes the result, returning the JP2 descriptor.
    pub fn into_image(self) -> ImageDescriptor {
        self.image
    }
}

/// Creates JP2 derivatives.
///
/// Holds no per-call state; one pipeline can serve many concurrent calls.
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_core::{ImageDescriptor, Jp2Options, Jp2Pipeline, PipelineConfig};
///
/// let pipeline = Jp2Pipeline::new(PipelineConfig::default().with_env());
/// let source = ImageDescriptor::describe("/scans/page-001.tif").unwrap();
/// let result = pipeline.create_jp2(&source, &Jp2Options::default()).unwrap();
/// println!("{}", result.image.path().display());
/// ```
pub struct Jp2Pipeline {
    config: PipelineConfig,
    planner: Planner,
    transcoder: Box<dyn RasterTranscoder>,
    runner: Box<dyn ProcessRunner>,
}

impl Jp2Pipeline {
    /// Pipeline running the configured encoder as a child process.
    pub fn new(config: PipelineConfig) -> Self {
        let transcoder = Box::new(LcmsTranscoder::new(config.color.clone()));
        Self {
            config,
            planner: Planner::new(),
            transcoder,
            runner: Box::new(SystemRunner),
        }
    }

    /// Replaces the process runner.
    pub fn with_runner(mut self, runner: impl ProcessRunner + 'static) -> Self {
        self.runner = Box::new(runner);
        self
    }

    /// Replaces the raster transcoder.
    pub fn with_transcoder(mut self, transcoder: impl RasterTranscoder + 'static) -> Self {
        self.transcoder = Box::new(transcoder);
        self
    }

    /// Replaces the planner.
    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Converts `source` into a JP2.
    ///
    /// # Errors
    ///
    /// Any [`Jp2Error`](crate::Jp2Error). On error no output file is left
    /// behind and the intermediate TIFF is gone unless preservation was
    /// requested.
    pub fn create_jp2(&self, source: &ImageDescriptor, options: &Jp2Options) -> Jp2Result<Derivative> {
        let span = tracing::info_span!("create_jp2", source = %source.path().display());
        let _enter = span.enter();

        let mut stage = Stage::Validating;
        tracing::debug!(%stage, "stage");
        let result = self.run(source, options, &mut stage);
        match &result {
            Ok(derivative) => {
                advance(&mut stage, Stage::Done);
                tracing::info!(
                    output = %derivative.image.path().display(),
                    layers = derivative.parameters.resolution_layers,
                    "created JP2"
                );
            }
            Err(error) => {
                tracing::debug!(from = %stage, %error, "stage failed");
                advance(&mut stage, Stage::Failed);
            }
        }
        result
    }

    fn run(&self, source: &ImageDescriptor, options: &Jp2Options, stage: &mut Stage) -> Jp2Result<Derivative> {
        let output = options
            .output_path
            .clone()
            .unwrap_or_else(|| source.default_jp2_path());
        check_preconditions(source, &output, options.overwrite)?;
        if source.is_multi_page() {
            let pages = source.info()?.page_count;
            match options.multi_page {
                MultiPagePolicy::Reject => return Err(ValidationError::MultiPage { pages }.into()),
                MultiPagePolicy::FirstPage => tracing::debug!(pages, "converting first page only"),
            }
        }

        advance(stage, Stage::Planning);
        let plan = self.planner.plan(source.info()?);

        advance(stage, Stage::Materializing);
        let tmp_dir = options.tmp_dir_or_default();
        let artifact = Materializer::new(self.transcoder.as_ref()).materialize(source, &plan, &tmp_dir)?;
        let temp_path = artifact.path().to_path_buf();
        let parameters = EncoderParameters::new(artifact.width(), artifact.height(), artifact.is_srgb());

        advance(stage, Stage::Encoding);
        let kept = EncoderInvoker::new(&self.config.encoder, self.runner.as_ref()).encode(
            artifact,
            &output,
            &parameters,
            options.preserve_temp_artifact,
        )?;

        Ok(Derivative {
            image: ImageDescriptor::describe(output)?,
            temp_path,
            temp_preserved: kept.is_some(),
            parameters,
            plan,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "stage");
    *stage = next;
}

/// Converts `source` into a JP2 with the default configuration.
///
/// The encoder binary can be overridden with the
/// [`JP2D_ENCODER`](crate::config::ENCODER_ENV) environment variable.
///
/// # Example
///
/// ```rust,no_run
/// use jp2d_core::{ImageDescriptor, Jp2Options, create_jp2};
///
/// let source = ImageDescriptor::describe("/scans/page-001.tif").unwrap();
/// let jp2 = create_jp2(&source, &Jp2Options::default().with_overwrite(true)).unwrap();
/// assert_eq!(jp2.mimetype(), "image/jp2");
/// ```
pub fn create_jp2(source: &ImageDescriptor, options: &Jp2Options) -> Jp2Result<ImageDescriptor> {
    Jp2Pipeline::new(PipelineConfig::default().with_env())
        .create_jp2(source, options)
        .map(Derivative::into_image)
}
