//! Per-call options and per-pipeline configuration.
//!
//! [`Jp2Options`] carries what changes from one derivative to the next
//! (output path, overwrite, temp handling). [`PipelineConfig`] carries what
//! a deployment fixes once: the encoder binary and its baseline flags and
//! the CMYK source profile. The latter loads from YAML.
//!
//! ```yaml
//! encoder:
//!   binary: /opt/kakadu/bin/kdu_compress
//!   threads: 2
//! color:
//!   cmyk_profile: /etc/jp2d/USWebCoatedSWOP.icc
//!   intent: perceptual
//! ```

use crate::{Jp2Error, Jp2Result};
use jp2d_icc::Intent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`EncoderConfig::binary`].
pub const ENCODER_ENV: &str = "JP2D_ENCODER";

/// Default encoder binary.
pub const DEFAULT_ENCODER: &str = "kdu_compress";

/// What to do with a multi-page source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiPagePolicy {
    /// Fail validation.
    #[default]
    Reject,
    /// Convert page 0 only.
    FirstPage,
}

/// Options for one [`create_jp2`](crate::create_jp2) call.
///
/// # Example
///
/// ```rust
/// use jp2d_core::Jp2Options;
///
/// let options = Jp2Options::default()
///     .with_output_path("/derivatives/page-001.jp2")
///     .with_overwrite(true);
/// assert!(!options.preserve_temp_artifact);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Jp2Options {
    /// Output path; defaults to the source with a `.jp2` extension.
    pub output_path: Option<PathBuf>,
    /// Replace an existing output file. Default: false.
    pub overwrite: bool,
    /// Directory for the intermediate TIFF; defaults to the system temp dir.
    pub tmp_dir: Option<PathBuf>,
    /// Keep the intermediate TIFF after the call. Default: false.
    pub preserve_temp_artifact: bool,
    /// Multi-page handling. Default: reject.
    pub multi_page: MultiPagePolicy,
}

impl Jp2Options {
    /// Sets the output path.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Sets whether an existing output may be replaced.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the directory for the intermediate TIFF.
    pub fn with_tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(dir.into());
        self
    }

    /// Keeps the intermediate TIFF after the call.
    pub fn with_preserve_temp_artifact(mut self, preserve: bool) -> Self {
        self.preserve_temp_artifact = preserve;
        self
    }

    /// Sets the multi-page policy.
    pub fn with_multi_page(mut self, policy: MultiPagePolicy) -> Self {
        self.multi_page = policy;
        self
    }

    /// Temp directory to use: the configured one or the system default.
    pub fn tmp_dir_or_default(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Encoder invocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Encoder executable, resolved through `PATH` when relative.
    pub binary: PathBuf,
    /// Cap on the encoder's worker threads.
    pub threads: u32,
    /// Baseline flags placed after the thread cap.
    pub flags: Vec<String>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_ENCODER),
            threads: 2,
            flags: [
                "-quiet",
                "Creversible=no",
                "Corder=RPCL",
                "Cblk={64,64}",
                "Cprecincts={256,256},{256,256},{128,128}",
                "ORGgen_plt=yes",
                "-rate",
                "-",
                "Clevels=5",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Color normalization settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// ICC profile assumed for CMYK sources without an embedded CMYK
    /// profile; the built-in generic CMYK profile when unset.
    pub cmyk_profile: Option<PathBuf>,
    /// Rendering intent for all transforms.
    pub intent: Intent,
}

/// Deployment configuration for a [`Jp2Pipeline`](crate::Jp2Pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Encoder settings.
    pub encoder: EncoderConfig,
    /// Color settings.
    pub color: ColorConfig,
}

impl PipelineConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Jp2Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Jp2Error::io(path, e))?;
        Self::from_yaml_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Jp2Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Jp2Error::Config(e.to_string()))
    }

    /// Applies overrides from the environment.
    pub fn with_env(self) -> Self {
        self.with_encoder_override(std::env::var_os(ENCODER_ENV).map(PathBuf::from))
    }

    /// Replaces the encoder binary when `binary` is set and non-empty.
    pub fn with_encoder_override(mut self, binary: Option<PathBuf>) -> Self {
        if let Some(binary) = binary.filter(|b| !b.as_os_str().is_empty()) {
            self.encoder.binary = binary;
        }
        self
    }
}
