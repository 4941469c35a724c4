//! Encoder command construction and invocation.
//!
//! The encoder runs as a child process behind the [`ProcessRunner`] trait.
//! Success is decided by the exit status alone; captured output is only
//! ever attached to errors.

use crate::config::EncoderConfig;
use crate::layers::EncoderParameters;
use crate::materialize::TempArtifact;
use crate::{ImageDescriptor, Jp2Error, Jp2Result, ValidationError};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A fully built encoder command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl EncoderCommand {
    /// Executable to run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments, in order.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Value following `flag`, if present.
    pub fn arg_after(&self, flag: &str) -> Option<&OsStr> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(OsString::as_os_str)
    }

    /// Returns true if `arg` appears verbatim.
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for EncoderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Exit status and combined output of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` if terminated by a signal.
    pub status: Option<i32>,
    /// Captured stdout followed by stderr.
    pub output: String,
}

impl ProcessOutput {
    /// Returns true for exit code 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs encoder commands to completion.
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` and waits for it.
    ///
    /// An `Err` means the process could not be started at all.
    fn run(&self, command: &EncoderCommand) -> io::Result<ProcessOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &EncoderCommand) -> io::Result<ProcessOutput> {
        let out = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .output()?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        Ok(ProcessOutput {
            status: out.status.code(),
            output,
        })
    }
}

/// Checks the conditions under which an encoder may be run for `source`.
///
/// No file is created or spawned if this fails. The JP2-over-itself case
/// is reported ahead of the candidate check so it is not masked by the
/// JP2 source being a non-candidate.
pub fn check_preconditions(
    source: &ImageDescriptor,
    output: &Path,
    overwrite: bool,
) -> Result<(), ValidationError> {
    if overwrite && source.is_jp2() && output == source.path() {
        return Err(ValidationError::Jp2OverItself);
    }
    if !source.is_candidate() {
        return Err(ValidationError::NotCandidate {
            mimetype: source.mimetype().to_string(),
        });
    }
    if !overwrite && output.exists() {
        return Err(ValidationError::OutputExists(output.to_path_buf()));
    }
    Ok(())
}

/// Builds and runs encoder commands.
#[derive(Clone, Copy)]
pub struct EncoderInvoker<'a> {
    config: &'a EncoderConfig,
    runner: &'a dyn ProcessRunner,
}

impl<'a> EncoderInvoker<'a> {
    /// Creates an invoker.
    pub fn new(config: &'a EncoderConfig, runner: &'a dyn ProcessRunner) -> Self {
        Self { config, runner }
    }

    /// Builds the command line:
    /// `<binary> -num_threads N <flags> [-jp2_space sRGB] Clayers=N -i <tmp> -o <out>`.
    pub fn command(&self, input: &Path, output: &Path, params: &EncoderParameters) -> EncoderCommand {
        let mut args: Vec<OsString> = vec!["-num_threads".into(), self.config.threads.to_string().into()];
        args.extend(self.config.flags.iter().map(OsString::from));
        if params.force_srgb_space_flag {
            args.push("-jp2_space".into());
            args.push("sRGB".into());
        }
        args.push(format!("Clayers={}", params.resolution_layers).into());
        args.push("-i".into());
        args.push(input.into());
        args.push("-o".into());
        args.push(output.into());

        EncoderCommand {
            program: self.config.binary.clone(),
            args,
        }
    }

    /// Encodes `artifact` into `output`.
    ///
    /// The artifact is consumed. It is deleted on every path unless
    /// `preserve` is set, in which case its path is returned. On failure any
    /// partially written `output` is removed.
    ///
    /// # Errors
    ///
    /// [`Jp2Error::Encode`] if the encoder cannot be started or exits
    /// non-zero, [`Jp2Error::Io`] if the temp file cannot be removed after a
    /// successful run.
    pub fn encode(
        &self,
        artifact: TempArtifact,
        output: &Path,
        params: &EncoderParameters,
        preserve: bool,
    ) -> Jp2Result<Option<PathBuf>> {
        let command = self.command(artifact.path(), output, params);
        tracing::debug!(%command, "running encoder");

        let result = match self.runner.run(&command) {
            Ok(result) => result,
            Err(e) => ProcessOutput {
                status: None,
                output: e.to_string(),
            },
        };

        if !result.success() {
            remove_partial(output);
            if preserve {
                let kept = artifact.keep()?;
                tracing::warn!(tmp = %kept.display(), "keeping temp artifact after encoder failure");
            }
            return Err(Jp2Error::Encode {
                command: command.to_string(),
                status: result.status,
                output: result.output,
            });
        }

        if preserve {
            return artifact.keep().map(Some);
        }
        artifact.close()?;
        Ok(None)
    }
}

fn remove_partial(output: &Path) {
    if !output.exists() {
        return;
    }
    match std::fs::remove_file(output) {
        Ok(()) => tracing::debug!(path = %output.display(), "removed partial output"),
        Err(e) => tracing::warn!(path = %output.display(), error = %e, "failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::{LcmsTranscoder, Materializer};
    use crate::plan::Planner;
    use jp2d_io::tiff::{self, TiffWriteOptions};
    use jp2d_io::{ColorModel, ImageData};
    use std::sync::Mutex;

    /// Records the command and optionally writes some bytes to `-o`.
    struct Scripted {
        status: Option<i32>,
        write: bool,
        seen: Mutex<Option<EncoderCommand>>,
    }

    impl Scripted {
        fn new(status: Option<i32>, write: bool) -> Self {
            Self {
                status,
                write,
                seen: Mutex::new(None),
            }
        }
    }

    impl ProcessRunner for Scripted {
        fn run(&self, command: &EncoderCommand) -> io::Result<ProcessOutput> {
            *self.seen.lock().unwrap() = Some(command.clone());
            if self.write {
                std::fs::write(command.arg_after("-o").unwrap(), b"partial")?;
            }
            Ok(ProcessOutput {
                status: self.status,
                output: "Kakadu Error: bad things".into(),
            })
        }
    }

    struct NoSpawn;

    impl ProcessRunner for NoSpawn {
        fn run(&self, _command: &EncoderCommand) -> io::Result<ProcessOutput> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
        }
    }

    fn artifact(dir: &Path) -> TempArtifact {
        let path = dir.join("src.tif");
        let image = ImageData::from_u8(8, 8, ColorModel::Rgb, vec![7; 192]).unwrap();
        tiff::write(&path, &image, TiffWriteOptions::default()).unwrap();
        let source = ImageDescriptor::describe(path).unwrap();
        let plan = Planner::new().plan(source.info().unwrap());
        let transcoder = LcmsTranscoder::default();
        Materializer::new(&transcoder)
            .materialize(&source, &plan, dir)
            .unwrap()
    }

    #[test]
    fn test_command_layout() {
        let config = EncoderConfig::default();
        let invoker = EncoderInvoker::new(&config, &SystemRunner);
        let params = EncoderParameters {
            resolution_layers: 4,
            force_srgb_space_flag: true,
        };
        let cmd = invoker.command(Path::new("/tmp/in.tif"), Path::new("/out/x.jp2"), &params);
        assert_eq!(
            cmd.to_string(),
            "kdu_compress -num_threads 2 -quiet Creversible=no Corder=RPCL Cblk={64,64} \
             Cprecincts={256,256},{256,256},{128,128} ORGgen_plt=yes -rate - Clevels=5 \
             -jp2_space sRGB Clayers=4 -i /tmp/in.tif -o /out/x.jp2"
        );
        assert_eq!(cmd.arg_after("-o").unwrap(), "/out/x.jp2");
    }

    #[test]
    fn test_command_without_srgb_flag() {
        let config = EncoderConfig {
            threads: 1,
            ..EncoderConfig::default()
        };
        let invoker = EncoderInvoker::new(&config, &SystemRunner);
        let params = EncoderParameters::new(50, 50, false);
        let cmd = invoker.command(Path::new("a.tif"), Path::new("b.jp2"), &params);
        assert!(!cmd.has_arg("-jp2_space"));
        assert!(cmd.has_arg("Clayers=1"));
        assert_eq!(cmd.arg_after("-num_threads").unwrap(), "1");
    }

    #[test]
    fn test_success_deletes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path());
        let tmp = artifact.path().to_path_buf();
        let output = dir.path().join("out.jp2");

        let config = EncoderConfig::default();
        let runner = Scripted::new(Some(0), true);
        let kept = EncoderInvoker::new(&config, &runner)
            .encode(artifact, &output, &EncoderParameters::new(8, 8, true), false)
            .unwrap();

        assert_eq!(kept, None);
        assert!(!tmp.exists());
        assert!(output.exists());
        let seen = runner.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.arg_after("-i").unwrap(), tmp.as_os_str());
    }

    #[test]
    fn test_success_preserves_temp() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path());
        let tmp = artifact.path().to_path_buf();

        let config = EncoderConfig::default();
        let runner = Scripted::new(Some(0), true);
        let kept = EncoderInvoker::new(&config, &runner)
            .encode(artifact, &dir.path().join("out.jp2"), &EncoderParameters::new(8, 8, true), true)
            .unwrap();

        assert_eq!(kept.as_deref(), Some(tmp.as_path()));
        assert!(tmp.exists());
    }

    #[test]
    fn test_failure_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path());
        let tmp = artifact.path().to_path_buf();
        let output = dir.path().join("out.jp2");

        let config = EncoderConfig::default();
        let runner = Scripted::new(Some(1), true);
        let err = EncoderInvoker::new(&config, &runner)
            .encode(artifact, &output, &EncoderParameters::new(8, 8, true), false)
            .unwrap_err();

        match err {
            Jp2Error::Encode { command, status, output: text } => {
                assert!(command.starts_with("kdu_compress -num_threads 2"));
                assert_eq!(status, Some(1));
                assert!(text.contains("Kakadu Error"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
        assert!(!tmp.exists());
    }

    #[test]
    fn test_signal_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path());
        let config = EncoderConfig::default();
        let runner = Scripted::new(None, false);
        let err = EncoderInvoker::new(&config, &runner)
            .encode(artifact, &dir.path().join("o.jp2"), &EncoderParameters::new(8, 8, true), false)
            .unwrap_err();
        assert!(matches!(err, Jp2Error::Encode { status: None, .. }));
    }

    #[test]
    fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = artifact(dir.path());
        let tmp = artifact.path().to_path_buf();
        let config = EncoderConfig::default();
        let err = EncoderInvoker::new(&config, &NoSpawn)
            .encode(artifact, &dir.path().join("o.jp2"), &EncoderParameters::new(8, 8, true), false)
            .unwrap_err();
        assert!(matches!(err, Jp2Error::Encode { status: None, .. }));
        assert!(!tmp.exists());
    }

    #[test]
    fn test_preconditions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.tif");
        let image = ImageData::from_u8(2, 2, ColorModel::Gray, vec![0; 4]).unwrap();
        tiff::write(&path, &image, TiffWriteOptions::default()).unwrap();
        let source = ImageDescriptor::describe(&path).unwrap();

        let output = dir.path().join("a.jp2");
        assert_eq!(check_preconditions(&source, &output, false), Ok(()));

        std::fs::write(&output, b"existing").unwrap();
        assert_eq!(
            check_preconditions(&source, &output, false),
            Err(ValidationError::OutputExists(output.clone()))
        );
        assert_eq!(check_preconditions(&source, &output, true), Ok(()));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        let source = ImageDescriptor::describe(&text).unwrap();
        assert!(matches!(
            check_preconditions(&source, &output, true),
            Err(ValidationError::NotCandidate { .. })
        ));
    }

    #[test]
    fn test_jp2_over_itself() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.jp2");
        let mut bytes = jp2_signature();
        bytes.extend_from_slice(&[0; 16]);
        std::fs::write(&path, bytes).unwrap();
        let source = ImageDescriptor::describe(&path).unwrap();

        assert_eq!(
            check_preconditions(&source, &path, true),
            Err(ValidationError::Jp2OverItself)
        );
        assert!(matches!(
            check_preconditions(&source, &dir.path().join("b.jp2"), true),
            Err(ValidationError::NotCandidate { .. })
        ));
    }

    fn jp2_signature() -> Vec<u8> {
        vec![0, 0, 0, 12, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A]
    }
}
