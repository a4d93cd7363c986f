//! External process execution behind a small trait so the docker and
//! gcloud adapters can be driven by scripted fakes in tests.

use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;


/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Returns stdout followed by stderr. The streams are captured
    /// separately, so lines written to both are not interleaved; callers
    /// that need the original order merge them in the child.
    #[must_use]
    pub fn combined(&self) -> String {
        let mut combined = String::with_capacity(self.stdout.len() + self.stderr.len());
        combined.push_str(&self.stdout);
        combined.push_str(&self.stderr);
        combined
    }
}

/// Errors raised when a command cannot be executed at all.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RunnerError {
    /// The process could not be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error text.
        message: String,
    },
    /// Waiting on the spawned process failed.
    #[error("failed to wait for {program}: {message}")]
    Wait {
        /// Program that was running.
        program: String,
        /// Operating system error text.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RunnerError>;

    /// Runs `program` while forwarding its output to the caller's terminal.
    /// The output is still captured and returned. Implementations without a
    /// terminal fall back to [`CommandRunner::run`].
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] if the command cannot be started or awaited.
    fn run_streaming(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, RunnerError> {
        self.run(program, args)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, RunnerError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| RunnerError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_streaming(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, RunnerError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| RunnerError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();
        let (stdout, stderr) = thread::scope(|scope| {
            let out = scope.spawn(move || tee(child_stdout, io::stdout()));
            let err = scope.spawn(move || tee(child_stderr, io::stderr()));
            (out.join().unwrap_or_default(), err.join().unwrap_or_default())
        });

        let status = child.wait().map_err(|err| RunnerError::Wait {
            program: program.to_owned(),
            message: err.to_string(),
        })?;

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Copies everything from `source` into `sink` chunk by chunk and returns the
/// captured bytes as lossy UTF-8.
fn tee<R: Read, W: Write>(source: Option<R>, mut sink: W) -> String {
    let Some(mut reader) = source else {
        return String::new();
    };
    let mut captured = Vec::new();
    let mut buffer = [0_u8; 4096];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                let chunk = buffer.get(..read).unwrap_or_default();
                captured.extend_from_slice(chunk);
                sink.write_all(chunk).ok();
                sink.flush().ok();
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&captured).into_owned()
}
