//! External tool invocation with timeouts and captured diagnostics.
//!
//! [`Cmd`] is a small builder around [`std::process::Command`]. Every run
//! drains stdout/stderr, enforces a hard timeout, records the output in a
//! [`CapturedOutput`] and then applies the tool's success policy:
//!
//! - nonzero exit fails unless an [`Cmd::on_error`] predicate tolerates it
//! - zero exit succeeds unless an [`Cmd::check_output`] validator rejects it
//! - a timeout always fails
//!
//! ```rust,ignore
//! let mut captured = CapturedOutput::new(fixture_dir);
//! Cmd::new("fsck.ext4")
//!     .args(["-n", "-f"])
//!     .arg_path(&image)
//!     .error_msg("fsck.ext4 reported errors in converted image")
//!     .on_error(|out| out.code.is_some_and(|c| c & !0b11 != 0))
//!     .run(&mut captured)?;
//! ```

use crate::capture::CapturedOutput;
use crate::error::{OutputRejection, ToolError};
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Timeout applied when neither the caller nor the environment sets one.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

// How long to wait for the pipe readers once the child is gone. Forked
// helpers that inherit the pipes would otherwise block us forever.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

type ErrorHandler = Box<dyn Fn(&ToolOutput) -> bool>;
type OutputCheck = Box<dyn Fn(&ToolOutput) -> Result<(), OutputRejection>>;

/// What a finished tool produced.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Builder for one external tool invocation.
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    name: String,
    timeout: Duration,
    error_msg: Option<String>,
    error_handler: Option<ErrorHandler>,
    output_check: Option<OutputCheck>,
}

impl Cmd {
    /// Start building a call to `program`.
    ///
    /// The logical name defaults to the program's file name.
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        let program = program.as_ref().to_os_string();
        let name = Path::new(&program)
            .file_name()
            .unwrap_or(program.as_os_str())
            .to_string_lossy()
            .into_owned();
        Self {
            program,
            args: Vec::new(),
            name,
            timeout: DEFAULT_TOOL_TIMEOUT,
            error_msg: None,
            error_handler: None,
            output_check: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    /// Name used for captured output files and error messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Message attached to a propagated nonzero exit.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    /// Decide what happens on a nonzero exit.
    ///
    /// The predicate returns `true` to propagate the failure and `false` to
    /// swallow it. Timeouts never reach the predicate.
    pub fn on_error(mut self, handler: impl Fn(&ToolOutput) -> bool + 'static) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Inspect the output of a zero exit; a rejection fails the run.
    pub fn check_output(
        mut self,
        check: impl Fn(&ToolOutput) -> Result<(), OutputRejection> + 'static,
    ) -> Self {
        self.output_check = Some(Box::new(check));
        self
    }

    pub fn logical_name(&self) -> &str {
        &self.name
    }

    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.program.as_os_str()).chain(self.args.iter().map(OsString::as_os_str))
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        self.argv()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion, recording output into `captured` on every path.
    pub fn run(self, captured: &mut CapturedOutput) -> Result<ToolOutput, ToolError> {
        tracing::debug!(tool = %self.name, command = %self.display(), "running tool");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());
        let waited = wait_with_deadline(&mut child, self.timeout);
        let stdout = stdout_rx.recv_timeout(OUTPUT_GRACE).unwrap_or_default();
        let stderr = stderr_rx.recv_timeout(OUTPUT_GRACE).unwrap_or_default();
        captured.record(&self.name, &stdout, &stderr);

        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                tracing::warn!(tool = %self.name, timeout_secs = self.timeout.as_secs(), "tool timed out");
                return Err(ToolError::Timeout {
                    name: self.name,
                    timeout: self.timeout,
                });
            }
            Err(source) => {
                return Err(ToolError::Io {
                    name: self.name,
                    context: "waiting for tool",
                    source,
                })
            }
        };

        let output = ToolOutput {
            code: status.code(),
            stdout,
            stderr,
        };

        if !status.success() {
            let propagate = self
                .error_handler
                .as_ref()
                .map_or(true, |handler| handler(&output));
            if !propagate {
                tracing::debug!(tool = %self.name, code = ?output.code, "nonzero exit tolerated");
                return Ok(output);
            }
            return Err(ToolError::Failed {
                name: self.name,
                code: output.code,
                message: self
                    .error_msg
                    .unwrap_or_else(|| "exited unsuccessfully".to_string()),
            });
        }

        if let Some(check) = &self.output_check {
            check(&output).map_err(|rejection| rejection.into_tool_error(&self.name))?;
        }

        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut stream) = stream {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stream.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
    }
    rx
}

/// `Ok(None)` means the deadline passed and the child was killed.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
