//! Centralized command execution with consistent error handling.
//!
//! Every external program rootstrap drives (mountpoint, mount, umount, tar,
//! the package manager) goes through [`Cmd`]. Long-running commands are waited
//! on with a [`CancelToken`] so a SIGINT/SIGTERM stops the child and surfaces
//! as an error instead of leaving the run half torn down.

use anyhow::{bail, Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ProvisionError;
use crate::signal::CancelToken;

/// How often a blocking wait looks at the cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a cancelled child gets to exit after SIGTERM before SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status of the command.
    pub status: ExitStatus,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

/// Builder for configuring command execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    /// Custom error message prefix.
    error_prefix: Option<String>,
    cancel: Option<CancelToken>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            allow_fail: false,
            error_prefix: None,
            cancel: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Add a path as an argument.
    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Stop waiting (and terminate the child) once `token` is cancelled.
    pub fn cancel_on(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    /// The program and arguments as a single display string.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<Child> {
        tracing::debug!("running: {}", self.display());
        cmd.spawn()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))
    }

    fn check_status(&self, status: ExitStatus, stderr: &str) -> Result<()> {
        if self.allow_fail || status.success() {
            return Ok(());
        }
        let prefix = self
            .error_prefix
            .clone()
            .unwrap_or_else(|| format!("'{}' failed", self.program));
        let code = status.code().unwrap_or(-1);
        if stderr.is_empty() {
            bail!("{} (exit code {})", prefix, code);
        } else {
            bail!("{} (exit code {}):\n{}", prefix, code, stderr);
        }
    }

    /// Run the command and capture stderr; stdout is discarded.
    ///
    /// Meant for short helpers (`mountpoint`, `mount`, `umount`). The wait is
    /// not cancellable, but a failure while a signal is pending is reported as
    /// an interruption.
    pub fn run(self) -> Result<CommandResult> {
        tracing::debug!("running: {}", self.display());
        let mut cmd = self.command();
        cmd.stdout(Stdio::null());
        let output = cmd.output().with_context(|| {
            format!("Failed to execute '{}'. Is it installed?", self.program)
        })?;

        let result = CommandResult {
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success() {
            if let Some(signo) = self.cancel.as_ref().and_then(CancelToken::received) {
                return Err(ProvisionError::Interrupted(signo).into());
            }
        }
        self.check_status(result.status, result.stderr_trimmed())?;
        Ok(result)
    }

    /// Run the command with inherited stdio (interactive/streaming).
    ///
    /// Output goes directly to the terminal, which is what the package
    /// manager's progress and interactive prompts need.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        let mut cmd = self.command();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let mut child = self.spawn(cmd)?;
        let status = wait(&mut child, self.cancel.as_ref())?;
        self.check_status(status, "")?;
        Ok(status)
    }

    /// Pipe this command's stdout into `consumer`'s stdin and wait for both.
    ///
    /// Both sides share this command's cancellation token.
    pub fn pipe_into(self, consumer: Cmd) -> Result<()> {
        let mut producer_cmd = self.command();
        producer_cmd.stdout(Stdio::piped());
        let mut producer = self.spawn(producer_cmd)?;

        let stdout = producer
            .stdout
            .take()
            .context("Producer stdout was not captured")?;
        let mut consumer_cmd = consumer.command();
        consumer_cmd.stdin(Stdio::from(stdout));
        let mut consumer_child = match consumer.spawn(consumer_cmd) {
            Ok(child) => child,
            Err(e) => {
                terminate(&mut producer);
                return Err(e);
            }
        };

        let cancel = self.cancel.as_ref();
        let consumer_status = match wait(&mut consumer_child, cancel) {
            Ok(status) => status,
            Err(e) => {
                terminate(&mut producer);
                return Err(e);
            }
        };
        let producer_status = wait(&mut producer, cancel)?;

        consumer.check_status(consumer_status, "")?;
        self.check_status(producer_status, "")?;
        Ok(())
    }
}

/// Wait for `child`, polling `cancel` in between.
fn wait(child: &mut Child, cancel: Option<&CancelToken>) -> Result<ExitStatus> {
    let Some(cancel) = cancel else {
        return child.wait().context("Failed to wait for child process");
    };

    loop {
        if let Some(signo) = cancel.received() {
            terminate(child);
            return Err(ProvisionError::Interrupted(signo).into());
        }
        if let Some(status) = child
            .try_wait()
            .context("Failed to wait for child process")?
        {
            // A terminal ^C reaches the child too and may beat our flag check.
            if let (false, Some(signo)) = (status.success(), cancel.received()) {
                return Err(ProvisionError::Interrupted(signo).into());
            }
            return Ok(status);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// SIGTERM the child, give it a grace period, then SIGKILL and reap.
fn terminate(child: &mut Child) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }
    let pid = Pid::from_raw(child.id() as i32);
    let _ = kill(pid, Signal::SIGTERM);

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Resolve a program on PATH (or accept an existing path as-is).
///
/// Returns the full path if found, None otherwise.
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

// =============================================================================
// Tests
// =============================================================================
