//! Adapters for the command-line programs slurp drives.
//!
//! Every interaction with the accounting subsystem (and the directory
//! lookup used by `compare`) is a single program invocation. A [`Backend`]
//! runs one invocation and reports what happened as an explicit
//! [`CommandOutput`]: exit status plus both captured streams. Deciding
//! whether that output counts as a failure is left to the caller.
//!
//! # Implementations
//!
//! - [`ProcessBackend`]: spawns the real program
//! - [`DryRunBackend`]: prints the command line and pretends it succeeded
//! - [`ScriptedBackend`]: replays canned outputs and records every call

pub mod dry_run;
pub mod process;
pub mod scripted;

pub use dry_run::DryRunBackend;
pub use process::ProcessBackend;
pub use scripted::ScriptedBackend;

use async_trait::async_trait;

use crate::error::Result;

/// Captured result of one program invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Whether this output should be treated as a failed command.
    pub fn is_failure(&self, stderr_is_failure: bool) -> bool {
        !self.success() || (stderr_is_failure && !self.stderr.trim().is_empty())
    }

    /// Best available explanation for a failure.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("Exit code: {:?}", self.status)
    }
}

/// Runs one program invocation with the given arguments.
///
/// Failing to start the program at all is an error
/// ([`SlurpError::BackendUnavailable`](crate::error::SlurpError::BackendUnavailable)).
/// A program that runs and exits non-zero is not; it is reported through
/// [`CommandOutput::status`].
#[async_trait]
pub trait Backend: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<CommandOutput>;

    /// Printable form of the command line, for logs and error messages.
    fn describe(&self, args: &[String]) -> String;
}

/// Quote an argument for display when it would not survive a shell as-is.
pub(crate) fn display_arg(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_=.,/:@+".contains(c))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
