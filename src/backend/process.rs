use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::backend::{display_arg, Backend, CommandOutput};
use crate::error::{Result, SlurpError};

/// Runs a real program. Arguments are passed straight to the process, never
/// through a shell.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    program: PathBuf,
}

impl ProcessBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn process_output(
        &self,
        result: std::result::Result<std::process::Output, std::io::Error>,
    ) -> Result<CommandOutput> {
        match result {
            Ok(output) => {
                let output = CommandOutput {
                    status: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };
                tracing::debug!(
                    program = %self.program.display(),
                    exit_code = ?output.status,
                    stdout_bytes = output.stdout.len(),
                    "Command finished"
                );
                Ok(output)
            }
            Err(e) => {
                tracing::error!(program = %self.program.display(), error = %e, "Command could not be started");
                Err(SlurpError::BackendUnavailable {
                    program: self.program.display().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl Backend for ProcessBackend {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!(command = %self.describe(args), "Running command");

        let result = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        self.process_output(result)
    }

    fn describe(&self, args: &[String]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(args.iter().map(|a| display_arg(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
