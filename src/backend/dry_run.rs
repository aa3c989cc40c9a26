use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::backend::{display_arg, Backend, CommandOutput};
use crate::error::Result;

/// Debug-mode stand-in for the mutating backend: prints each command line
/// to stdout instead of running it.
#[derive(Debug, Clone)]
pub struct DryRunBackend {
    program: PathBuf,
}

impl DryRunBackend {
    /// `program` is only used to render the command line.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Backend for DryRunBackend {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        let line = self.describe(args);
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        Ok(CommandOutput::ok(""))
    }

    fn describe(&self, args: &[String]) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(args.iter().map(|a| display_arg(a)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
