use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::backend::{display_arg, Backend, CommandOutput};
use crate::error::{Result, SlurpError};

/// What a scripted invocation should do.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Output(CommandOutput),
    /// The program could not be started
    Unavailable(String),
}

/// Test double that records every invocation and replays preset responses
/// in order. Once the script runs out, every call succeeds with empty output.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outputs(outputs: Vec<CommandOutput>) -> Self {
        Self::with_responses(outputs.into_iter().map(ScriptedResponse::Output).collect())
    }

    pub fn with_responses(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every argument vector this backend has been asked to run.
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    /// Calls rendered as space-joined strings, convenient for assertions.
    pub fn call_lines(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|args| args.join(" ")).collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        lock(&self.calls).push(args.to_vec());
        match lock(&self.responses).pop_front() {
            Some(ScriptedResponse::Output(output)) => Ok(output),
            Some(ScriptedResponse::Unavailable(reason)) => Err(SlurpError::BackendUnavailable {
                program: "scripted".into(),
                reason,
            }),
            None => Ok(CommandOutput::ok("")),
        }
    }

    fn describe(&self, args: &[String]) -> String {
        args.iter()
            .map(|a| display_arg(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[tokio::test]
    async fn records_calls_in_order() {
        let backend = ScriptedBackend::new();
        backend.run(&args("show ass")).await.unwrap();
        backend.run(&args("add user bob")).await.unwrap();
        assert_eq!(backend.call_lines(), vec!["show ass", "add user bob"]);
    }

    #[tokio::test]
    async fn replays_responses_then_defaults_to_success() {
        let backend = ScriptedBackend::with_responses(vec![
            ScriptedResponse::Output(CommandOutput::ok("first")),
            ScriptedResponse::Output(CommandOutput::failed(1, "nope")),
            ScriptedResponse::Unavailable("No such file or directory".into()),
        ]);
        assert_eq!(backend.run(&[]).await.unwrap().stdout, "first");
        assert!(!backend.run(&[]).await.unwrap().success());
        assert!(matches!(
            backend.run(&[]).await,
            Err(SlurpError::BackendUnavailable { .. })
        ));
        assert!(backend.run(&[]).await.unwrap().success());
    }
}
