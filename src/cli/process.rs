//! Claude Code process spawning and control.
//!
//! This module provides a builder for the launch parameters of one
//! session, and control methods for the running process.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::conversation::MessageParam;

/// Default executable name.
pub const DEFAULT_CLAUDE_BINARY: &str = "claude";

/// Built-in tools disabled for every session.
pub const DISALLOWED_TOOLS: &[&str] = &[
    "Task",
    "Bash",
    "Glob",
    "Grep",
    "LS",
    "exit_plan_mode",
    "Read",
    "Edit",
    "MultiEdit",
    "Write",
    "NotebookRead",
    "NotebookEdit",
    "WebFetch",
    "TodoRead",
    "TodoWrite",
    "WebSearch",
];

/// Environment variable that caps the CLI's output tokens.
pub const MAX_OUTPUT_TOKENS_ENV: &str = "CLAUDE_CODE_MAX_OUTPUT_TOKENS";

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Claude Code executable not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied executing {0}")]
    PermissionDenied(String),
    /// Failed to serialize the conversation for stdin.
    #[error("Failed to serialize conversation: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(binary: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(binary.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(binary.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Builder for configuring Claude Code process arguments.
#[derive(Debug, Clone, Default)]
pub struct ClaudeProcessBuilder {
    system_prompt: String,
    messages: Vec<MessageParam>,
    model: Option<String>,
    binary: Option<String>,
    working_dir: Option<PathBuf>,
    max_output_tokens: Option<u32>,
}

impl ClaudeProcessBuilder {
    /// Create a new builder with the given system prompt.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            ..Default::default()
        }
    }

    /// Set the conversation turns written to stdin.
    #[must_use]
    pub fn messages(mut self, messages: Vec<MessageParam>) -> Self {
        self.messages = messages;
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Override the executable path.
    #[must_use]
    pub fn binary(mut self, path: impl Into<String>) -> Self {
        self.binary = Some(path.into());
        self
    }

    /// Set the working directory for the Claude process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Cap the number of output tokens.
    #[must_use]
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    /// Get the working directory, if set.
    #[must_use]
    pub fn get_working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    /// Get the executable that will be launched.
    #[must_use]
    pub fn get_binary(&self) -> &str {
        self.binary.as_deref().unwrap_or(DEFAULT_CLAUDE_BINARY)
    }

    /// Get the conversation turns.
    #[must_use]
    pub fn get_messages(&self) -> &[MessageParam] {
        &self.messages
    }

    /// Build the command-line arguments.
    #[must_use]
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            "--system-prompt".to_string(),
            self.system_prompt.clone(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--disallowedTools".to_string(),
            DISALLOWED_TOOLS.join(","),
            "--max-turns".to_string(),
            "1".to_string(),
        ];

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        args
    }

    /// Serialize the conversation as written to stdin.
    ///
    /// # Errors
    ///
    /// Returns an error if a message cannot be serialized.
    pub fn build_stdin(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.messages)
    }
}

/// A running Claude Code process.
#[derive(Debug)]
pub struct ClaudeProcess {
    child: Child,
}

impl ClaudeProcess {
    /// Spawn a Claude Code process with the given builder configuration.
    ///
    /// The conversation is written to stdin by a background task, which
    /// requires a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(builder: &ClaudeProcessBuilder) -> Result<Self, SpawnError> {
        let binary = builder.get_binary();
        let input = builder.build_stdin()?;

        let mut cmd = Command::new(binary);
        cmd.args(builder.build_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = builder.working_dir {
            cmd.current_dir(dir);
        }

        if let Some(tokens) = builder.max_output_tokens {
            cmd.env(MAX_OUTPUT_TOKENS_ENV, tokens.to_string());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| SpawnError::from_io(binary, e))?;

        tracing::debug!(binary, pid = ?child.id(), "Spawned Claude Code");

        if let Some(stdin) = child.stdin.take() {
            tokio::spawn(write_stdin(stdin, input));
        }

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(pid, "Claude Code ignored SIGTERM, killing");
                self.child.kill().await
            }
        }
    }
}

async fn write_stdin(mut stdin: ChildStdin, input: String) {
    if let Err(e) = stdin.write_all(input.as_bytes()).await {
        tracing::warn!(error = %e, "Failed to write conversation to stdin");
        return;
    }
    if let Err(e) = stdin.shutdown().await {
        tracing::debug!(error = %e, "Failed to close stdin");
    }
}
