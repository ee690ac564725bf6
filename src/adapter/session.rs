//! Session driver: joins stdout, stderr and the exit event into one chunk stream.
//!
//! Each input is fed by its own task into a queue. A single pull loop drains
//! them with stdout first, so stderr and the exit event are only applied once
//! every queued stdout line has been handled. Dropping the stream cancels the
//! session and terminates the process.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use futures_core::Stream;
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::adapter::{
    ApiStreamChunk, ClaudeCodeError, ProcessOutcome, StopReasonPolicy, StreamNormalizer,
};
use crate::cli::{ClaudeProcess, ClaudeProcessBuilder, SpawnError, StreamParser};
use crate::config::{resolve_model, AdapterConfig, ModelSelection};
use crate::conversation::{filter_images, MessageParam};

/// The chunk sequence returned to the caller.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<ApiStreamChunk, ClaudeCodeError>> + Send>>;

/// The three independent inputs of a session.
#[derive(Debug)]
pub struct SessionInputs {
    /// Framed stdout lines.
    pub lines: UnboundedReceiver<String>,
    /// Stderr text in arrival order.
    pub stderr: UnboundedReceiver<String>,
    /// The terminal process event.
    pub exit: oneshot::Receiver<ProcessOutcome>,
}

impl SessionInputs {
    /// Build inputs from raw pipes. Reader tasks are spawned immediately.
    pub fn from_readers<O, E>(
        stdout: O,
        stderr: E,
        exit: oneshot::Receiver<ProcessOutcome>,
    ) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            lines: StreamParser::into_lines(stdout),
            stderr: StreamParser::into_text(stderr),
            exit,
        }
    }
}

/// Turn session inputs into a chunk stream.
#[must_use]
pub fn normalize(inputs: SessionInputs, policy: StopReasonPolicy) -> ChunkStream {
    SessionDriver::new(inputs, policy, None).into_stream()
}

/// Launch a Claude Code process and stream its output.
///
/// Must be called from within a Tokio runtime. A launch failure is reported
/// as the stream's only item.
#[must_use]
pub fn launch(
    builder: &ClaudeProcessBuilder,
    policy: StopReasonPolicy,
    terminate_timeout: Duration,
) -> ChunkStream {
    let mut process = match ClaudeProcess::spawn(builder) {
        Ok(process) => process,
        Err(e) => {
            tracing::warn!(
                error = %e,
                binary = builder.get_binary(),
                "Failed to launch Claude Code"
            );
            return failed(e);
        }
    };

    let (Some(stdout), Some(stderr)) = (process.take_stdout(), process.take_stderr()) else {
        return failed(SpawnError::Io(std::io::Error::other(
            "Claude Code stdio not captured",
        )));
    };

    let cancel = CancellationToken::new();
    let (exit_tx, exit_rx) = oneshot::channel();
    tokio::spawn(monitor(process, cancel.clone(), exit_tx, terminate_timeout));

    let inputs = SessionInputs::from_readers(stdout, stderr, exit_rx);
    SessionDriver::new(inputs, policy, Some(cancel.drop_guard())).into_stream()
}

fn failed(err: SpawnError) -> ChunkStream {
    Box::pin(futures_util::stream::once(futures_util::future::ready(
        Err(ClaudeCodeError::ProcessLaunch(err)),
    )))
}

/// Wait for the process to exit, or terminate it once the session is dropped.
async fn monitor(
    mut process: ClaudeProcess,
    cancel: CancellationToken,
    exit_tx: oneshot::Sender<ProcessOutcome>,
    terminate_timeout: Duration,
) {
    tokio::select! {
        status = process.wait() => {
            let outcome = match status {
                Ok(status) => {
                    tracing::debug!(code = ?status.code(), "Claude Code exited");
                    ProcessOutcome::Exited(status.code())
                }
                Err(e) => ProcessOutcome::Failed(SpawnError::Io(e)),
            };
            let _ = exit_tx.send(outcome);
        }
        () = cancel.cancelled() => {
            tracing::debug!(pid = ?process.id(), "Session dropped, terminating Claude Code");
            if let Err(e) = process.graceful_terminate(terminate_timeout).await {
                tracing::warn!(error = %e, "Failed to terminate Claude Code");
            }
        }
    }
}

struct SessionDriver {
    inputs: SessionInputs,
    normalizer: StreamNormalizer,
    pending: VecDeque<ApiStreamChunk>,
    stdout_open: bool,
    stderr_open: bool,
    exit_seen: bool,
    _guard: Option<DropGuard>,
}

impl SessionDriver {
    fn new(inputs: SessionInputs, policy: StopReasonPolicy, guard: Option<DropGuard>) -> Self {
        Self {
            inputs,
            normalizer: StreamNormalizer::new(policy),
            pending: VecDeque::new(),
            stdout_open: true,
            stderr_open: true,
            exit_seen: false,
            _guard: guard,
        }
    }

    fn into_stream(self) -> ChunkStream {
        Box::pin(futures_util::stream::unfold(self, |mut driver| async move {
            let item = driver.next_chunk().await?;
            Some((item, driver))
        }))
    }

    async fn next_chunk(&mut self) -> Option<Result<ApiStreamChunk, ClaudeCodeError>> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some(Ok(chunk));
            }
            if self.normalizer.is_finished() {
                return None;
            }

            tokio::select! {
                biased;

                line = self.inputs.lines.recv(), if self.stdout_open => match line {
                    Some(line) => match self.normalizer.on_line(&line) {
                        Ok(chunks) => self.pending.extend(chunks),
                        Err(e) => return Some(Err(e)),
                    },
                    None => self.stdout_open = false,
                },

                text = self.inputs.stderr.recv(), if self.stderr_open => match text {
                    Some(text) => self.normalizer.on_stderr(&text),
                    None => self.stderr_open = false,
                },

                outcome = &mut self.inputs.exit,
                    if !self.stdout_open && !self.stderr_open && !self.exit_seen =>
                {
                    self.exit_seen = true;
                    let outcome = outcome.unwrap_or_else(|_| {
                        ProcessOutcome::Failed(SpawnError::Io(std::io::Error::other(
                            "process monitor stopped before reporting exit",
                        )))
                    });
                    if let Err(e) = self.normalizer.on_exit(outcome) {
                        return Some(Err(e));
                    }
                },

                else => return None,
            }
        }
    }
}

/// Entry point used by the editor: one call, one session.
#[derive(Debug, Clone, Default)]
pub struct ClaudeCodeHandler {
    config: AdapterConfig,
    working_dir: Option<PathBuf>,
}

impl ClaudeCodeHandler {
    #[must_use]
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            working_dir: None,
        }
    }

    /// Run sessions in `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The configured model, or the default one if unknown.
    #[must_use]
    pub fn model(&self) -> ModelSelection {
        resolve_model(self.config.model.as_deref())
    }

    /// Build the launch parameters for one session.
    #[must_use]
    pub fn process_builder(
        &self,
        system_prompt: &str,
        messages: Vec<MessageParam>,
    ) -> ClaudeProcessBuilder {
        let messages = if self.config.filter_images {
            filter_images(messages)
        } else {
            messages
        };

        let mut builder = ClaudeProcessBuilder::new(system_prompt)
            .messages(messages)
            .model(self.model().id);

        if let Some(path) = &self.config.path {
            builder = builder.binary(path.clone());
        }
        if let Some(dir) = &self.working_dir {
            builder = builder.working_dir(dir.clone());
        }
        if let Some(tokens) = self.config.max_output_tokens {
            builder = builder.max_output_tokens(tokens);
        }
        builder
    }

    /// Start a session and stream its chunks.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn create_message(&self, system_prompt: &str, messages: Vec<MessageParam>) -> ChunkStream {
        let builder = self.process_builder(system_prompt, messages);
        tracing::info!(
            model = %self.model().id,
            binary = builder.get_binary(),
            turns = builder.get_messages().len(),
            "Starting Claude Code session"
        );
        launch(
            &builder,
            self.config.stop_reason_policy,
            self.config.terminate_timeout(),
        )
    }
}
