//! Stream normalizer state machine.
//!
//! Consumes decoded stdout lines, stderr text and the process's terminal
//! event in arrival order, and produces output chunks or a terminal error.
//! It performs no I/O; the session driver feeds it.

use crate::adapter::{
    ApiStreamChunk, ClaudeCodeError, StopReasonPolicy, UsageAccumulator, REDACTED_REASONING,
};
use crate::cli::{decode_line, AssistantMessage, ClaudeMessage, ContentBlock, SpawnError};

/// Message used when the CLI emits an explicit `error` line.
pub const EXPLICIT_ERROR_MESSAGE: &str = "Claude Code reported an error";

/// Message used when the process exits cleanly before reporting a result.
pub const MISSING_RESULT_MESSAGE: &str = "Claude Code exited without a result";

/// Normalizer lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NormalizerState {
    /// No line handled yet.
    #[default]
    AwaitingInit,
    /// Lines are being turned into chunks.
    Streaming,
    /// The usage chunk was emitted.
    Done,
    /// A terminal error was raised.
    Failed,
}

impl NormalizerState {
    /// Returns true for `Done` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// How the process ended.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Exit status, `None` when terminated by a signal.
    Exited(Option<i32>),
    /// The process could not be launched or waited on.
    Failed(SpawnError),
}

/// State machine that turns one session's inputs into output chunks.
#[derive(Debug)]
pub struct StreamNormalizer {
    state: NormalizerState,
    policy: StopReasonPolicy,
    is_metered: bool,
    session_id: Option<String>,
    usage: UsageAccumulator,
    stderr: String,
}

impl Default for StreamNormalizer {
    fn default() -> Self {
        Self::new(StopReasonPolicy::default())
    }
}

impl StreamNormalizer {
    /// Create a normalizer for one session.
    #[must_use]
    pub fn new(policy: StopReasonPolicy) -> Self {
        Self {
            state: NormalizerState::AwaitingInit,
            policy,
            is_metered: true,
            session_id: None,
            usage: UsageAccumulator::new(),
            stderr: String::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NormalizerState {
        self.state
    }

    /// Returns true once the session reached `Done` or `Failed`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Session id reported by the init or result message.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Stderr collected so far.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Running usage totals.
    #[must_use]
    pub fn usage(&self) -> &UsageAccumulator {
        &self.usage
    }

    /// Handle one stdout line.
    ///
    /// # Errors
    ///
    /// Returns the terminal error if this line ends the session.
    pub fn on_line(&mut self, line: &str) -> Result<Vec<ApiStreamChunk>, ClaudeCodeError> {
        if self.is_finished() {
            tracing::trace!(state = ?self.state, "Ignoring line after session end");
            return Ok(Vec::new());
        }

        let message = match decode_line(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(reason = %e, "Treating undecodable line as text");
                self.begin_streaming();
                return Ok(vec![ApiStreamChunk::text(e.into_input())]);
            }
        };

        if let Some(id) = message.session_id() {
            self.session_id = Some(id.to_string());
        }

        match message {
            ClaudeMessage::System(init) => {
                self.is_metered = init.is_metered();
                tracing::debug!(
                    session_id = %init.session_id,
                    metered = self.is_metered,
                    tools = init.tools.len(),
                    mcp_servers = ?init.mcp_server_names(),
                    "Session initialized"
                );
                self.begin_streaming();
                Ok(Vec::new())
            }
            ClaudeMessage::Assistant { message } => {
                self.begin_streaming();
                self.on_assistant(&message)
            }
            ClaudeMessage::Result(result) => {
                if result.is_error {
                    tracing::warn!(result = %result.result, "Result message flagged as error");
                }
                self.usage
                    .finalize(result.reported_cost_usd(), self.is_metered);
                tracing::debug!(
                    duration_ms = result.duration_ms,
                    num_turns = result.num_turns,
                    "Result received"
                );
                self.transition(NormalizerState::Done);
                Ok(vec![ApiStreamChunk::Usage(self.usage.totals())])
            }
            ClaudeMessage::Error {} => Err(self.fail(ClaudeCodeError::Protocol(
                EXPLICIT_ERROR_MESSAGE.to_string(),
            ))),
        }
    }

    /// Buffer stderr text. It only matters if the process exits non-zero.
    pub fn on_stderr(&mut self, text: &str) {
        if !self.is_finished() {
            self.stderr.push_str(text);
        }
    }

    /// Handle the process's terminal event.
    ///
    /// Callers must deliver this only after every stdout line was handled.
    ///
    /// # Errors
    ///
    /// Returns the terminal error unless the session already finished.
    pub fn on_exit(&mut self, outcome: ProcessOutcome) -> Result<(), ClaudeCodeError> {
        if self.is_finished() {
            tracing::trace!(?outcome, "Ignoring exit after session end");
            return Ok(());
        }

        let err = match outcome {
            ProcessOutcome::Failed(e) => ClaudeCodeError::ProcessLaunch(e),
            ProcessOutcome::Exited(Some(0)) => {
                ClaudeCodeError::Protocol(MISSING_RESULT_MESSAGE.to_string())
            }
            ProcessOutcome::Exited(code) => ClaudeCodeError::process_exit(code, &self.stderr),
        };
        Err(self.fail(err))
    }

    fn on_assistant(
        &mut self,
        message: &AssistantMessage,
    ) -> Result<Vec<ApiStreamChunk>, ClaudeCodeError> {
        if let Some(reason) = message.terminal_stop_reason() {
            if let Some(err) = message
                .first_text()
                .and_then(ClaudeCodeError::from_api_error_text)
            {
                return Err(self.fail(err));
            }
            if self.policy.is_fatal(message) {
                return Err(self.fail(ClaudeCodeError::TurnStopped {
                    reason: reason.to_string(),
                }));
            }
            tracing::debug!(reason, policy = ?self.policy, "Continuing past stop reason");
        }

        let mut chunks = Vec::with_capacity(message.content.len());
        for block in &message.content {
            match block {
                ContentBlock::Text { text } => chunks.push(ApiStreamChunk::text(text.clone())),
                ContentBlock::Thinking { thinking, .. } => chunks.push(ApiStreamChunk::reasoning(
                    thinking.clone().unwrap_or_default(),
                )),
                ContentBlock::RedactedThinking { .. } => {
                    chunks.push(ApiStreamChunk::reasoning(REDACTED_REASONING));
                }
                ContentBlock::ToolUse { name, .. } => {
                    tracing::warn!(tool = %name, "tool_use is not supported, skipping block");
                }
                ContentBlock::Unknown => {
                    tracing::warn!("Unsupported content block type, skipping");
                }
            }
        }

        self.usage.apply_assistant_usage(&message.usage);
        Ok(chunks)
    }

    fn begin_streaming(&mut self) {
        if self.state == NormalizerState::AwaitingInit {
            self.transition(NormalizerState::Streaming);
        }
    }

    fn fail(&mut self, err: ClaudeCodeError) -> ClaudeCodeError {
        tracing::debug!(error = %err, "Session failed");
        self.transition(NormalizerState::Failed);
        err
    }

    fn transition(&mut self, new_state: NormalizerState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }
}
