//! Terminal errors of a Claude Code session.

use crate::cli::SpawnError;

/// Prefix of assistant text that wraps an upstream API error.
pub const API_ERROR_MARKER: &str = "API Error";

/// Upstream message fragment that signals a model the credential cannot use.
pub const INVALID_MODEL_MARKER: &str = "Invalid model name";

/// Remediation hint appended to a model/plan mismatch.
pub const MODEL_PLAN_MISMATCH_HINT: &str = "API keys and subscription plans allow different models. Make sure the selected model is included in your plan.";

/// Every way a session can end other than success.
///
/// All variants are terminal. Nothing is retried inside the adapter.
#[derive(thiserror::Error, Debug)]
pub enum ClaudeCodeError {
    /// The executable could not be started or waited on.
    #[error("Failed to launch Claude Code: {0}")]
    ProcessLaunch(#[from] SpawnError),

    /// The process exited with a non-zero status.
    #[error("{}", format_exit(.exit_code, .stderr))]
    ProcessExit {
        /// Exit code, `None` if the process was killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed; `None` if nothing was written.
        stderr: Option<String>,
    },

    /// An explicit error message, a malformed embedded error payload, or an
    /// exit without a result.
    #[error("{0}")]
    Protocol(String),

    /// The model stopped for a reason other than a supported continuation.
    #[error("Claude Code stopped with reason: {reason}")]
    TurnStopped {
        /// The stop reason reported by the model.
        reason: String,
    },

    /// A well-formed upstream API error.
    #[error("{message}")]
    Upstream {
        /// The embedded error payload.
        message: String,
    },

    /// An upstream error caused by a model the credential's plan does not include.
    #[error("{raw}\n\n{hint}")]
    ModelPlanMismatch {
        /// The assistant text as received.
        raw: String,
        /// What the user can do about it.
        hint: &'static str,
    },
}

impl ClaudeCodeError {
    /// Create a `ProcessExit` error, dropping whitespace-only stderr.
    #[must_use]
    pub fn process_exit(exit_code: Option<i32>, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        Self::ProcessExit {
            exit_code,
            stderr: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    /// Returns true for errors reported by the upstream API.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::ModelPlanMismatch { .. })
    }

    /// Classify assistant text that starts with [`API_ERROR_MARKER`].
    ///
    /// Such text has the form `API Error: <status> <json>`. Returns `None`
    /// when the text is not an API error.
    #[must_use]
    pub fn from_api_error_text(text: &str) -> Option<Self> {
        if !text.starts_with(API_ERROR_MARKER) {
            return None;
        }

        let Some(start) = text.find('{') else {
            return Some(Self::Protocol(text.to_string()));
        };
        let payload = &text[start..];

        let Ok(parsed) = serde_json::from_str::<serde_json::Value>(payload) else {
            return Some(Self::Protocol(text.to_string()));
        };

        let upstream_message = parsed
            .pointer("/error/message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();

        if upstream_message.contains(INVALID_MODEL_MARKER) {
            return Some(Self::ModelPlanMismatch {
                raw: text.to_string(),
                hint: MODEL_PLAN_MISMATCH_HINT,
            });
        }

        Some(Self::Upstream {
            message: payload.to_string(),
        })
    }
}

fn format_exit(exit_code: &Option<i32>, stderr: &Option<String>) -> String {
    let code = exit_code.map_or_else(
        || "unknown (terminated by signal)".to_string(),
        |c| c.to_string(),
    );
    match stderr {
        Some(output) => {
            format!("Claude Code process exited with code {code}. Error output: {output}")
        }
        None => format!("Claude Code process exited with code {code}."),
    }
}
