//! Policy for deciding when an assistant stop reason ends the session.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::cli::AssistantMessage;

/// Which non-tool stop reasons are fatal.
///
/// Text starting with the API error marker is classified the same way under
/// every policy. The policy only decides what happens to other stop reasons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum StopReasonPolicy {
    /// Any stop reason other than `tool_use` fails the turn.
    #[default]
    Strict,
    /// A stop reason fails the turn only if the message carries no text.
    FatalWithoutText,
    /// Only API error text fails the turn.
    ApiErrorsOnly,
}

impl StopReasonPolicy {
    /// Returns true if `message`, which has a terminal stop reason and no
    /// API error text, should fail the turn.
    #[must_use]
    pub fn is_fatal(self, message: &AssistantMessage) -> bool {
        match self {
            Self::Strict => true,
            Self::FatalWithoutText => !message.has_text(),
            Self::ApiErrorsOnly => false,
        }
    }
}
