//! Output chunks consumed by the caller.

use serde::{Deserialize, Serialize};

/// Placeholder emitted for a redacted thinking block.
pub const REDACTED_REASONING: &str = "[Redacted thinking block]";

/// Cumulative token and cost accounting for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageChunk {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_write_tokens: u64,
    pub total_cost_usd: f64,
}

/// One unit of the normalized output sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiStreamChunk {
    /// Text fragment.
    Text {
        /// The text.
        text: String,
    },
    /// Reasoning fragment.
    Reasoning {
        /// The reasoning text.
        text: String,
    },
    /// Final usage record, always the last chunk of a successful session.
    Usage(UsageChunk),
}

impl ApiStreamChunk {
    /// Create a text chunk.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a reasoning chunk.
    #[must_use]
    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Returns true if this is the usage chunk.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }
}
