//! Message types from Claude Code stream-json output.
//!
//! This module defines the four message shapes that Claude Code emits on
//! stdout when running with `--output-format stream-json`, and the decoder
//! that turns one line into one of them. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Credential source reported by a subscription (non-metered) login.
pub const UNMETERED_API_KEY_SOURCE: &str = "none";

/// Stop reason that signals a continuation into tool invocation.
pub const TOOL_USE_STOP_REASON: &str = "tool_use";

/// An MCP server entry in the init message.
///
/// Older CLI versions emit plain names, newer ones emit objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum McpServer {
    /// Bare server name.
    Name(String),
    /// Server name with connection status.
    Detailed {
        /// Server name.
        name: String,
        /// Connection status (e.g., "connected").
        #[serde(default)]
        status: Option<String>,
    },
}

impl McpServer {
    /// Returns the server name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }
}

/// System initialization message, the first line of every session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitMessage {
    /// Message subtype. Only `"init"` is a valid session start.
    pub subtype: String,
    /// Session identifier.
    #[serde(default)]
    pub session_id: String,
    /// Tools available in this session.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Connected MCP servers.
    #[serde(default)]
    pub mcp_servers: Vec<McpServer>,
    /// Where the credential came from. `"none"` means a subscription login.
    #[serde(default, rename = "apiKeySource")]
    pub api_key_source: Option<String>,
}

impl InitMessage {
    /// Returns true unless the session runs on a subscription credential.
    #[must_use]
    pub fn is_metered(&self) -> bool {
        self.api_key_source.as_deref() != Some(UNMETERED_API_KEY_SOURCE)
    }

    /// Returns the MCP server names.
    #[must_use]
    pub fn mcp_server_names(&self) -> Vec<&str> {
        self.mcp_servers.iter().map(McpServer::name).collect()
    }
}

/// A content block inside an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Extended thinking.
    Thinking {
        /// The reasoning text, absent when the CLI strips it.
        #[serde(default)]
        thinking: Option<String>,
        /// Opaque signature over the thinking block.
        #[serde(default)]
        signature: Option<String>,
    },
    /// Thinking block whose content was redacted upstream.
    RedactedThinking {
        /// Encrypted payload.
        #[serde(default)]
        data: Option<String>,
    },
    /// Tool invocation request. Not supported by this adapter.
    ToolUse {
        /// Tool use identifier.
        #[serde(default)]
        id: String,
        /// Tool name.
        name: String,
        /// Tool input parameters.
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Catch-all for block types added after this was written.
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Returns the block's type tag as it appears on the wire.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::RedactedThinking { .. } => "redacted_thinking",
            Self::ToolUse { .. } => "tool_use",
            Self::Unknown => "unknown",
        }
    }
}

/// Token counts attached to one assistant message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Uncached input tokens.
    pub input_tokens: u64,
    /// Generated tokens.
    pub output_tokens: u64,
    /// Tokens served from the prompt cache.
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    /// Tokens written to the prompt cache.
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
}

/// The `message` payload of an assistant line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Content blocks in arrival order.
    pub content: Vec<ContentBlock>,
    /// Why the model stopped, `None` while the turn continues.
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Token usage for this message.
    pub usage: TokenUsage,
}

impl AssistantMessage {
    /// Returns the text of the first text block.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// Returns true if any content block carries text.
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, ContentBlock::Text { text } if !text.is_empty()))
    }

    /// Returns the stop reason if it ends the turn for a reason other than tool use.
    #[must_use]
    pub fn terminal_stop_reason(&self) -> Option<&str> {
        self.stop_reason
            .as_deref()
            .filter(|reason| *reason != TOOL_USE_STOP_REASON)
    }
}

/// Final result message of a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    /// Result subtype (e.g., "success").
    #[serde(default)]
    pub subtype: Option<String>,
    /// Session identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Total cost in USD.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    /// Cost field used by older CLI versions.
    #[serde(default)]
    pub cost_usd: Option<f64>,
    /// Whether an error occurred.
    #[serde(default)]
    pub is_error: bool,
    /// Total duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Number of conversation turns.
    #[serde(default)]
    pub num_turns: u32,
    /// Final result text.
    pub result: String,
}

impl ResultMessage {
    /// Reported cost, preferring `total_cost_usd` over the legacy `cost_usd`.
    #[must_use]
    pub fn reported_cost_usd(&self) -> f64 {
        self.total_cost_usd.or(self.cost_usd).unwrap_or(0.0)
    }
}

/// Messages emitted by Claude Code in stream-json format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeMessage {
    /// Session initialization.
    System(InitMessage),
    /// Assistant turn output.
    Assistant {
        /// The message body.
        message: AssistantMessage,
    },
    /// Final result of the turn.
    Result(ResultMessage),
    /// Explicit protocol-level error.
    Error {},
}

impl ClaudeMessage {
    /// Returns the session ID if available.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::System(init) => Some(&init.session_id),
            Self::Result(result) => result.session_id.as_deref(),
            _ => None,
        }
    }
}

/// Reason a line could not be decoded into a [`ClaudeMessage`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not JSON, or JSON that does not match any message shape.
    #[error("Failed to decode line: {reason}")]
    Malformed {
        /// The raw line.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },
    /// A `system` message with a subtype other than `init`.
    #[error("Unexpected system subtype: {subtype}")]
    UnexpectedSubtype {
        /// The raw line.
        input: String,
        /// The subtype that was seen.
        subtype: String,
    },
}

impl DecodeError {
    /// Returns the raw line that failed to decode.
    #[must_use]
    pub fn input(&self) -> &str {
        match self {
            Self::Malformed { input, .. } | Self::UnexpectedSubtype { input, .. } => input,
        }
    }

    /// Consumes the error, returning the raw line.
    #[must_use]
    pub fn into_input(self) -> String {
        match self {
            Self::Malformed { input, .. } | Self::UnexpectedSubtype { input, .. } => input,
        }
    }
}

/// Decode a single line of stream-json output.
///
/// Never panics. A line that is not one of the four message shapes comes
/// back as a [`DecodeError`] carrying the raw line, which callers surface as
/// plain text.
///
/// # Errors
///
/// Returns `DecodeError` if the line is not a recognized message.
pub fn decode_line(line: &str) -> Result<ClaudeMessage, DecodeError> {
    let message: ClaudeMessage =
        serde_json::from_str(line).map_err(|e| DecodeError::Malformed {
            input: line.to_string(),
            reason: e.to_string(),
        })?;

    if let ClaudeMessage::System(init) = &message {
        if init.subtype != "init" {
            return Err(DecodeError::UnexpectedSubtype {
                input: line.to_string(),
                subtype: init.subtype.clone(),
            });
        }
    }

    Ok(message)
}
