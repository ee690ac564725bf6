//! Conversation turns sent to Claude Code.
//!
//! Claude Code cannot read images from stdin, so image blocks are replaced
//! with a text placeholder before launch.

use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Source of an image block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    /// Source kind (e.g., "base64", "url").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// MIME type of the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Encoded image data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Remote image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Content of a tool result block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<InputBlock>),
}

/// A content block in a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputBlock {
    Text {
        text: String,
    },
    Image {
        source: ImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ToolResultContent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl InputBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Content of a conversation turn: a bare string or a list of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<InputBlock>),
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageParam {
    pub role: Role,
    pub content: MessageContent,
}

impl MessageParam {
    /// A user turn with plain text.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// An assistant turn with plain text.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Placeholder text for an image block.
#[must_use]
pub fn image_placeholder(source: &ImageSource) -> String {
    format!(
        "[Image ({}): {} not supported by Claude Code]",
        source.kind.as_deref().unwrap_or("unknown"),
        source.media_type.as_deref().unwrap_or("unknown"),
    )
}

/// Replace every image block, including those nested in tool results, with
/// a text placeholder.
#[must_use]
pub fn filter_images(messages: Vec<MessageParam>) -> Vec<MessageParam> {
    messages
        .into_iter()
        .map(|message| MessageParam {
            role: message.role,
            content: match message.content {
                MessageContent::Blocks(blocks) => MessageContent::Blocks(filter_blocks(blocks)),
                text @ MessageContent::Text(_) => text,
            },
        })
        .collect()
}

fn filter_blocks(blocks: Vec<InputBlock>) -> Vec<InputBlock> {
    blocks.into_iter().map(filter_block).collect()
}

fn filter_block(block: InputBlock) -> InputBlock {
    match block {
        InputBlock::Image { source } => {
            tracing::debug!(media_type = ?source.media_type, "Replacing image block");
            InputBlock::text(image_placeholder(&source))
        }
        InputBlock::ToolResult {
            tool_use_id,
            content: Some(ToolResultContent::Blocks(nested)),
            is_error,
        } => InputBlock::ToolResult {
            tool_use_id,
            content: Some(ToolResultContent::Blocks(filter_blocks(nested))),
            is_error,
        },
        other => other,
    }
}
