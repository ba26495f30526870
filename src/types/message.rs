//! Message types for conversation turns.
//!
//! A [`Message`] is one finalized turn of the exchange: a user prompt, an
//! assistant response, or a tool result. Each role carries its own typed
//! content blocks; assistant messages additionally carry provider usage, cost
//! and a stop reason.

use serde::{Deserialize, Serialize};

use super::ids::NodeId;

/// Role of a message participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// User message
    User,
    /// Assistant (model) message
    Assistant,
    /// Tool result returned to the model
    ToolResult,
}

/// Why an assistant turn ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of response
    #[default]
    Stop,
    /// Caller requested an abort mid-stream
    Aborted,
    /// Provider reported an error
    Error,
    /// Max tokens reached
    Length,
    /// Tool use requested
    ToolUse,
}

/// Token usage reported by the provider for one assistant turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens consumed
    pub input_tokens: u64,
    /// Output tokens generated
    pub output_tokens: u64,
    /// Tokens read from cache
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    /// Tokens written to cache
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl TokenUsage {
    /// Total tokens (input + output)
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// Accumulate from another TokenUsage
    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cache_read_input_tokens += other.cache_read_input_tokens;
        self.cache_creation_input_tokens += other.cache_creation_input_tokens;
    }
}

/// An attachment carried alongside user text (images, files).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original file name
    pub file_name: String,
    /// Media type (e.g. "image/png")
    pub media_type: String,
    /// Base64-encoded payload
    pub data: String,
}

/// A content block within a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserContent {
    /// Text content
    Text {
        /// The text content
        text: String,
    },
    /// File attachment
    Attachment(Attachment),
}

/// A content block within an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantContent {
    /// Extended thinking emitted before the response
    Thinking {
        /// The thinking text
        thinking: String,
    },
    /// Response text
    Text {
        /// The text content
        text: String,
    },
    /// Tool invocation requested by the model
    #[serde(rename = "tool_call")]
    ToolCall(ToolCall),
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call
    pub id: String,
    /// Name of the tool
    pub name: String,
    /// Arguments for the tool
    pub arguments: serde_json::Value,
}

/// A content block within a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultContent {
    /// Text output
    Text {
        /// The text content
        text: String,
    },
    /// Binary output (screenshots, rendered files)
    Attachment(Attachment),
}

/// A user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    /// Stable id; when present it becomes the tree node's id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Content blocks
    pub content: Vec<UserContent>,
}

/// An assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Stable id; when present it becomes the tree node's id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Content blocks
    pub content: Vec<AssistantContent>,
    /// Token usage reported by the provider
    #[serde(default)]
    pub usage: TokenUsage,
    /// Cost of this turn in USD, when the provider reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    /// Why the turn ended
    #[serde(default)]
    pub stop_reason: StopReason,
}

/// A tool result turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    /// Stable id; when present it becomes the tree node's id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// The tool call this result answers
    pub tool_call_id: String,
    /// Content blocks
    pub content: Vec<ToolResultContent>,
    /// Whether the execution failed
    #[serde(default)]
    pub is_error: bool,
}

/// A finalized conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// A user turn
    User(UserMessage),
    /// An assistant turn
    Assistant(AssistantMessage),
    /// A tool result turn
    ToolResult(ToolResultMessage),
}

impl Message {
    /// Create a user message from plain text
    pub fn user(text: impl Into<String>) -> Self {
        Self::User(UserMessage {
            id: None,
            content: vec![UserContent::Text { text: text.into() }],
        })
    }

    /// Create an assistant message from plain text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant(AssistantMessage {
            id: None,
            content: vec![AssistantContent::Text { text: text.into() }],
            usage: TokenUsage::default(),
            cost_usd: None,
            stop_reason: StopReason::Stop,
        })
    }

    /// Create a tool result message from plain text
    pub fn tool_result(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::ToolResult(ToolResultMessage {
            id: None,
            tool_call_id: tool_call_id.into(),
            content: vec![ToolResultContent::Text { text: text.into() }],
            is_error: false,
        })
    }

    /// Set the message id, which also becomes the node id on append
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        let id = Some(NodeId::from_string(id));
        match &mut self {
            Self::User(m) => m.id = id,
            Self::Assistant(m) => m.id = id,
            Self::ToolResult(m) => m.id = id,
        }
        self
    }

    /// Role of this message
    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::Assistant(_) => Role::Assistant,
            Self::ToolResult(_) => Role::ToolResult,
        }
    }

    /// The message-carried id, if any
    pub fn id(&self) -> Option<&NodeId> {
        match self {
            Self::User(m) => m.id.as_ref(),
            Self::Assistant(m) => m.id.as_ref(),
            Self::ToolResult(m) => m.id.as_ref(),
        }
    }

    /// Concatenated text content of the message
    pub fn text(&self) -> String {
        match self {
            Self::User(m) => m
                .content
                .iter()
                .filter_map(|b| match b {
                    UserContent::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            Self::Assistant(m) => m
                .content
                .iter()
                .filter_map(|b| match b {
                    AssistantContent::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            Self::ToolResult(m) => m
                .content
                .iter()
                .filter_map(|b| match b {
                    ToolResultContent::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Token usage, for assistant messages
    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            Self::Assistant(m) => Some(&m.usage),
            _ => None,
        }
    }

    /// Tool calls requested by this message, if any
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        match self {
            Self::Assistant(m) => m
                .content
                .iter()
                .filter_map(|b| match b {
                    AssistantContent::ToolCall(call) => Some(call),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}
