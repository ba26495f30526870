//! Core types shared across the crate.

pub mod ids;
pub mod message;
pub mod provider;

pub use ids::{NodeId, SessionId};
pub use message::{
    AssistantContent, AssistantMessage, Attachment, Message, Role, StopReason, TokenUsage,
    ToolCall, ToolResultContent, ToolResultMessage, UserContent, UserMessage,
};
pub use provider::{ProviderChoice, QueueMode, ThinkingLevel};
