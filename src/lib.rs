//! # agent-sessions
//!
//! Persistent, branchable conversation core for interactive coding agents.
//!
//! Every turn of a multi-party exchange (user prompts, model responses, tool
//! results, model switches) is recorded as a typed node in an append-only
//! [`SessionTree`]. Branches diverge lazily, summaries compact old spans,
//! and pluggable [`ContextStrategy`] projections rebuild the exact message
//! sequence to feed back to a model. A [`SessionController`] multiplexes
//! the model driver's event stream into the tree while keeping queued-input
//! observations consistent for listeners.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use agent_sessions::{ContextStrategy, Message, SessionTree};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), agent_sessions::TreeError> {
//!     let mut tree =
//!         SessionTree::create("/home/alice/proj", Path::new("/home/alice/.agent"), None).await?;
//!     tree.append_message(Message::user("Fix the failing test"), None).await?;
//!     tree.append_message(Message::assistant("Found it: an off-by-one in the parser"), None).await?;
//!
//!     tree.create_branch("experiment", None)?;
//!     tree.switch_branch("experiment").await?;
//!     tree.append_message(Message::user("Try a different approach"), None).await?;
//!
//!     let context = tree.build_context(None, &ContextStrategy::Full);
//!     assert_eq!(context.len(), 3);
//!     Ok(())
//! }
//! ```
//!
//! ## Driving a conversation
//!
//! ```rust,ignore
//! use agent_sessions::{ControllerBuilder, ProviderChoice};
//!
//! // The agent directory defaults to ~/.agent when not set explicitly.
//! let controller = ControllerBuilder::new(cwd)
//!     .provider(ProviderChoice::new("anthropic", "claude-sonnet-4-5"))
//!     .registry(registry)
//!     .build(|config| make_conversation(config))
//!     .await?;
//!
//! controller.subscribe(listener).await;
//! controller.prompt("Refactor the config loader", Vec::new()).await?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod controller;
pub mod models;
pub mod tree;
pub mod types;

// Re-exports for convenience
pub use config::{
    ConfigError, ConfigResult, Settings, SettingsStore, TerminalSettings, default_agent_dir,
    home_dir,
};
pub use controller::{
    ControllerBuilder, ControllerError, ControllerResult, ControllerState, Conversation,
    ConversationConfig, ConversationEvent, ConversationState, EventHandler, EventListener,
    InputQueue, ListenerId, QueuedInput, SessionController, SessionStats, SubscriptionId,
    SystemPrompt,
};
pub use models::{Model, ModelRegistry, api_key_from_env};
pub use tree::{
    ActiveBranchMarker, BranchInfo, CheckpointNode, ContextBehavior, ContextFn, ContextStrategy,
    CustomNode, MergeNode, MessageNode, Node, NodeCommon, ProviderNode, SessionSummary,
    SessionTree, SummaryNode, TreeError, TreeHeader, TreeResult,
};
pub use types::{
    AssistantContent, AssistantMessage, Attachment, Message, NodeId, ProviderChoice, QueueMode,
    Role, SessionId, StopReason, ThinkingLevel, TokenUsage, ToolCall, ToolResultContent,
    ToolResultMessage, UserContent, UserMessage,
};
