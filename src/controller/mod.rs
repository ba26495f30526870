//! The session controller: the operational facade over a tree and a
//! conversation.

pub mod controller;
pub mod conversation;
pub mod factory;
pub mod queue;
pub mod stats;

pub use controller::{ControllerState, EventListener, ListenerId, SessionController};
pub use conversation::{
    Conversation, ConversationEvent, ConversationState, EventHandler, SubscriptionId,
};
pub use factory::{ControllerBuilder, ConversationConfig, SystemPrompt};
pub use queue::{InputQueue, QueuedInput};
pub use stats::SessionStats;

use thiserror::Error;

use crate::config::ConfigError;
use crate::tree::TreeError;

/// Errors surfaced by controller operations
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Setup could not find any usable model
    #[error("No models available")]
    NoModelsAvailable,

    /// The operation requires a model but none is selected or resolvable
    #[error("Configuration missing: {message}")]
    ConfigMissing {
        /// What was missing
        message: String,
    },

    /// No API key for the target model's family
    #[error("No API key found for provider family '{api}'")]
    AuthMissing {
        /// The provider family that failed key resolution
        api: String,
    },

    /// The operation is not supported by the current provider family
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        /// Description of the unsupported operation
        operation: String,
    },

    /// A tree operation failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A settings operation failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ControllerError {
    /// Stable kind tag for display and matching
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoModelsAvailable => "no_models_available",
            Self::ConfigMissing { .. } => "config_missing",
            Self::AuthMissing { .. } => "auth_missing",
            Self::Unsupported { .. } => "unsupported_operation",
            Self::Tree(e) => e.kind(),
            Self::Config(e) => e.kind(),
        }
    }
}

/// Result type for controller operations
pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
