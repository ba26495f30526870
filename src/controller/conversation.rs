//! The externally-constructed model driver the controller consumes.
//!
//! The controller never schedules model work itself; it drives a
//! [`Conversation`] and folds the event stream it emits into the tree.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::types::{Attachment, Message, ProviderChoice, QueueMode};

/// Handler invoked for every conversation event, in emission order.
pub type EventHandler = Arc<dyn Fn(ConversationEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifies one event-stream subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Events emitted while the conversation makes progress.
///
/// The controller acts on `MessageStart` and `MessageEnd`; everything else
/// passes through to listeners untouched.
#[derive(Clone, Debug)]
pub enum ConversationEvent {
    AgentStart,
    MessageStart {
        message: Message,
    },
    MessageUpdate {
        message: Message,
    },
    MessageEnd {
        message: Message,
    },
    ToolExecutionStart {
        tool_call_id: String,
        name: String,
    },
    ToolExecutionUpdate {
        tool_call_id: String,
        output: String,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        is_error: bool,
    },
    AgentEnd,
}

/// Snapshot of the conversation's in-memory state.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    /// The messages currently loaded into the conversation
    pub messages: Vec<Message>,
    /// The selected provider, if any
    pub provider: Option<ProviderChoice>,
    /// Whether a model response is currently streaming
    pub is_streaming: bool,
}

/// The model driver interface.
///
/// Implementations own all long-running work (model calls, tool I/O) and
/// surface progress through subscribed handlers. Failures surface as events
/// (an assistant message finalized with an `error` stop reason), not as
/// method errors.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// Start a user turn
    async fn prompt(&self, text: String, attachments: Vec<Attachment>);

    /// Enqueue a user message for a later turn
    async fn queue_message(&self, message: Message);

    /// Drop every queued user message
    async fn clear_message_queue(&self);

    /// Select the model and options for subsequent turns
    fn set_provider(&self, provider: ProviderChoice);

    /// Set the queued-message draining policy
    fn set_queue_mode(&self, mode: QueueMode);

    /// The current draining policy
    fn queue_mode(&self) -> QueueMode;

    /// Replace the loaded message history wholesale
    async fn replace_messages(&self, messages: Vec<Message>);

    /// Request that streaming stop
    fn abort(&self);

    /// Resolve once no work is in flight; immediate when idle
    async fn wait_for_idle(&self);

    /// Drop all loaded messages and queued inputs
    async fn reset(&self);

    /// Register an event handler; events are delivered in emission order
    fn subscribe(&self, handler: EventHandler) -> SubscriptionId;

    /// Remove a previously registered handler
    fn unsubscribe(&self, id: SubscriptionId);

    /// Snapshot the in-memory state
    fn state(&self) -> ConversationState;
}
