//! The session controller.
//!
//! Wraps a [`SessionTree`], an externally-constructed [`Conversation`] and a
//! [`SettingsStore`]. Every conversation event flows through one handler
//! that keeps the queued-input mirror consistent (dequeue before the start
//! event fans out), forwards the event to listeners in registration order,
//! and persists finalized messages to the tree (after the fan-out).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;
use tokio::sync::{Mutex, MutexGuard};

use super::conversation::{Conversation, ConversationEvent, EventHandler, SubscriptionId};
use super::queue::InputQueue;
use super::stats::SessionStats;
use super::{ControllerError, ControllerResult};
use crate::config::{SettingsStore, merge_values};
use crate::models::{Model, ModelRegistry, api_key_from_env};
use crate::tree::{
    BranchInfo, CheckpointNode, ContextStrategy, MergeNode, SessionTree, SummaryNode, TreeError,
    summarize,
};
use crate::types::{Attachment, Message, NodeId, ProviderChoice, QueueMode, Role, ThinkingLevel};

/// Listener invoked for every conversation event, after the controller's
/// own bookkeeping for that event.
pub type EventListener = Arc<dyn Fn(ConversationEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Identifies one registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Where the controller stands relative to the conversation's event stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Not subscribed to the conversation
    Disconnected,
    /// Subscribed and forwarding events
    Connected,
    /// Mid reset/switch: link torn down, abort awaited, tree mutating
    Swapping,
}

struct Shared {
    tree: Mutex<SessionTree>,
    queue: Mutex<InputQueue>,
    listeners: Mutex<Vec<(ListenerId, EventListener)>>,
    next_listener_id: AtomicU64,
    state: Mutex<ControllerState>,
}

impl Shared {
    async fn handle_event(self: Arc<Self>, event: ConversationEvent) {
        // Dequeue before the start event is observable anywhere.
        if let ConversationEvent::MessageStart { message } = &event
            && message.role() == Role::User
        {
            self.queue.lock().await.dequeue_front_if(&message.text());
        }

        let listeners: Vec<EventListener> = self
            .listeners
            .lock()
            .await
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(event.clone()).await;
        }

        // Only finalized messages reach the tree; an aborted stream still
        // finalizes with its stop reason set.
        if let ConversationEvent::MessageEnd { message } = event {
            let mut tree = self.tree.lock().await;
            if let Err(e) = tree.append_message(message, None).await {
                tracing::error!(error = %e, "Failed to persist finalized message");
            }
        }
    }
}

/// The operational facade over one agent session.
pub struct SessionController {
    conversation: Arc<dyn Conversation>,
    registry: Arc<ModelRegistry>,
    settings: Mutex<SettingsStore>,
    agent_dir: PathBuf,
    subscription: Mutex<Option<SubscriptionId>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("agent_dir", &self.agent_dir)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Wrap an existing tree, conversation and settings store.
    pub fn new(
        tree: SessionTree,
        conversation: Arc<dyn Conversation>,
        settings: SettingsStore,
        registry: Arc<ModelRegistry>,
        agent_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            conversation,
            registry,
            settings: Mutex::new(settings),
            agent_dir: agent_dir.into(),
            subscription: Mutex::new(None),
            shared: Arc::new(Shared {
                tree: Mutex::new(tree),
                queue: Mutex::new(InputQueue::new()),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                state: Mutex::new(ControllerState::Disconnected),
            }),
        }
    }

    fn make_handler(shared: Arc<Shared>) -> EventHandler {
        Arc::new(move |event| {
            let shared = shared.clone();
            Box::pin(shared.handle_event(event))
        })
    }

    // ------------------------------------------------------------------
    // Subscription lifecycle
    // ------------------------------------------------------------------

    /// Register a listener; the first subscription connects the controller
    /// to the conversation's event stream.
    pub async fn subscribe(&self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let first = {
            let mut listeners = self.shared.listeners.lock().await;
            let first = listeners.is_empty();
            listeners.push((id, listener));
            first
        };
        if first {
            self.connect().await;
            *self.shared.state.lock().await = ControllerState::Connected;
        }
        id
    }

    /// Remove a listener; removing an unknown id is a no-op.
    pub async fn unsubscribe(&self, id: ListenerId) {
        self.shared
            .listeners
            .lock()
            .await
            .retain(|(lid, _)| *lid != id);
    }

    /// Drop every listener and disconnect. Idempotent.
    pub async fn dispose(&self) {
        self.shared.listeners.lock().await.clear();
        self.disconnect().await;
        *self.shared.state.lock().await = ControllerState::Disconnected;
    }

    /// Where the controller stands relative to the event stream
    pub async fn state(&self) -> ControllerState {
        *self.shared.state.lock().await
    }

    async fn connect(&self) {
        let mut sub = self.subscription.lock().await;
        if sub.is_none() {
            let handler = Self::make_handler(self.shared.clone());
            *sub = Some(self.conversation.subscribe(handler));
        }
    }

    async fn disconnect(&self) -> bool {
        match self.subscription.lock().await.take() {
            Some(id) => {
                self.conversation.unsubscribe(id);
                true
            }
            None => false,
        }
    }

    /// Tear down the event link and wait out in-flight work before a swap.
    async fn begin_swap(&self) -> bool {
        *self.shared.state.lock().await = ControllerState::Swapping;
        let was_connected = self.disconnect().await;
        self.abort().await;
        was_connected
    }

    async fn end_swap(&self, reconnect: bool) {
        if reconnect {
            self.connect().await;
        }
        *self.shared.state.lock().await = if reconnect {
            ControllerState::Connected
        } else {
            ControllerState::Disconnected
        };
    }

    // ------------------------------------------------------------------
    // Prompting and the input queue
    // ------------------------------------------------------------------

    /// Start a user turn.
    ///
    /// Validates that a model is selected and that an API key for its
    /// family resolves, without side effects on failure.
    pub async fn prompt(
        &self,
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> ControllerResult<()> {
        let provider = self.selected_provider()?;
        self.require_api_key(&provider.api)?;
        self.conversation.prompt(text.into(), attachments).await;
        Ok(())
    }

    /// Queue a prompt for a later turn.
    pub async fn queue(&self, text: impl Into<String>) -> ControllerResult<()> {
        let text = text.into();
        self.shared.queue.lock().await.enqueue(text.clone());
        self.conversation.queue_message(Message::user(text)).await;
        Ok(())
    }

    /// Return and clear the queued prompts, in enqueue order.
    pub async fn clear_queue(&self) -> Vec<String> {
        let texts = self.shared.queue.lock().await.drain();
        self.conversation.clear_message_queue().await;
        texts
    }

    /// Number of prompts still queued
    pub async fn queued_count(&self) -> usize {
        self.shared.queue.lock().await.pending_count()
    }

    /// Request an abort and wait until the conversation reports idle.
    ///
    /// Completes immediately when no work is in flight.
    pub async fn abort(&self) {
        self.conversation.abort();
        self.conversation.wait_for_idle().await;
    }

    // ------------------------------------------------------------------
    // Model selection
    // ------------------------------------------------------------------

    /// Select a model with explicit options and record the switch.
    pub async fn set_model(
        &self,
        model: &Model,
        options: serde_json::Value,
    ) -> ControllerResult<()> {
        self.apply_provider(ProviderChoice {
            api: model.api.clone(),
            model_id: model.id.clone(),
            options,
        })
        .await
    }

    /// Select a model, defaulting options from its registry entry.
    pub async fn change_model(
        &self,
        model: &Model,
        options: Option<serde_json::Value>,
    ) -> ControllerResult<()> {
        let options = options.unwrap_or_else(|| model.default_options.clone());
        self.set_model(model, options).await
    }

    /// Merge a thinking level into the current provider options.
    ///
    /// Supported for OpenAI-style (`reasoning.effort`) and Google-style
    /// (`thinkingConfig.thinkingLevel`) families.
    pub async fn update_thinking_level(&self, level: ThinkingLevel) -> ControllerResult<()> {
        let provider = self.selected_provider()?;
        let patch = match provider.api.as_str() {
            "openai" => serde_json::json!({"reasoning": {"effort": level.as_str()}}),
            "google" => serde_json::json!({"thinkingConfig": {"thinkingLevel": level.as_str()}}),
            _ => {
                return Err(ControllerError::Unsupported {
                    operation: format!("thinking level on '{}' models", provider.api),
                });
            }
        };

        let mut options = provider.options.clone();
        merge_values(&mut options, patch);
        self.apply_provider(ProviderChoice {
            api: provider.api,
            model_id: provider.model_id,
            options,
        })
        .await
    }

    /// Forward the queue mode to the conversation and persist it.
    pub async fn set_queue_mode(&self, mode: QueueMode) -> ControllerResult<()> {
        self.conversation.set_queue_mode(mode);
        let mut settings = self.settings.lock().await;
        settings.set_queue_mode(mode);
        settings.save().await?;
        Ok(())
    }

    async fn apply_provider(&self, choice: ProviderChoice) -> ControllerResult<()> {
        self.require_api_key(&choice.api)?;
        self.conversation.set_provider(choice.clone());
        self.shared
            .tree
            .lock()
            .await
            .append_provider(choice.api, choice.model_id, choice.options, None)
            .await?;
        Ok(())
    }

    fn selected_provider(&self) -> ControllerResult<ProviderChoice> {
        self.conversation
            .state()
            .provider
            .ok_or_else(|| ControllerError::ConfigMissing {
                message: "no model selected".to_string(),
            })
    }

    fn require_api_key(&self, api: &str) -> ControllerResult<()> {
        if api_key_from_env(api).is_none() {
            return Err(ControllerError::AuthMissing {
                api: api.to_string(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session and branch switching
    // ------------------------------------------------------------------

    /// Abandon the current tree for a fresh one in the same working
    /// directory. Listeners are preserved; the old log stays on disk.
    pub async fn reset(&self) -> ControllerResult<()> {
        let reconnect = self.begin_swap().await;
        let result = self.reset_inner().await;
        self.end_swap(reconnect).await;
        result
    }

    async fn reset_inner(&self) -> ControllerResult<()> {
        let provider = self.conversation.state().provider;
        self.conversation.reset().await;
        {
            let mut tree = self.shared.tree.lock().await;
            let fresh = tree.reset(&self.agent_dir).await?;
            *tree = fresh;
            if let Some(p) = provider {
                tree.append_provider(p.api, p.model_id, p.options, None)
                    .await?;
            }
        }
        self.shared.queue.lock().await.drain();
        self.conversation.clear_message_queue().await;
        Ok(())
    }

    /// Load the tree at `path` and point the conversation at its history.
    ///
    /// Fails without switching when the saved provider references a model
    /// the registry does not know.
    pub async fn switch_session(&self, path: &Path) -> ControllerResult<()> {
        let reconnect = self.begin_swap().await;
        let result = self.switch_session_inner(path).await;
        self.end_swap(reconnect).await;
        result
    }

    async fn switch_session_inner(&self, path: &Path) -> ControllerResult<()> {
        self.shared.queue.lock().await.drain();
        self.conversation.clear_message_queue().await;

        let tree = SessionTree::open(path).await?;
        let provider = tree.last_provider(None);
        if let Some(p) = &provider
            && self.registry.get_model(&p.api, &p.model_id).is_none()
        {
            return Err(ControllerError::ConfigMissing {
                message: format!("session references unknown model {}/{}", p.api, p.model_id),
            });
        }

        let context = tree.build_context(None, &ContextStrategy::Full);
        self.conversation.replace_messages(context).await;
        if let Some(p) = provider {
            self.conversation.set_provider(p);
        }
        *self.shared.tree.lock().await = tree;
        Ok(())
    }

    /// Register a branch diverging at `from_node_id` (default: the head of
    /// the active branch).
    pub async fn create_branch(
        &self,
        name: &str,
        from_node_id: Option<&NodeId>,
    ) -> ControllerResult<()> {
        self.shared
            .tree
            .lock()
            .await
            .create_branch(name, from_node_id)?;
        Ok(())
    }

    /// Switch the active branch and reload the conversation's history with
    /// the projected context (Full unless a strategy is given).
    pub async fn switch_branch(
        &self,
        name: &str,
        strategy: Option<ContextStrategy>,
    ) -> ControllerResult<()> {
        let reconnect = self.begin_swap().await;
        let result = self.switch_branch_inner(name, strategy).await;
        self.end_swap(reconnect).await;
        result
    }

    async fn switch_branch_inner(
        &self,
        name: &str,
        strategy: Option<ContextStrategy>,
    ) -> ControllerResult<()> {
        self.shared.queue.lock().await.drain();
        self.conversation.clear_message_queue().await;

        let context = {
            let mut tree = self.shared.tree.lock().await;
            tree.switch_branch(name).await?;
            tree.build_context(None, &strategy.unwrap_or_default())
        };
        self.conversation.replace_messages(context).await;
        Ok(())
    }

    /// Create a branch and switch to it in one step.
    pub async fn branch_and_switch(
        &self,
        name: &str,
        from_node_id: Option<&NodeId>,
    ) -> ControllerResult<BranchInfo> {
        self.create_branch(name, from_node_id).await?;
        self.switch_branch(name, None).await?;
        let tree = self.shared.tree.lock().await;
        tree.branch_info(name).ok_or_else(|| {
            ControllerError::Tree(TreeError::UnknownBranch {
                name: name.to_string(),
            })
        })
    }

    /// Fold another branch into the active one as a narrative node.
    pub async fn merge_branch(
        &self,
        from_branch: &str,
        summary: impl Into<String>,
    ) -> ControllerResult<MergeNode> {
        let node = self
            .shared
            .tree
            .lock()
            .await
            .merge(from_branch, summary, None)
            .await?;
        Ok(node)
    }

    /// Record a summary standing in for the listed nodes.
    pub async fn create_summary(
        &self,
        content: impl Into<String>,
        node_ids: Vec<NodeId>,
    ) -> ControllerResult<SummaryNode> {
        let node = self
            .shared
            .tree
            .lock()
            .await
            .append_summary(content, node_ids, None)
            .await?;
        Ok(node)
    }

    /// Record a named checkpoint on the active branch.
    pub async fn create_checkpoint(
        &self,
        name: impl Into<String>,
        metadata: Option<std::collections::HashMap<String, serde_json::Value>>,
    ) -> ControllerResult<CheckpointNode> {
        let node = self
            .shared
            .tree
            .lock()
            .await
            .append_checkpoint(name, metadata, None)
            .await?;
        Ok(node)
    }

    /// The summarization request for a branch's full context.
    ///
    /// The caller runs the model call and feeds the result back through
    /// [`create_summary`](Self::create_summary).
    pub async fn prepare_branch_summary(&self, branch: Option<&str>) -> String {
        let tree = self.shared.tree.lock().await;
        let messages = tree.build_context(branch, &ContextStrategy::Full);
        summarize::summarization_request(&messages)
    }

    /// Counters and usage totals over the conversation's loaded messages.
    pub async fn session_stats(&self) -> SessionStats {
        let state = self.conversation.state();
        let tree = self.shared.tree.lock().await;
        SessionStats::build(
            &state.messages,
            tree.session_id().clone(),
            tree.file_path().map(Path::to_path_buf),
            tree.active_branch().to_string(),
        )
    }

    /// Exclusive access to the underlying tree.
    pub async fn tree(&self) -> MutexGuard<'_, SessionTree> {
        self.shared.tree.lock().await
    }

    /// The wrapped conversation.
    pub fn conversation(&self) -> &Arc<dyn Conversation> {
        &self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::conversation::ConversationState;
    use crate::config::SettingsStore;
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubState {
        messages: Vec<Message>,
        provider: Option<ProviderChoice>,
        queue_mode: QueueMode,
        queued: Vec<Message>,
    }

    #[derive(Default)]
    struct StubConversation {
        state: std::sync::Mutex<StubState>,
        handlers: std::sync::Mutex<HashMap<u64, EventHandler>>,
        next_id: AtomicU64,
    }

    impl StubConversation {
        fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn with_provider(provider: ProviderChoice) -> Arc<Self> {
            let stub = Self::default();
            stub.state.lock().unwrap().provider = Some(provider);
            Arc::new(stub)
        }

        fn handler_count(&self) -> usize {
            self.handlers.lock().unwrap().len()
        }

        fn queued_messages(&self) -> usize {
            self.state.lock().unwrap().queued.len()
        }

        async fn emit(&self, event: ConversationEvent) {
            let handlers: Vec<EventHandler> =
                self.handlers.lock().unwrap().values().cloned().collect();
            for handler in handlers {
                handler(event.clone()).await;
            }
        }
    }

    #[async_trait::async_trait]
    impl Conversation for StubConversation {
        async fn prompt(&self, text: String, _attachments: Vec<Attachment>) {
            let message = Message::user(text);
            self.state.lock().unwrap().messages.push(message.clone());
            self.emit(ConversationEvent::MessageStart {
                message: message.clone(),
            })
            .await;
            self.emit(ConversationEvent::MessageEnd { message }).await;
        }

        async fn queue_message(&self, message: Message) {
            self.state.lock().unwrap().queued.push(message);
        }

        async fn clear_message_queue(&self) {
            self.state.lock().unwrap().queued.clear();
        }

        fn set_provider(&self, provider: ProviderChoice) {
            self.state.lock().unwrap().provider = Some(provider);
        }

        fn set_queue_mode(&self, mode: QueueMode) {
            self.state.lock().unwrap().queue_mode = mode;
        }

        fn queue_mode(&self) -> QueueMode {
            self.state.lock().unwrap().queue_mode
        }

        async fn replace_messages(&self, messages: Vec<Message>) {
            self.state.lock().unwrap().messages = messages;
        }

        fn abort(&self) {}

        async fn wait_for_idle(&self) {}

        async fn reset(&self) {
            let mut state = self.state.lock().unwrap();
            state.messages.clear();
            state.queued.clear();
        }

        fn subscribe(&self, handler: EventHandler) -> SubscriptionId {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.handlers.lock().unwrap().insert(id, handler);
            SubscriptionId(id)
        }

        fn unsubscribe(&self, id: SubscriptionId) {
            self.handlers.lock().unwrap().remove(&id.0);
        }

        fn state(&self) -> ConversationState {
            let state = self.state.lock().unwrap();
            ConversationState {
                messages: state.messages.clone(),
                provider: state.provider.clone(),
                is_streaming: false,
            }
        }
    }

    fn controller_with(conversation: Arc<StubConversation>) -> SessionController {
        SessionController::new(
            SessionTree::in_memory(None, None),
            conversation,
            SettingsStore::in_memory(),
            Arc::new(ModelRegistry::new(vec![Model::new(
                "stubapi",
                "stub-1",
                "Stub One",
            )])),
            "/tmp/agent",
        )
    }

    #[tokio::test]
    async fn test_queue_and_clear_queue_roundtrip() {
        let stub = StubConversation::new();
        let controller = controller_with(stub.clone());

        controller.queue("Q1").await.unwrap();
        controller.queue("Q2").await.unwrap();
        assert_eq!(controller.queued_count().await, 2);
        assert_eq!(stub.queued_messages(), 2);

        let drained = controller.clear_queue().await;
        assert_eq!(drained, vec!["Q1", "Q2"]);
        assert_eq!(controller.queued_count().await, 0);
        assert_eq!(stub.queued_messages(), 0);
    }

    #[tokio::test]
    async fn test_prompt_requires_model_and_key() {
        let controller = controller_with(StubConversation::new());
        let err = controller.prompt("hello", Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), "config_missing");

        let controller = controller_with(StubConversation::with_provider(ProviderChoice::new(
            "keyless-family",
            "m1",
        )));
        let err = controller.prompt("hello", Vec::new()).await.unwrap_err();
        assert_eq!(err.kind(), "auth_missing");
    }

    #[tokio::test]
    async fn test_subscribe_connects_and_dispose_is_idempotent() {
        let stub = StubConversation::new();
        let controller = controller_with(stub.clone());
        assert_eq!(controller.state().await, ControllerState::Disconnected);
        assert_eq!(stub.handler_count(), 0);

        let id = controller
            .subscribe(Arc::new(|_| Box::pin(async {})))
            .await;
        assert_eq!(controller.state().await, ControllerState::Connected);
        assert_eq!(stub.handler_count(), 1);

        controller.unsubscribe(id).await;
        // Unsubscribing a listener does not tear down the event link.
        assert_eq!(stub.handler_count(), 1);

        controller.dispose().await;
        assert_eq!(controller.state().await, ControllerState::Disconnected);
        assert_eq!(stub.handler_count(), 0);
        controller.dispose().await;
        assert_eq!(stub.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_message_end_persists_to_tree() {
        let stub = StubConversation::with_provider(ProviderChoice::new("stubapi", "stub-1"));
        // SAFETY: test-local env mutation.
        unsafe { std::env::set_var("STUBAPI_API_KEY", "sk-stub") };
        let controller = controller_with(stub.clone());
        controller
            .subscribe(Arc::new(|_| Box::pin(async {})))
            .await;

        controller.prompt("Hello there", Vec::new()).await.unwrap();

        let tree = controller.tree().await;
        assert_eq!(tree.message_count(), 1);
        let head = tree.get_head_node(None).unwrap();
        assert_eq!(head.as_message().unwrap().text(), "Hello there");
    }

    #[tokio::test]
    async fn test_set_queue_mode_forwards_and_persists() {
        let stub = StubConversation::new();
        let controller = controller_with(stub.clone());

        controller
            .set_queue_mode(QueueMode::OneAtATime)
            .await
            .unwrap();
        assert_eq!(stub.queue_mode(), QueueMode::OneAtATime);
        assert_eq!(
            controller.settings.lock().await.settings().queue_mode,
            Some(QueueMode::OneAtATime)
        );
    }

    #[tokio::test]
    async fn test_update_thinking_level_merges_options() {
        let stub = StubConversation::with_provider(
            ProviderChoice::new("openai", "gpt-4")
                .with_options(serde_json::json!({"temperature": 0.5})),
        );
        // SAFETY: test-local env mutation.
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-stub") };
        let controller = controller_with(stub.clone());

        controller
            .update_thinking_level(ThinkingLevel::High)
            .await
            .unwrap();

        let provider = stub.state().provider.unwrap();
        assert_eq!(provider.options["temperature"], 0.5);
        assert_eq!(provider.options["reasoning"]["effort"], "high");

        let tree = controller.tree().await;
        let recorded = tree.last_provider(None).unwrap();
        assert_eq!(recorded.options["reasoning"]["effort"], "high");
    }

    #[tokio::test]
    async fn test_update_thinking_level_unsupported_family() {
        let stub =
            StubConversation::with_provider(ProviderChoice::new("anthropic", "claude-sonnet-4-5"));
        let controller = controller_with(stub);

        let err = controller
            .update_thinking_level(ThinkingLevel::Low)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unsupported_operation");
    }

    #[tokio::test]
    async fn test_reset_swaps_tree_and_rerecords_provider() {
        let stub = StubConversation::with_provider(ProviderChoice::new("stubapi", "stub-1"));
        let controller = controller_with(stub.clone());
        controller
            .subscribe(Arc::new(|_| Box::pin(async {})))
            .await;

        let old_id = controller.tree().await.session_id().clone();
        controller.queue("stale").await.unwrap();

        controller.reset().await.unwrap();

        let tree = controller.tree().await;
        assert_ne!(tree.session_id(), &old_id);
        assert_eq!(tree.message_count(), 0);
        assert_eq!(tree.last_provider(None).unwrap().api, "stubapi");
        drop(tree);

        assert_eq!(controller.queued_count().await, 0);
        // Listeners survive; the event link was re-established.
        assert_eq!(controller.state().await, ControllerState::Connected);
        assert_eq!(stub.handler_count(), 1);
    }
}
