//! Assembly of a controller from its parts.

use std::path::PathBuf;
use std::sync::Arc;

use super::controller::SessionController;
use super::conversation::Conversation;
use super::{ControllerError, ControllerResult};
use crate::config::SettingsStore;
use crate::models::ModelRegistry;
use crate::tree::{ContextStrategy, SessionTree};
use crate::types::{ProviderChoice, QueueMode};

/// The system prompt handed to the conversation factory.
#[derive(Clone)]
pub enum SystemPrompt {
    /// A fixed prompt
    Text(String),
    /// A transformer applied to whatever base prompt the conversation uses
    Transform(Arc<dyn Fn(String) -> String + Send + Sync>),
}

impl std::fmt::Debug for SystemPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Transform(_) => write!(f, "Transform(..)"),
        }
    }
}

/// Everything the conversation factory needs to construct the driver.
pub struct ConversationConfig {
    /// The resolved provider triple
    pub provider: ProviderChoice,
    /// Optional system prompt or transformer
    pub system_prompt: Option<SystemPrompt>,
    /// Tool names to expose
    pub tools: Vec<String>,
    /// Queued-input draining policy from settings
    pub queue_mode: QueueMode,
}

/// Builder assembling a [`SessionController`].
///
/// Model resolution order: explicit provider, then the provider recorded in
/// an explicitly supplied tree, then the settings default, then the first
/// registry entry. With none of those, building fails. The agent directory
/// defaults to `~/.agent` when not set explicitly.
pub struct ControllerBuilder {
    cwd: PathBuf,
    agent_dir: Option<PathBuf>,
    provider: Option<ProviderChoice>,
    system_prompt: Option<SystemPrompt>,
    tools: Vec<String>,
    tree: Option<SessionTree>,
    settings: Option<SettingsStore>,
    registry: Arc<ModelRegistry>,
}

impl ControllerBuilder {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            agent_dir: None,
            provider: None,
            system_prompt: None,
            tools: Vec::new(),
            tree: None,
            settings: None,
            registry: Arc::new(ModelRegistry::default()),
        }
    }

    /// Override the agent directory holding settings and session logs
    pub fn agent_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.agent_dir = Some(dir.into());
        self
    }

    /// Select the provider explicitly, overriding every other source
    pub fn provider(mut self, provider: ProviderChoice) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use a fixed system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(SystemPrompt::Text(prompt.into()));
        self
    }

    /// Transform the conversation's base system prompt
    pub fn system_prompt_transform(
        mut self,
        f: impl Fn(String) -> String + Send + Sync + 'static,
    ) -> Self {
        self.system_prompt = Some(SystemPrompt::Transform(Arc::new(f)));
        self
    }

    /// Tool names to expose to the conversation
    pub fn tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Wrap an existing tree instead of creating a fresh one
    pub fn tree(mut self, tree: SessionTree) -> Self {
        self.tree = Some(tree);
        self
    }

    /// Use a pre-loaded settings store instead of loading from disk
    pub fn settings(mut self, settings: SettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    /// The model registry consulted for defaults and validation
    pub fn registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Resolve the pieces and build the controller.
    ///
    /// `make_conversation` constructs the externally-owned driver from the
    /// resolved configuration. When the tree already holds messages, the
    /// conversation is seeded with the projected Full context.
    pub async fn build<F>(self, make_conversation: F) -> ControllerResult<SessionController>
    where
        F: FnOnce(ConversationConfig) -> Arc<dyn Conversation>,
    {
        let agent_dir = self
            .agent_dir
            .or_else(crate::config::default_agent_dir)
            .ok_or_else(|| ControllerError::ConfigMissing {
                message: "no agent directory given and no home directory to default to"
                    .to_string(),
            })?;

        let settings = match self.settings {
            Some(settings) => settings,
            None => SettingsStore::load(&agent_dir, &self.cwd).await?,
        };

        let provider = self
            .provider
            .or_else(|| self.tree.as_ref().and_then(|t| t.last_provider(None)))
            .or_else(|| settings.settings().default_provider())
            .or_else(|| {
                self.registry
                    .available_models()
                    .first()
                    .map(|m| m.provider_choice())
            })
            .ok_or(ControllerError::NoModelsAvailable)?;

        let tree = match self.tree {
            Some(tree) => tree,
            None => {
                SessionTree::create(self.cwd.clone(), &agent_dir, Some(provider.clone())).await?
            }
        };

        let queue_mode = settings.settings().queue_mode.unwrap_or_default();
        let conversation = make_conversation(ConversationConfig {
            provider,
            system_prompt: self.system_prompt,
            tools: self.tools,
            queue_mode,
        });

        if tree.message_count() > 0 {
            let context = tree.build_context(None, &ContextStrategy::Full);
            conversation.replace_messages(context).await;
        }

        Ok(SessionController::new(
            tree,
            conversation,
            settings,
            self.registry,
            agent_dir,
        ))
    }
}
