//! Provider selection types.

use serde::{Deserialize, Serialize};

/// The triple identifying a model and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderChoice {
    /// Provider family (e.g. "anthropic", "openai", "google")
    pub api: String,
    /// Model identifier within the family
    pub model_id: String,
    /// Provider-specific options, passed through opaquely
    #[serde(default)]
    pub options: serde_json::Value,
}

impl ProviderChoice {
    /// Create a provider choice with empty options
    pub fn new(api: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            model_id: model_id.into(),
            options: serde_json::Value::Object(Default::default()),
        }
    }

    /// Attach provider options
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }
}

/// Policy for draining queued user messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueMode {
    /// Process every queued message before the next assistant turn
    #[default]
    #[serde(rename = "all")]
    All,
    /// Process one queued message per assistant turn
    #[serde(rename = "one-at-a-time")]
    OneAtATime,
}

/// Reasoning effort requested from thinking-capable models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    /// Minimal reasoning budget
    Low,
    /// Expanded reasoning budget
    High,
}

impl ThinkingLevel {
    /// Wire value used inside provider options
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}
