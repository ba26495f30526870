//! Model registry and API key resolution.
//!
//! The registry is an explicit value passed to the controller; there are no
//! process-wide singletons. [`api_key_from_env`] is used only as a yes/no
//! gate before a model is accepted.

use serde::{Deserialize, Serialize};

use crate::types::ProviderChoice;

/// A model known to the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Provider family (e.g. "anthropic", "openai", "google")
    pub api: String,
    /// Model identifier
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Options applied when none are given explicitly
    #[serde(default)]
    pub default_options: serde_json::Value,
}

impl Model {
    /// Create a model entry with empty default options
    pub fn new(
        api: impl Into<String>,
        id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            api: api.into(),
            id: id.into(),
            display_name: display_name.into(),
            default_options: serde_json::Value::Object(Default::default()),
        }
    }

    /// Attach default options
    pub fn with_default_options(mut self, options: serde_json::Value) -> Self {
        self.default_options = options;
        self
    }

    /// The provider triple selecting this model with its default options
    pub fn provider_choice(&self) -> ProviderChoice {
        ProviderChoice {
            api: self.api.clone(),
            model_id: self.id.clone(),
            options: self.default_options.clone(),
        }
    }
}

/// Explicit registry of usable models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<Model>,
}

impl ModelRegistry {
    /// Create a registry from an explicit model list
    pub fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    /// Look up a model by provider family and id
    pub fn get_model(&self, api: &str, id: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.api == api && m.id == id)
    }

    /// All registered models, in registration order
    pub fn available_models(&self) -> &[Model] {
        &self.models
    }

    /// Whether the registry has any entries
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Resolve the API key for a provider family from the environment.
///
/// Known families map to their conventional variables; anything else falls
/// back to `<FAMILY>_API_KEY` uppercased.
pub fn api_key_from_env(api: &str) -> Option<String> {
    let names: &[&str] = match api {
        "anthropic" => &["ANTHROPIC_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "google" => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        _ => return lookup(&format!("{}_API_KEY", api.to_uppercase())),
    };
    names.iter().find_map(|name| lookup(name))
}

fn lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
