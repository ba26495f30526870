//! Layered settings with a user-level file and a project-local override.
//!
//! Loads settings from (lowest to highest priority):
//! 1. User level: `<agent_dir>/settings.json`
//! 2. Project local: `<project_dir>/.agent/settings.json`
//!
//! Nested objects merge recursively; arrays and scalars are replaced by the
//! higher-priority file. Unrecognized keys are ignored. Writes go to the
//! user-level file, last writer wins at file granularity.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult};
use crate::types::{ProviderChoice, QueueMode};

/// Terminal-facing options (consumed by UI integrations, not by the core).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSettings {
    /// Render images inline in the terminal
    #[serde(default = "default_show_images")]
    pub show_images: bool,
}

fn default_show_images() -> bool {
    true
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self { show_images: true }
    }
}

/// The recognized settings surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Default provider family for fresh sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_api: Option<String>,

    /// Default model id alongside `default_api`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Options passed to the provider when the default model is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider_options: Option<serde_json::Value>,

    /// Queued-input draining policy forwarded to the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_mode: Option<QueueMode>,

    /// Shell override exposed for tool integration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_path: Option<String>,

    /// Terminal integration options
    #[serde(default)]
    pub terminal: TerminalSettings,
}

impl Settings {
    /// The default provider triple, when both api and model are configured
    pub fn default_provider(&self) -> Option<ProviderChoice> {
        match (&self.default_api, &self.default_model) {
            (Some(api), Some(model)) => Some(ProviderChoice {
                api: api.clone(),
                model_id: model.clone(),
                options: self
                    .default_provider_options
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            }),
            _ => None,
        }
    }
}

/// Merge `overlay` into `base`: objects recurse, everything else replaces.
pub fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Process-wide settings accessor with explicit lifecycle.
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: Settings,
    write_path: Option<PathBuf>,
}

impl SettingsStore {
    /// An empty store with defaults and persistence disabled
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store holding the given settings, with persistence disabled
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            write_path: None,
        }
    }

    /// Load the layered settings for a project.
    ///
    /// Missing files are treated as empty; a malformed file fails the load.
    pub async fn load(agent_dir: &Path, project_dir: &Path) -> ConfigResult<Self> {
        let user_path = agent_dir.join("settings.json");
        let project_path = project_dir.join(".agent").join("settings.json");

        let mut merged = serde_json::Value::Object(Default::default());
        for path in [&user_path, &project_path] {
            if let Some(value) = read_json_if_present(path).await? {
                merge_values(&mut merged, value);
            }
        }

        let settings: Settings = serde_json::from_value(merged)?;
        Ok(Self {
            settings,
            write_path: Some(user_path),
        })
    }

    /// The current merged settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Record the default model selection
    pub fn set_default_model(&mut self, api: impl Into<String>, model: impl Into<String>) {
        self.settings.default_api = Some(api.into());
        self.settings.default_model = Some(model.into());
    }

    /// Record the default provider options
    pub fn set_default_provider_options(&mut self, options: serde_json::Value) {
        self.settings.default_provider_options = Some(options);
    }

    /// Record the queue mode
    pub fn set_queue_mode(&mut self, mode: QueueMode) {
        self.settings.queue_mode = Some(mode);
    }

    /// Record the terminal image preference
    pub fn set_show_images(&mut self, show: bool) {
        self.settings.terminal.show_images = show;
    }

    /// Write the current settings to the user-level file.
    ///
    /// A no-op for in-memory stores.
    pub async fn save(&self) -> ConfigResult<()> {
        let Some(path) = &self.write_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&self.settings)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

async fn read_json_if_present(path: &Path) -> ConfigResult<Option<serde_json::Value>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_file(path: &Path, content: &str) {
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(path, content).await.unwrap();
    }

    #[test]
    fn test_merge_values_recursive() {
        let mut base = serde_json::json!({
            "default_provider_options": {"temperature": 0.7, "reasoning": {"effort": "low"}},
            "queue_mode": "all",
            "tags": ["a", "b"]
        });
        merge_values(
            &mut base,
            serde_json::json!({
                "default_provider_options": {"reasoning": {"effort": "high"}},
                "tags": ["c"]
            }),
        );

        assert_eq!(base["default_provider_options"]["temperature"], 0.7);
        assert_eq!(base["default_provider_options"]["reasoning"]["effort"], "high");
        assert_eq!(base["queue_mode"], "all");
        // Arrays are replaced, not appended
        assert_eq!(base["tags"], serde_json::json!(["c"]));
    }

    #[tokio::test]
    async fn test_project_overrides_user() {
        let tmp = TempDir::new().unwrap();
        let agent_dir = tmp.path().join("agent");
        let project_dir = tmp.path().join("proj");

        write_file(
            &agent_dir.join("settings.json"),
            r#"{"default_api": "anthropic", "default_model": "claude-sonnet-4-5", "shell_path": "/bin/bash"}"#,
        )
        .await;
        write_file(
            &project_dir.join(".agent").join("settings.json"),
            r#"{"default_model": "claude-haiku-4-5", "unknown_key": 42}"#,
        )
        .await;

        let store = SettingsStore::load(&agent_dir, &project_dir).await.unwrap();
        let settings = store.settings();
        assert_eq!(settings.default_api.as_deref(), Some("anthropic"));
        assert_eq!(settings.default_model.as_deref(), Some("claude-haiku-4-5"));
        assert_eq!(settings.shell_path.as_deref(), Some("/bin/bash"));
        assert!(settings.terminal.show_images);
    }

    #[tokio::test]
    async fn test_missing_files_yield_defaults() {
        let tmp = TempDir::new().unwrap();
        let store = SettingsStore::load(&tmp.path().join("a"), &tmp.path().join("p"))
            .await
            .unwrap();
        assert!(store.settings().default_provider().is_none());
        assert!(store.settings().queue_mode.is_none());
    }

    #[tokio::test]
    async fn test_save_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let agent_dir = tmp.path().join("agent");
        let project_dir = tmp.path().join("proj");

        let mut store = SettingsStore::load(&agent_dir, &project_dir).await.unwrap();
        store.set_default_model("openai", "gpt-4");
        store.set_queue_mode(QueueMode::OneAtATime);
        store.save().await.unwrap();

        let reloaded = SettingsStore::load(&agent_dir, &project_dir).await.unwrap();
        assert_eq!(
            reloaded.settings().default_provider().unwrap().model_id,
            "gpt-4"
        );
        assert_eq!(
            reloaded.settings().queue_mode,
            Some(QueueMode::OneAtATime)
        );
    }

    #[test]
    fn test_default_provider_requires_both_keys() {
        let settings = Settings {
            default_api: Some("openai".into()),
            ..Default::default()
        };
        assert!(settings.default_provider().is_none());
    }
}
