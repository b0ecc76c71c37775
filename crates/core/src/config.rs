//! Configuration management for chatloop.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`.chatloop/config.yaml` in the workspace, or `CHATLOOP_CONFIG`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the gateway factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 4] = ["claude", "openai", "ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (may contain .chatloop/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("claude", "openai", "ollama", "mock")
    pub provider: String,

    /// Explicit model override; see [`AppConfig::resolved_model`]
    pub model: Option<String>,

    /// API key from `CHATLOOP_API_KEY`, takes precedence over provider settings
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Per-provider settings from the config file, keyed by provider name
    pub providers: HashMap<String, ProviderSettings>,

    /// Conversation defaults
    pub chat: ChatConfig,
}

/// Settings for one provider entry under `llm.providers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model identifier used when no explicit model is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Custom endpoint (proxies, self-hosted gateways, local Ollama port)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Conversation defaults shared by every driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// Maximum output tokens per model call
    pub max_tokens: u32,

    /// Sampling temperature; provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum documents injected per turn
    pub max_results: usize,

    /// Send only the last N turns of history; unbounded when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_history_turns: Option<usize>,

    /// Maximum model round-trips spent on tool calls within one turn
    pub max_tool_rounds: usize,

    /// Input that ends an interactive session
    pub quit_token: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: None,
            max_results: 3,
            max_history_turns: None,
            max_tool_rounds: 8,
            quit_token: "quit".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmSection>,
    chat: Option<ChatConfig>,
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LlmSection {
    #[serde(rename = "activeProvider")]
    active_provider: Option<String>,
    #[serde(default)]
    providers: HashMap<String, ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "claude".to_string(),
            model: None,
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            providers: HashMap::new(),
            chat: ChatConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `CHATLOOP_WORKSPACE`: Override workspace path
    /// - `CHATLOOP_CONFIG`: Path to config file
    /// - `CHATLOOP_PROVIDER`: LLM provider
    /// - `CHATLOOP_MODEL`: Model identifier
    /// - `CHATLOOP_API_KEY`: API key for the active provider
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use chatloop_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Provider: {}", config.provider);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `CHATLOOP_WORKSPACE` / `CHATLOOP_CONFIG`.
    ///
    /// The CLI uses this so `--workspace` and `--config` decide which file is
    /// read, not just where later lookups happen.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        } else if let Ok(workspace) = std::env::var("CHATLOOP_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        } else if let Ok(config_file) = std::env::var("CHATLOOP_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        if let Ok(provider) = std::env::var("CHATLOOP_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("CHATLOOP_MODEL") {
            config.model = Some(model);
        }

        if let Ok(key) = std::env::var("CHATLOOP_API_KEY") {
            config.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the YAML file this configuration reads.
    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.chatloop_dir().join("config.yaml"))
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            if let Some(active) = llm.active_provider {
                result.provider = active;
            }
            result.providers.extend(llm.providers);
        }

        if let Some(chat) = config_file.chat {
            result.chat = chat;
        }

        tracing::debug!("Merged configuration from {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over the config file and environment.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = Some(model);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Apply per-command chat flags. Call [`AppConfig::validate`] afterwards;
    /// flags are held to the same limits as the config file.
    pub fn with_chat_overrides(
        mut self,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        max_results: Option<usize>,
    ) -> Self {
        if let Some(max_tokens) = max_tokens {
            self.chat.max_tokens = max_tokens;
        }

        if let Some(temperature) = temperature {
            self.chat.temperature = Some(temperature);
        }

        if let Some(max_results) = max_results {
            self.chat.max_results = max_results;
        }

        self
    }

    /// Get the path to the .chatloop directory.
    pub fn chatloop_dir(&self) -> PathBuf {
        self.workspace.join(".chatloop")
    }

    /// Canonical provider name, folding aliases.
    pub fn provider_name(&self) -> String {
        match self.provider.to_lowercase().as_str() {
            "anthropic" => "claude".to_string(),
            other => other.to_string(),
        }
    }

    /// Settings for the active provider, if the config file declares any.
    pub fn provider_settings(&self) -> Option<&ProviderSettings> {
        let name = self.provider_name();
        self.providers
            .get(&name)
            .or_else(|| self.providers.get(&self.provider))
    }

    /// Model for the active provider: explicit override, provider settings,
    /// then the provider's built-in default.
    pub fn resolved_model(&self) -> String {
        if let Some(ref model) = self.model {
            return model.clone();
        }

        if let Some(model) = self.provider_settings().and_then(|s| s.model.clone()) {
            return model;
        }

        default_model(&self.provider_name()).to_string()
    }

    /// Endpoint override for the active provider.
    pub fn endpoint(&self) -> Option<String> {
        self.provider_settings().and_then(|s| s.endpoint.clone())
    }

    /// Name of the environment variable holding the active provider's key.
    pub fn api_key_env(&self) -> Option<String> {
        if let Some(env) = self.provider_settings().and_then(|s| s.api_key_env.clone()) {
            return Some(env);
        }

        default_api_key_env(&self.provider_name()).map(str::to_string)
    }

    /// Resolve the API key for the active provider.
    ///
    /// Returns `Ok(None)` only for providers that need no key. A provider that
    /// requires a key but has none is a configuration error, reported before
    /// any client is built.
    pub fn require_api_key(&self) -> AppResult<Option<String>> {
        let provider = self.provider_name();
        if !requires_api_key(&provider) {
            return Ok(None);
        }

        if let Some(ref key) = self.api_key {
            if !key.trim().is_empty() {
                return Ok(Some(key.clone()));
            }
        }

        let env_var = self.api_key_env().ok_or_else(|| {
            AppError::Config(format!("No API key variable configured for {}", provider))
        })?;

        match std::env::var(&env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
            _ => Err(AppError::Config(format!(
                "API key not found: set {} (or CHATLOOP_API_KEY) for provider '{}'",
                env_var, provider
            ))),
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider_name();

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.chat.max_tokens == 0 {
            return Err(AppError::Config(
                "chat.maxTokens must be at least 1".to_string(),
            ));
        }

        if self.chat.max_results == 0 {
            return Err(AppError::Config(
                "chat.maxResults must be at least 1".to_string(),
            ));
        }

        if self.chat.max_tool_rounds == 0 {
            return Err(AppError::Config(
                "chat.maxToolRounds must be at least 1".to_string(),
            ));
        }

        if let Some(t) = self.chat.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(AppError::Config(format!(
                    "chat.temperature must be within 0.0-2.0, got {}",
                    t
                )));
            }
        }

        Ok(())
    }
}

/// Built-in default model per provider.
pub fn default_model(provider: &str) -> &'static str {
    match provider {
        "openai" => "gpt-4o",
        "ollama" => "llama3.2",
        "mock" => "mock-echo",
        _ => "claude-sonnet-4-20250514",
    }
}

/// Conventional API key variable per provider.
pub fn default_api_key_env(provider: &str) -> Option<&'static str> {
    match provider {
        "claude" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

/// Whether calls to this provider carry a credential.
pub fn requires_api_key(provider: &str) -> bool {
    matches!(provider, "claude" | "openai")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "claude");
        assert_eq!(config.resolved_model(), "claude-sonnet-4-20250514");
        assert_eq!(config.chat.max_tokens, 1024);
        assert_eq!(config.chat.max_results, 3);
        assert_eq!(config.chat.quit_token, "quit");
        assert!(config.chat.max_history_turns.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn test_chatloop_dir() {
        let config = AppConfig::default();
        assert!(config.chatloop_dir().ends_with(".chatloop"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("openai".to_string()),
            None,
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "openai");
        assert_eq!(overridden.resolved_model(), "gpt-4o");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_explicit_model_wins() {
        let config = AppConfig::default().with_overrides(
            None,
            None,
            Some("ollama".to_string()),
            Some("mistral".to_string()),
            None,
            false,
            false,
        );
        assert_eq!(config.resolved_model(), "mistral");
    }

    #[test]
    fn test_anthropic_alias() {
        let mut config = AppConfig::default();
        config.provider = "Anthropic".to_string();
        assert_eq!(config.provider_name(), "claude");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_temperature_range() {
        let mut config = AppConfig::default();
        config.chat.temperature = Some(3.5);
        assert!(config.validate().is_err());

        config.chat.temperature = Some(0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chat_overrides_are_validated() {
        let config = AppConfig::default().with_chat_overrides(None, Some(2.5), None);
        assert_eq!(config.chat.temperature, Some(2.5));
        assert!(config.validate().is_err());

        let config = AppConfig::default().with_chat_overrides(None, None, Some(0));
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let config = AppConfig::default().with_chat_overrides(Some(0), None, None);
        assert!(config.validate().is_err());

        let config = AppConfig::default().with_chat_overrides(Some(256), Some(0.2), Some(5));
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.max_tokens, 256);
        assert_eq!(config.chat.max_results, 5);
    }

    #[test]
    fn test_keyless_providers() {
        let mut config = AppConfig::default();
        config.provider = "ollama".to_string();
        assert_eq!(config.require_api_key().unwrap(), None);

        config.provider = "mock".to_string();
        assert_eq!(config.require_api_key().unwrap(), None);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut config = AppConfig::default();
        config.providers.insert(
            "claude".to_string(),
            ProviderSettings {
                api_key_env: Some("CHATLOOP_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
                ..Default::default()
            },
        );

        match config.require_api_key() {
            Err(AppError::Config(msg)) => {
                assert!(msg.contains("CHATLOOP_TEST_KEY_THAT_IS_NEVER_SET"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-test".to_string());
        assert_eq!(config.require_api_key().unwrap(), Some("sk-test".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(
            &path,
            r#"
llm:
  activeProvider: openai
  providers:
    openai:
      apiKeyEnv: MY_OPENAI_KEY
      model: gpt-4o-mini
      endpoint: http://localhost:9999
chat:
  maxTokens: 512
  maxResults: 2
  maxHistoryTurns: 4
logging:
  level: debug
  color: false
"#,
        )
        .unwrap();

        let config = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(config.provider, "openai");
        assert_eq!(config.resolved_model(), "gpt-4o-mini");
        assert_eq!(config.endpoint(), Some("http://localhost:9999".to_string()));
        assert_eq!(config.api_key_env(), Some("MY_OPENAI_KEY".to_string()));
        assert_eq!(config.chat.max_tokens, 512);
        assert_eq!(config.chat.max_results, 2);
        assert_eq!(config.chat.max_history_turns, Some(4));
        assert_eq!(config.chat.quit_token, "quit");
        assert_eq!(config.log_level, Some("debug".to_string()));
        assert!(config.no_color);
    }

    #[test]
    fn test_load_with_workspace_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".chatloop");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.yaml"),
            "chat:\n  maxToolRounds: 3\n  quitToken: exit\n",
        )
        .unwrap();

        let config = AppConfig::load_with(Some(temp_dir.path().to_path_buf()), None).unwrap();
        assert_eq!(config.chat.max_tool_rounds, 3);
        assert_eq!(config.chat.quit_token, "exit");
        assert_eq!(config.chat.max_tokens, 1024);
    }

    #[test]
    fn test_load_with_missing_explicit_config() {
        let temp_dir = TempDir::new().unwrap();
        let result = AppConfig::load_with(
            Some(temp_dir.path().to_path_buf()),
            Some(temp_dir.path().join("nope.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_merge_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "llm: [unclosed").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
