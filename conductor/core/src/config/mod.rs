//! TOML Configuration File Support
//!
//! Configuration for the chat client, loaded from
//! `$XDG_CONFIG_HOME/murmur/murmur.toml` (typically `~/.config/murmur/murmur.toml`).
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "localhost"
//! port = 11434
//! connect_timeout_ms = 10000
//!
//! [model]
//! default = "llama3.2"
//!
//! [render]
//! min_interval_ms = 16
//! batch_chars = 50
//! scroll_threshold_chars = 24
//!
//! [storage]
//! conversations_dir = "~/.local/share/murmur/conversations"
//! persist = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::RenderConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[server]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Model server host (may carry a scheme)
    pub host: Option<String>,

    /// Model server port
    pub port: Option<u16>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// `[model]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelToml {
    /// Model selected at startup
    pub default: Option<String>,
}

/// `[render]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderToml {
    /// Minimum time between view refreshes
    pub min_interval_ms: Option<u64>,

    /// Buffered characters that force an early refresh
    pub batch_chars: Option<usize>,

    /// Characters rendered before the view scrolls again
    pub scroll_threshold_chars: Option<usize>,
}

/// `[storage]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Directory holding one JSON file per conversation
    pub conversations_dir: Option<PathBuf>,

    /// Whether conversations are saved at all
    pub persist: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MurmurToml {
    /// `[server]`
    pub server: ServerToml,
    /// `[model]`
    pub model: ModelToml,
    /// `[render]`
    pub render: RenderToml,
    /// `[storage]`
    pub storage: StorageToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Model server connection settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name, or a URL with a scheme
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Conversation storage settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Where conversations are stored
    pub conversations_dir: PathBuf,
    /// Whether conversations are saved
    pub persist: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            conversations_dir: default_conversations_dir(),
            persist: true,
        }
    }
}

/// Resolved client configuration
#[derive(Clone, Debug)]
pub struct MurmurConfig {
    /// Model server
    pub server: ServerConfig,

    /// Model selected at startup (`None` until the user picks one)
    pub default_model: Option<String>,

    /// Render pacing
    pub render: RenderConfig,

    /// Conversation storage
    pub storage: StorageConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for MurmurConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            default_model: None,
            render: RenderConfig::default(),
            storage: StorageConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl MurmurConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Reject values the client cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationError("server.host is empty".into()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError("server.port must be non-zero".into()));
        }
        if self.render.batch_chars == 0 {
            return Err(ConfigError::ValidationError(
                "render.batch_chars must be at least 1".into(),
            ));
        }
        if self.render.min_interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "render.min_interval_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/murmur/murmur.toml` or
/// `~/.config/murmur/murmur.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("murmur").join("murmur.toml"))
}

/// Default conversation directory, under the platform data dir
#[must_use]
pub fn default_conversations_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("murmur")
        .join("conversations")
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<MurmurConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<MurmurConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Load configuration, reading environment variables through `env`
fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<MurmurConfig, ConfigError> {
    // Start with defaults
    let mut config = MurmurConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: MurmurToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, env);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut MurmurConfig, toml: &MurmurToml) {
    // Server settings
    if let Some(ref host) = toml.server.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = toml.server.port {
        config.server.port = port;
    }
    if let Some(timeout) = toml.server.connect_timeout_ms {
        config.server.connect_timeout_ms = timeout;
    }

    // Model
    if toml.model.default.is_some() {
        config.default_model.clone_from(&toml.model.default);
    }

    // Render pacing
    if let Some(ms) = toml.render.min_interval_ms {
        config.render.min_interval = Duration::from_millis(ms);
    }
    if let Some(chars) = toml.render.batch_chars {
        config.render.batch_chars = chars;
    }
    if let Some(chars) = toml.render.scroll_threshold_chars {
        config.render.scroll_threshold_chars = chars;
    }

    // Storage
    if let Some(ref dir) = toml.storage.conversations_dir {
        config.storage.conversations_dir = expand_home(dir);
    }
    if let Some(persist) = toml.storage.persist {
        config.storage.persist = persist;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut MurmurConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(host) = env("OLLAMA_HOST") {
        config.server.host = host;
        config.source = ConfigSource::Env;
    }
    if let Some(port) = env("OLLAMA_PORT") {
        if let Ok(port) = port.parse::<u16>() {
            config.server.port = port;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %port, "Ignoring invalid OLLAMA_PORT");
        }
    }
    if let Some(model) = env("MURMUR_MODEL") {
        config.default_model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = env("MURMUR_CONVERSATIONS_DIR") {
        config.storage.conversations_dir = expand_home(&PathBuf::from(dir));
        config.source = ConfigSource::Env;
    }
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &std::path::Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Host override
    pub host: Option<String>,

    /// Port override
    pub port: Option<u16>,

    /// Default model override
    pub default_model: Option<String>,

    /// Disable persistence
    pub no_persist: bool,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set host override
    #[must_use]
    pub fn with_host(mut self, host: String) -> Self {
        self.host = Some(host);
        self
    }

    /// Set port override
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set default model override
    #[must_use]
    pub fn with_default_model(mut self, model: String) -> Self {
        self.default_model = Some(model);
        self
    }

    /// Turn persistence off
    #[must_use]
    pub fn without_persistence(mut self) -> Self {
        self.no_persist = true;
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut MurmurConfig) {
        if self.host.is_some() || self.port.is_some() || self.default_model.is_some() || self.no_persist
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref host) = self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref model) = self.default_model {
            config.default_model = Some(model.clone());
        }
        if self.no_persist {
            config.storage.persist = false;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Default Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = MurmurConfig::default();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 11434);
        assert_eq!(config.default_model, None);
        assert_eq!(config.render, RenderConfig::default());
        assert!(config.storage.persist);
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.to_string_lossy().contains("murmur"));
            assert!(p.to_string_lossy().ends_with("murmur.toml"));
        }
    }

    // =========================================================================
    // TOML Parsing Tests
    // =========================================================================

    #[test]
    fn test_parse_valid_toml() {
        let file = write_config(
            r#"
[server]
host = "gpu-box"
port = 8080
connect_timeout_ms = 2500

[model]
default = "qwen3:8b"

[render]
min_interval_ms = 33
batch_chars = 120
scroll_threshold_chars = 80

[storage]
conversations_dir = "/tmp/murmur-test"
persist = false
"#,
        );

        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(
            config.server,
            ServerConfig {
                host: "gpu-box".into(),
                port: 8080,
                connect_timeout_ms: 2500,
            }
        );
        assert_eq!(config.default_model.as_deref(), Some("qwen3:8b"));
        assert_eq!(config.render.min_interval, Duration::from_millis(33));
        assert_eq!(config.render.batch_chars, 120);
        assert_eq!(config.render.scroll_threshold_chars, 80);
        assert_eq!(
            config.storage.conversations_dir,
            PathBuf::from("/tmp/murmur-test")
        );
        assert!(!config.storage.persist);
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_parse_partial_toml() {
        let file = write_config("[model]\ndefault = \"llama3.2\"\n");
        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();

        assert_eq!(config.default_model.as_deref(), Some("llama3.2"));
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.render, RenderConfig::default());
    }

    #[test]
    fn test_missing_file_graceful() {
        let config =
            load_config_with_env(Some(PathBuf::from("/nonexistent/murmur.toml")), no_env).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = write_config("[server\nport = ");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let file = write_config("[server]\nport = \"eleven\"\n");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    // =========================================================================
    // Priority Tests
    // =========================================================================

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[server]\nhost = \"file-host\"\nport = 1\n[model]\ndefault = \"file\"\n");
        let env: HashMap<&str, &str> = [
            ("OLLAMA_HOST", "env-host"),
            ("MURMUR_MODEL", "env-model"),
            ("OLLAMA_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let config = load_config_with_env(Some(file.path().to_path_buf()), |k| {
            env.get(k).map(|v| (*v).to_string())
        })
        .unwrap();

        assert_eq!(config.server.host, "env-host");
        assert_eq!(config.default_model.as_deref(), Some("env-model"));
        // Invalid value ignored, file value kept
        assert_eq!(config.server.port, 1);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let mut config = load_config_with_env(None, |k| {
            (k == "MURMUR_MODEL").then(|| "env-model".to_string())
        })
        .unwrap();

        ConfigOverrides::new()
            .with_default_model("cli-model".into())
            .with_port(9999)
            .without_persistence()
            .apply(&mut config);

        assert_eq!(config.default_model.as_deref(), Some("cli-model"));
        assert_eq!(config.server.port, 9999);
        assert!(!config.storage.persist);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_config_overrides_empty_no_change() {
        let mut config = MurmurConfig::default();
        ConfigOverrides::new().apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
        assert_eq!(config.server, ServerConfig::default());
    }

    // =========================================================================
    // Validation and Display
    // =========================================================================

    #[test]
    fn test_validation() {
        let mut config = MurmurConfig::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = MurmurConfig::default();
        config.render.batch_chars = 0;
        assert!(config.validate().is_err());

        let mut config = MurmurConfig::default();
        config.render.min_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::Env.to_string(), "environment");
        assert_eq!(ConfigSource::File.to_string(), "config file");
        assert_eq!(ConfigSource::Default.to_string(), "default");
    }

    #[test]
    fn test_expand_home() {
        let plain = PathBuf::from("/var/lib/murmur");
        assert_eq!(expand_home(&plain), plain);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(&PathBuf::from("~/chats")), home.join("chats"));
        }
    }
}
