//! Configuration management for Jarvis
//!
//! Provides persistent settings storage with schema versioning and migrations.
//! Configuration is stored in `~/.jarvis/config.json`; missing fields fall back
//! to their defaults and unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current config schema version
pub const CURRENT_VERSION: u32 = 2;

/// Upper bound for either turn timer
const MAX_DELAY_MS: u64 = 60_000;

/// Reply spoken when the responder fails
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Desculpe, estou tendo dificuldades para processar sua mensagem. Pode tentar novamente?";

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Turn timing and fallback settings
    pub turn: TurnConfig,
    /// Responder selection and endpoint settings
    pub responder: ResponderConfig,
    /// Logging and other general settings
    pub general: GeneralConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            turn: TurnConfig::default(),
            responder: ResponderConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Config {
    /// Check value ranges and cross-field requirements
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("turn.silence_delay_ms", self.turn.silence_delay_ms),
            ("turn.recovery_delay_ms", self.turn.recovery_delay_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be greater than 0",
                    field
                )));
            }
            if value > MAX_DELAY_MS {
                return Err(ConfigError::Invalid(format!(
                    "{} cannot exceed {} ms",
                    field, MAX_DELAY_MS
                )));
            }
        }

        if self.turn.fallback_reply.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "turn.fallback_reply cannot be empty".to_string(),
            ));
        }

        if self.responder.kind == ResponderKind::Chat
            && self.responder.endpoint_url.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "responder.endpoint_url is required for the chat responder".to_string(),
            ));
        }

        Ok(())
    }
}

/// Turn orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Silence after the last transcript fragment that ends the utterance
    pub silence_delay_ms: u64,
    /// How long to wait for playback to start before giving up on it
    pub recovery_delay_ms: u64,
    /// Reply spoken and logged when the responder fails
    pub fallback_reply: String,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_delay_ms: 1500,
            recovery_delay_ms: 3000,
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }
}

impl TurnConfig {
    pub fn silence_delay(&self) -> Duration {
        Duration::from_millis(self.silence_delay_ms)
    }

    pub fn recovery_delay(&self) -> Duration {
        Duration::from_millis(self.recovery_delay_ms)
    }
}

/// Responder implementation options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponderKind {
    /// Remote chat endpoint over HTTP
    #[default]
    Chat,
    /// Offline rule table
    Rules,
}

/// Responder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub kind: ResponderKind,
    /// Chat endpoint URL
    pub endpoint_url: String,
    /// Bearer token for the chat endpoint
    pub auth_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            kind: ResponderKind::default(),
            endpoint_url: "http://localhost:54321/functions/v1/jarvis-chat".to_string(),
            auth_token: None,
            timeout_secs: 30,
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Also write logs to `~/.jarvis/logs/jarvis-debug.log`
    pub log_to_file: bool,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_to_file: true,
            log_filter: "info".to_string(),
        }
    }
}

/// Get the path to the config directory (~/.jarvis)
pub fn get_config_dir() -> PathBuf {
    home_dir_or_fallback().join(".jarvis")
}

/// Get the path to the config file (~/.jarvis/config.json)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from the default location
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from `path`, using defaults if the file does not exist
///
/// Older schema versions are migrated and written back.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!("Config file not found at {:?}, using defaults", path);
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;

    if migrated.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            migrated.version
        );
        save_config_to(&migrated, path)?;
    }

    migrated.validate()?;
    Ok(migrated)
}

/// Save configuration to the default location
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to `path`, creating parent directories as needed
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }

    let mut config = config.clone();
    config.version = CURRENT_VERSION;
    let contents = serde_json::to_string_pretty(&config)?;
    fs::write(path, contents)?;

    tracing::info!("Config saved to {:?}", path);
    Ok(())
}

/// Reset the configuration at `path` to defaults and persist it
pub fn reset_config_at(path: &Path) -> Result<Config, ConfigError> {
    let default_config = Config::default();
    save_config_to(&default_config, path)?;
    tracing::info!("Configuration reset to defaults");
    Ok(default_config)
}

/// Migrate configuration from older schema versions
fn migrate_config(mut config: Config) -> Result<Config, ConfigError> {
    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }
    if config.version > CURRENT_VERSION {
        return Err(ConfigError::UnknownVersion(config.version));
    }
    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, ConfigError> {
    match config.version {
        // Version 0 -> 1: initial schema
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        // Version 1 -> 2: the silence delay was briefly shipped at 1000ms
        1 => {
            let mut migrated = config;
            if migrated.turn.silence_delay_ms == 1000 {
                migrated.turn.silence_delay_ms = TurnConfig::default().silence_delay_ms;
            }
            migrated.version = 2;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}
