//! Gantry configuration types and loading

use eyre::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Main Gantry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Permission policy overrides: permission class -> allow|deny|ask
    pub permissions: HashMap<String, String>,

    /// Risk judge configuration
    pub guard: GuardConfig,

    /// Run loop configuration
    pub engine: EngineConfig,

    /// When true, `ask` permissions require approval before a step runs
    #[serde(rename = "safe-mode")]
    pub safe_mode: bool,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `.gantry.yml` in the working directory, then
    /// `~/.config/gantry/gantry.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".gantry.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("gantry").join("gantry.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate configuration for commands that need the LLM
    ///
    /// Call early to fail fast with a clear error message.
    pub fn validate_llm(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Resolve the data directory where tasks and logs live
    pub fn data_dir(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("gantry")
        })
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; defaults to the platform-local data dir
    pub path: Option<PathBuf>,
}

/// Risk judge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Consult the LLM risk judge for high-risk skills
    pub enabled: bool,

    /// Treat judge unavailability as approval (with a logged warning)
    /// instead of rejection
    #[serde(rename = "fail-open")]
    pub fail_open: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_open: true,
        }
    }
}

/// Run loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sleep between polls when no step is runnable, in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Sleep between scheduling iterations, in milliseconds
    #[serde(rename = "step-delay-ms")]
    pub step_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            step_delay_ms: 500,
        }
    }
}
