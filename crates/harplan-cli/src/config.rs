//! Configuration file management for harplan.
//!
//! Provides a TOML-based config file at `~/.config/harplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use harplan_core::batch::BatchConfig;
use harplan_core::provider::ProviderConfig;

pub const ENV_ENDPOINT: &str = "HARPLAN_ENDPOINT";
pub const ENV_API_KEY: &str = "HARPLAN_API_KEY";
pub const ENV_API_VERSION: &str = "HARPLAN_API_VERSION";
pub const ENV_MODEL: &str = "HARPLAN_MODEL";
pub const ENV_TOKEN_SIZE: &str = "HARPLAN_TOKEN_SIZE";
pub const ENV_BATCH_SIZE: &str = "HARPLAN_BATCH_SIZE";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub generation: GenerationSection,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    /// Base URL of the OpenAI-compatible API.
    pub endpoint: String,
    pub api_key: String,
    /// Azure `api-version`; empty for plain OpenAI.
    pub api_version: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderSection {
    fn default() -> Self {
        let defaults = ProviderConfig::default();
        Self {
            endpoint: defaults.endpoint,
            api_key: String::new(),
            api_version: String::new(),
            model: defaults.model,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSection {
    /// Output token budget per request.
    pub token_size: u32,
    /// Records per batch for models without a token budget.
    pub batch_size: usize,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            token_size: ProviderConfig::default().token_size,
            batch_size: BatchConfig::default().batch_size,
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the harplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/harplan` or `~/.config/harplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("harplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("harplan")
}

/// Return the path to the harplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Like [`load_config`], but a missing file is `None` rather than an error.
fn load_config_if_present() -> Result<Option<ConfigFile>> {
    if config_path().exists() {
        load_config().map(Some)
    } else {
        Ok(None)
    }
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // Owner read/write only.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// `sk-abc...wxyz` style rendering of a secret for terminal output.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Per-invocation overrides from command-line flags.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_version: Option<String>,
    pub token_size: Option<u32>,
    pub batch_size: Option<usize>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct HarplanConfig {
    pub provider: ProviderConfig,
    pub batch: BatchConfig,
}

impl HarplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// The API key has no CLI flag: `HARPLAN_API_KEY` > `provider.api_key`.
    /// A missing key is not an error here; the provider reports it on first
    /// use.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config_if_present()?.unwrap_or_default();
        Self::resolve_with(cli, file)
    }

    fn resolve_with(cli: &CliOverrides, file: ConfigFile) -> Result<Self> {
        let endpoint = cli
            .endpoint
            .clone()
            .or_else(|| env_var(ENV_ENDPOINT))
            .unwrap_or(file.provider.endpoint);
        let model = cli
            .model
            .clone()
            .or_else(|| env_var(ENV_MODEL))
            .unwrap_or(file.provider.model);
        let api_version = cli
            .api_version
            .clone()
            .or_else(|| env_var(ENV_API_VERSION))
            .or(Some(file.provider.api_version))
            .filter(|v| !v.trim().is_empty());
        let api_key = env_var(ENV_API_KEY).unwrap_or(file.provider.api_key);

        let token_size = match cli.token_size {
            Some(size) => size,
            None => env_parsed(ENV_TOKEN_SIZE)?.unwrap_or(file.generation.token_size),
        };
        let batch_size = match cli.batch_size {
            Some(size) => size,
            None => env_parsed(ENV_BATCH_SIZE)?.unwrap_or(file.generation.batch_size),
        };

        let provider = ProviderConfig {
            endpoint,
            api_key,
            api_version,
            model,
            token_size,
            timeout_secs: file.provider.timeout_secs,
        };
        let batch = BatchConfig {
            batch_size,
            token_size: token_size as usize,
            ..BatchConfig::default()
        };
        Ok(Self { provider, batch })
    }
}

/// A non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(name)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .with_context(|| format!("{name} must be a positive integer, got {v:?}"))
        })
        .transpose()
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
