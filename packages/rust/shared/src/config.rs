//! Application configuration for mdchunk.
//!
//! User config lives at `~/.mdchunk/mdchunk.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MdChunkError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mdchunk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mdchunk";

// ---------------------------------------------------------------------------
// Config structs (matching mdchunk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chunking defaults.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// OpenRouter settings for question generation.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

/// `[chunking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Character budget per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum number of neighbour merges per chunk.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Ask the language model for questions each chunk answers.
    #[serde(default)]
    pub use_lm: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            use_lm: false,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    2
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for question generation.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Longest chunk text sent to the model before truncation.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            max_prompt_chars: default_max_prompt_chars(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "openai/gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_max_prompt_chars() -> usize {
    12_000
}

// ---------------------------------------------------------------------------
// Chunk options (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime chunking options: merged from config file + CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Character budget per chunk. Must be positive.
    pub chunk_size: usize,
    /// Maximum number of neighbour merges per chunk.
    pub chunk_overlap: usize,
    /// Whether to augment chunks with model-generated questions.
    pub use_lm: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self::from(&ChunkingConfig::default())
    }
}

impl From<&ChunkingConfig> for ChunkOptions {
    fn from(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            use_lm: config.use_lm,
        }
    }
}

impl From<&AppConfig> for ChunkOptions {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.chunking)
    }
}

impl ChunkOptions {
    /// Reject options no walk can honour.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(MdChunkError::validation("chunk_size must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mdchunk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MdChunkError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mdchunk/mdchunk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MdChunkError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        MdChunkError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MdChunkError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MdChunkError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MdChunkError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check values that deserialize fine but cannot be used.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    ChunkOptions::from(config)
        .validate()
        .map_err(|e| MdChunkError::config(e.to_string()))?;

    Url::parse(&config.openrouter.base_url).map_err(|e| {
        MdChunkError::config(format!(
            "invalid openrouter.base_url '{}': {e}",
            config.openrouter.base_url
        ))
    })?;

    Ok(())
}

/// Check that the OpenRouter API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(MdChunkError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("chunk_size = 500"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.chunking.chunk_overlap, 2);
        assert!(!parsed.chunking.use_lm);
        assert_eq!(parsed.openrouter.api_key_env, "OPENROUTER_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[chunking]
chunk_size = 800
use_lm = true
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let opts = ChunkOptions::from(&config);
        assert_eq!(opts.chunk_size, 800);
        assert_eq!(opts.chunk_overlap, 2);
        assert!(opts.use_lm);
        assert_eq!(config.openrouter.max_prompt_chars, 12_000);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let opts = ChunkOptions {
            chunk_size: 0,
            chunk_overlap: 0,
            use_lm: false,
        };
        assert!(opts.validate().is_err());
        assert!(ChunkOptions::default().validate().is_ok());
    }

    #[test]
    fn invalid_base_url_rejected() {
        let mut config = AppConfig::default();
        config.openrouter.base_url = "not a url".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "MDCHUNK_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
