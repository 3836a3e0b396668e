use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TariffError};

/// Top-level configuration for TariffBot.
///
/// Loaded from `~/.tariffbot/config.toml` by default. Every section is
/// optional in the file; missing sections and fields take their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TariffConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl TariffConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TariffConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TariffError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite catalog and reference documents.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.tariffbot/data".to_string(),
            log_level: "info".to_string(),
            port: 8501,
        }
    }
}

impl GeneralConfig {
    /// Data directory with a leading `~/` expanded to the home directory.
    pub fn data_path(&self) -> PathBuf {
        expand_home(&self.data_dir)
    }
}

/// Tariff catalog settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file name, relative to the data directory.
    pub file_name: String,
    /// Maximum number of records returned by a structured lookup.
    pub search_limit: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file_name: "hts_data.db".to_string(),
            search_limit: 3,
        }
    }
}

/// Reference document retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Pre-extracted text of the reference document, relative to the data
    /// directory unless absolute.
    pub document_path: String,
    /// Target passage length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive passages.
    pub chunk_overlap: usize,
    /// Number of passages handed to the generator.
    pub top_k: usize,
    /// Dimensionality of the local hashing embedder.
    pub embedding_dim: usize,
    /// Remote embedding model, used only in LLM-backed mode.
    pub embedding_model: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            document_path: "general_notes.txt".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            embedding_dim: 384,
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Hosted language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Master switch. When false the orchestrator runs in fallback-only mode
    /// even if a credential is present.
    pub enabled: bool,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Chat completion model.
    pub model: String,
    /// Environment variable holding the API credential.
    pub api_key_env: String,
    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,
    /// Upper bound on the passage context sent with a request.
    pub max_context_chars: usize,
    /// Generated answers shorter than this are treated as unusable.
    pub min_answer_chars: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
            max_context_chars: 6000,
            min_answer_chars: 20,
            temperature: 0.1,
            max_tokens: 800,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Requests per second allowed on protected routes.
    pub rate_limit_per_sec: u64,
    /// Bearer token file, relative to the data directory. Generated on first
    /// start when missing.
    pub token_file: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 50,
            token_file: "api_token".to_string(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
