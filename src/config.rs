//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, via [`Config::minimal`]) is a valid configuration. Secrets are never
//! read from the file: the answer provider's API key comes from the
//! environment variable named by `answer.api_key_env`.
//!
//! ```toml
//! [corpus]
//! chunks_dir = "./data/chunks"
//!
//! [chunking]
//! chunk_size = 2500
//! overlap = 300
//!
//! [index]
//! path = "./data/index.json"
//! max_features = 40000
//! demo_fallback = false
//!
//! [retrieval]
//! top_k = 3
//! min_query_chars = 2
//!
//! [answer]
//! provider = "extractive"   # or "openai"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use textbook_rag_core::chunk::validate_params;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory holding `chunk_NNN.txt` files.
    #[serde(default = "default_chunks_dir")]
    pub chunks_dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            chunks_dir: default_chunks_dir(),
        }
    }
}

fn default_chunks_dir() -> PathBuf {
    PathBuf::from("./data/chunks")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    textbook_rag_core::chunk::DEFAULT_CHUNK_SIZE
}
fn default_overlap() -> usize {
    textbook_rag_core::chunk::DEFAULT_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Location of the JSON index artifact.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Serve the built-in demo corpus when the artifact cannot be loaded.
    #[serde(default)]
    pub demo_fallback: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            max_features: default_max_features(),
            demo_fallback: false,
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.json")
}
fn default_max_features() -> usize {
    textbook_rag_core::index::DEFAULT_MAX_FEATURES
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Questions shorter than this (after trimming) are rejected.
    #[serde(default = "default_min_query_chars")]
    pub min_query_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_query_chars: default_min_query_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_min_query_chars() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// `extractive` (no network) or `openai`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider() -> String {
    "extractive".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_tokens() -> u32 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// All defaults; used when no configuration file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        validate_params(self.chunking.chunk_size, self.chunking.overlap)
            .context("invalid [chunking] section")?;

        if self.index.max_features < 1 {
            bail!("index.max_features must be >= 1");
        }
        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.retrieval.min_query_chars < 1 {
            bail!("retrieval.min_query_chars must be >= 1");
        }

        match self.answer.provider.as_str() {
            "extractive" | "openai" => {}
            other => bail!(
                "Unknown answer provider: '{}'. Must be extractive or openai.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Resolve the configuration for a CLI run.
///
/// An explicitly passed path must exist. Without one, `default_path` is used
/// if present and [`Config::minimal`] otherwise.
pub fn resolve_config(explicit: Option<&Path>, default_path: &Path) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path),
        None if default_path.exists() => load_config(default_path),
        None => {
            tracing::debug!(
                "no config at {}, using defaults",
                default_path.display()
            );
            Ok(Config::minimal())
        }
    }
}
