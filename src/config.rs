use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the askdocs server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for document vectors.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding backend used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Completion backend used for answer generation.
    pub completion_provider: CompletionProvider,
    /// Base URL for the OpenAI-compatible provider endpoints.
    pub openai_base_url: String,
    /// API key for the OpenAI-compatible provider, when one is configured.
    pub openai_api_key: Option<String>,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Chat model identifier used for answer generation.
    pub chat_model: String,
    /// Token budget for one chunk of extracted text.
    pub chunk_max_tokens: usize,
    /// Token overlap between adjacent chunks.
    pub chunk_overlap_tokens: usize,
    /// Number of chunks embedded per provider call.
    pub embed_batch_size: usize,
    /// Seconds after which an in-flight document is considered stuck.
    pub stuck_threshold_secs: u64,
    /// Maximum accepted upload size per file, in bytes.
    pub max_upload_bytes: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Local deterministic encoder, useful for development and tests.
    Deterministic,
}

/// Supported completion backends for answer generation.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProvider {
    /// Hosted OpenAI-compatible chat completions API.
    OpenAI,
    /// No generator configured; answers fall back to extractive composition.
    None,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| "askdocs".to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: parse_env_or("EMBEDDING_PROVIDER", EmbeddingProvider::OpenAI)?,
            completion_provider: parse_env_or("COMPLETION_PROVIDER", CompletionProvider::OpenAI)?,
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 1536)?,
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            chunk_max_tokens: parse_env_or("CHUNK_MAX_TOKENS", 1000)?,
            chunk_overlap_tokens: parse_env_or("CHUNK_OVERLAP_TOKENS", 100)?,
            embed_batch_size: parse_env_or("EMBED_BATCH_SIZE", 64)?,
            stuck_threshold_secs: parse_env_or("STUCK_THRESHOLD_SECS", 120)?,
            max_upload_bytes: parse_env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "deterministic" => Ok(Self::Deterministic),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for CompletionProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        completion_provider = ?config.completion_provider,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
