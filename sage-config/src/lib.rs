//! ABOUTME: Construction-time configuration for the RAG serving core
//! ABOUTME: Layers defaults, an optional TOML file, and environment overrides once at startup

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while assembling or validating a [`Config`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// Server bind configuration for the HTTP and gRPC surfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub grpc_host: String,
    pub grpc_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            grpc_host: "0.0.0.0".to_string(),
            grpc_port: 50051,
        }
    }
}

/// Filesystem locations for the vector store and the generative model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub vector_store_dir: PathBuf,
    pub model_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            vector_store_dir: PathBuf::from("./data/vector_store"),
            model_path: PathBuf::from("./models/model.gguf"),
        }
    }
}

/// Retrieval-and-generation tuning knobs.
///
/// `retrieval_floor`, `context_inclusion_floor`, and `low_confidence_floor`
/// are fixed by design (see SPEC_FULL.md open-questions resolution) and are
/// not configurable; `similarity_threshold` is the looser, user-facing knob
/// exposed on `/search/documents` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub max_retrieval_results: usize,
    pub similarity_threshold: f32,
    pub max_context_length: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_retrieval_results: 5,
            similarity_threshold: 0.7,
            max_context_length: 1500,
        }
    }
}

/// Response cache tuning.
///
/// `cache_ttl_seconds` is accepted for backward compatibility with the
/// original settings surface but is not enforced: the core implements LRU
/// eviction only (see SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enable_caching: bool,
    pub max_cache_size: usize,
    pub cache_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_caching: true,
            max_cache_size: 100,
            cache_ttl_seconds: 3600,
        }
    }
}

/// The single constructed configuration value for the whole process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub rag: RagConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from, in ascending precedence: built-in defaults,
    /// an optional TOML file, then `SAGE_`-prefixed environment variables
    /// (double-underscore separated, e.g. `SAGE_SERVER__PORT=9000`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file (when present) or the
    /// environment overrides fail to deserialize, and
    /// [`ConfigError::Invalid`] if the merged configuration fails
    /// [`Config::validate`].
    pub fn load(file_path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults)?,
        );

        if let Some(path) = file_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SAGE")
                .separator("__")
                .try_parsing(true),
        );

        let merged: Self = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }

    /// Validate invariants that the config crate's deserialization alone
    /// cannot enforce (ranges, non-zero capacities).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated
    /// constraint found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_cache_size == 0 {
            return Err(ConfigError::Invalid {
                message: "cache.max_cache_size must be greater than 0".to_string(),
            });
        }
        if self.rag.max_retrieval_results == 0 {
            return Err(ConfigError::Invalid {
                message: "rag.max_retrieval_results must be greater than 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(ConfigError::Invalid {
                message: "rag.similarity_threshold must be within 0.0..=1.0".to_string(),
            });
        }
        Ok(())
    }
}
