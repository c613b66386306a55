//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `LITREVIEW_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BACKEND_ATTEMPTS, DEFAULT_EMBEDDING_DIM, DEFAULT_LEXICAL_WEIGHT,
    DEFAULT_MAX_CONTEXT_CHARS, DEFAULT_MAX_PASSAGE_CHARS, DEFAULT_RERANK_CANDIDATES,
    DEFAULT_RETRIEVAL_ATTEMPTS, DEFAULT_SCHEMA_RETRIES, DEFAULT_SEMANTIC_WEIGHT,
    DEFAULT_SNAPSHOT_INTERVAL, DEFAULT_TEST_SAMPLE_SIZE, DEFAULT_TOP_K,
};

/// Default Qdrant URL used when `LITREVIEW_QDRANT_URL` is not set.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
/// Default collection holding the corpus chunks.
pub const DEFAULT_COLLECTION: &str = "document_chunks";
/// Default Ollama endpoint serving both embeddings and the judge model.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_LLM_MODEL: &str = "gpt-oss:120b";

/// Pipeline configuration loaded from environment variables.
///
/// Use [`ReviewConfig::from_env`] to read `LITREVIEW_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Directory of per-section fact tables. Default: `./stylized_facts`.
    pub csv_dir: PathBuf,

    /// Directory for checkpoint, per-fact assessments and run reports. Default: `./.review`.
    pub data_dir: PathBuf,

    /// Qdrant endpoint URL. Default: `http://localhost:6334`.
    pub qdrant_url: String,

    /// Qdrant collection name. Default: `document_chunks`.
    pub collection: String,

    /// Ollama endpoint. Default: `http://localhost:11434`.
    pub ollama_url: String,

    pub embedding_model: String,
    pub embedding_dim: usize,

    /// Judge model identifier as understood by `genai`. Default: `gpt-oss:120b`.
    pub llm_model: String,
    pub temperature: f64,
    pub top_p: f64,

    /// Passages handed to the judge. Default: `20`.
    pub top_k: usize,
    /// Candidates fetched from each search before fusion and reranking. Default: `100`.
    pub rerank_candidates: usize,
    pub use_hybrid: bool,
    pub use_rerank: bool,
    pub semantic_weight: f32,
    pub lexical_weight: f32,

    /// Path to the reranker model directory (BERT + tokenizer). Lexical stub when unset.
    pub reranker_path: Option<PathBuf>,

    pub max_context_chars: usize,
    pub max_passage_chars: usize,

    /// Timeout for a single store or embedding call.
    pub store_timeout: Duration,
    /// Timeout for a single model completion.
    pub model_timeout: Duration,

    pub retrieval_attempts: u32,
    pub backend_attempts: u32,
    pub schema_retries: u32,

    /// Facts reviewed by `--test`. Default: `12`.
    pub test_sample_size: usize,
    /// Checkpoint commits between snapshots. Default: `50`.
    pub snapshot_interval: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            csv_dir: PathBuf::from("./stylized_facts"),
            data_dir: PathBuf::from("./.review"),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            temperature: 0.1,
            top_p: 0.9,
            top_k: DEFAULT_TOP_K,
            rerank_candidates: DEFAULT_RERANK_CANDIDATES,
            use_hybrid: true,
            use_rerank: true,
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            reranker_path: None,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_passage_chars: DEFAULT_MAX_PASSAGE_CHARS,
            store_timeout: Duration::from_secs(30),
            model_timeout: Duration::from_secs(600),
            retrieval_attempts: DEFAULT_RETRIEVAL_ATTEMPTS,
            backend_attempts: DEFAULT_BACKEND_ATTEMPTS,
            schema_retries: DEFAULT_SCHEMA_RETRIES,
            test_sample_size: DEFAULT_TEST_SAMPLE_SIZE,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

impl ReviewConfig {
    const ENV_CSV_DIR: &'static str = "LITREVIEW_CSV_DIR";
    const ENV_DATA_DIR: &'static str = "LITREVIEW_DATA_DIR";
    const ENV_QDRANT_URL: &'static str = "LITREVIEW_QDRANT_URL";
    const ENV_COLLECTION: &'static str = "LITREVIEW_COLLECTION";
    const ENV_OLLAMA_URL: &'static str = "LITREVIEW_OLLAMA_URL";
    const ENV_EMBEDDING_MODEL: &'static str = "LITREVIEW_EMBEDDING_MODEL";
    const ENV_EMBEDDING_DIM: &'static str = "LITREVIEW_EMBEDDING_DIM";
    const ENV_LLM_MODEL: &'static str = "LITREVIEW_LLM_MODEL";
    const ENV_TEMPERATURE: &'static str = "LITREVIEW_TEMPERATURE";
    const ENV_TOP_P: &'static str = "LITREVIEW_TOP_P";
    const ENV_TOP_K: &'static str = "LITREVIEW_TOP_K";
    const ENV_RERANK_CANDIDATES: &'static str = "LITREVIEW_RERANK_CANDIDATES";
    const ENV_USE_HYBRID: &'static str = "LITREVIEW_USE_HYBRID";
    const ENV_USE_RERANK: &'static str = "LITREVIEW_USE_RERANK";
    const ENV_SEMANTIC_WEIGHT: &'static str = "LITREVIEW_SEMANTIC_WEIGHT";
    const ENV_LEXICAL_WEIGHT: &'static str = "LITREVIEW_LEXICAL_WEIGHT";
    const ENV_RERANKER_PATH: &'static str = "LITREVIEW_RERANKER_PATH";
    const ENV_MAX_CONTEXT_CHARS: &'static str = "LITREVIEW_MAX_CONTEXT_CHARS";
    const ENV_MAX_PASSAGE_CHARS: &'static str = "LITREVIEW_MAX_PASSAGE_CHARS";
    const ENV_STORE_TIMEOUT_SECS: &'static str = "LITREVIEW_STORE_TIMEOUT_SECS";
    const ENV_MODEL_TIMEOUT_SECS: &'static str = "LITREVIEW_MODEL_TIMEOUT_SECS";
    const ENV_RETRIEVAL_ATTEMPTS: &'static str = "LITREVIEW_RETRIEVAL_ATTEMPTS";
    const ENV_BACKEND_ATTEMPTS: &'static str = "LITREVIEW_BACKEND_ATTEMPTS";
    const ENV_SCHEMA_RETRIES: &'static str = "LITREVIEW_SCHEMA_RETRIES";
    const ENV_TEST_SAMPLE_SIZE: &'static str = "LITREVIEW_TEST_SAMPLE_SIZE";
    const ENV_SNAPSHOT_INTERVAL: &'static str = "LITREVIEW_SNAPSHOT_INTERVAL";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();

        Ok(Self {
            csv_dir: Self::parse_path_from_env(Self::ENV_CSV_DIR, d.csv_dir),
            data_dir: Self::parse_path_from_env(Self::ENV_DATA_DIR, d.data_dir),
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, d.qdrant_url),
            collection: Self::parse_string_from_env(Self::ENV_COLLECTION, d.collection),
            ollama_url: Self::parse_string_from_env(Self::ENV_OLLAMA_URL, d.ollama_url),
            embedding_model: Self::parse_string_from_env(
                Self::ENV_EMBEDDING_MODEL,
                d.embedding_model,
            ),
            embedding_dim: Self::parse_from_env(Self::ENV_EMBEDDING_DIM, d.embedding_dim)?,
            llm_model: Self::parse_string_from_env(Self::ENV_LLM_MODEL, d.llm_model),
            temperature: Self::parse_from_env(Self::ENV_TEMPERATURE, d.temperature)?,
            top_p: Self::parse_from_env(Self::ENV_TOP_P, d.top_p)?,
            top_k: Self::parse_from_env(Self::ENV_TOP_K, d.top_k)?,
            rerank_candidates: Self::parse_from_env(
                Self::ENV_RERANK_CANDIDATES,
                d.rerank_candidates,
            )?,
            use_hybrid: Self::parse_bool_from_env(Self::ENV_USE_HYBRID, d.use_hybrid)?,
            use_rerank: Self::parse_bool_from_env(Self::ENV_USE_RERANK, d.use_rerank)?,
            semantic_weight: Self::parse_from_env(Self::ENV_SEMANTIC_WEIGHT, d.semantic_weight)?,
            lexical_weight: Self::parse_from_env(Self::ENV_LEXICAL_WEIGHT, d.lexical_weight)?,
            reranker_path: Self::parse_optional_path_from_env(Self::ENV_RERANKER_PATH),
            max_context_chars: Self::parse_from_env(
                Self::ENV_MAX_CONTEXT_CHARS,
                d.max_context_chars,
            )?,
            max_passage_chars: Self::parse_from_env(
                Self::ENV_MAX_PASSAGE_CHARS,
                d.max_passage_chars,
            )?,
            store_timeout: Duration::from_secs(Self::parse_from_env(
                Self::ENV_STORE_TIMEOUT_SECS,
                d.store_timeout.as_secs(),
            )?),
            model_timeout: Duration::from_secs(Self::parse_from_env(
                Self::ENV_MODEL_TIMEOUT_SECS,
                d.model_timeout.as_secs(),
            )?),
            retrieval_attempts: Self::parse_from_env(
                Self::ENV_RETRIEVAL_ATTEMPTS,
                d.retrieval_attempts,
            )?,
            backend_attempts: Self::parse_from_env(
                Self::ENV_BACKEND_ATTEMPTS,
                d.backend_attempts,
            )?,
            schema_retries: Self::parse_from_env(Self::ENV_SCHEMA_RETRIES, d.schema_retries)?,
            test_sample_size: Self::parse_from_env(
                Self::ENV_TEST_SAMPLE_SIZE,
                d.test_sample_size,
            )?,
            snapshot_interval: Self::parse_from_env(
                Self::ENV_SNAPSHOT_INTERVAL,
                d.snapshot_interval,
            )?,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.csv_dir.exists() {
            return Err(ConfigError::PathNotFound {
                path: self.csv_dir.clone(),
            });
        }
        if !self.csv_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.csv_dir.clone(),
            });
        }

        if self.data_dir.exists() && !self.data_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.data_dir.clone(),
            });
        }

        if let Some(ref path) = self.reranker_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        Self::check_range("top_k", ">= 1", self.top_k, self.top_k >= 1)?;
        Self::check_range(
            "rerank_candidates",
            ">= top_k",
            self.rerank_candidates,
            self.rerank_candidates >= self.top_k,
        )?;
        Self::check_range(
            "embedding_dim",
            ">= 1",
            self.embedding_dim,
            self.embedding_dim >= 1,
        )?;
        Self::check_range(
            "temperature",
            "within 0.0..=2.0",
            self.temperature,
            (0.0..=2.0).contains(&self.temperature),
        )?;
        Self::check_range(
            "top_p",
            "within 0.0..=1.0",
            self.top_p,
            (0.0..=1.0).contains(&self.top_p),
        )?;
        Self::check_range(
            "semantic_weight",
            "non-negative",
            self.semantic_weight,
            self.semantic_weight >= 0.0,
        )?;
        Self::check_range(
            "lexical_weight",
            "non-negative",
            self.lexical_weight,
            self.lexical_weight >= 0.0,
        )?;
        if self.use_hybrid && self.semantic_weight + self.lexical_weight <= 0.0 {
            return Err(ConfigError::ZeroWeights);
        }
        Self::check_range(
            "max_passage_chars",
            "between 1 and max_context_chars",
            self.max_passage_chars,
            self.max_passage_chars >= 1 && self.max_passage_chars <= self.max_context_chars,
        )?;
        Self::check_range(
            "store_timeout",
            "non-zero",
            self.store_timeout.as_secs(),
            !self.store_timeout.is_zero(),
        )?;
        Self::check_range(
            "model_timeout",
            "non-zero",
            self.model_timeout.as_secs(),
            !self.model_timeout.is_zero(),
        )?;
        Self::check_range(
            "retrieval_attempts",
            ">= 1",
            self.retrieval_attempts,
            self.retrieval_attempts >= 1,
        )?;
        Self::check_range(
            "backend_attempts",
            ">= 1",
            self.backend_attempts,
            self.backend_attempts >= 1,
        )?;
        Self::check_range(
            "snapshot_interval",
            ">= 1",
            self.snapshot_interval,
            self.snapshot_interval >= 1,
        )?;

        Ok(())
    }

    /// Path of the checkpoint directory inside the data dir.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join("checkpoint")
    }

    /// Path of the per-fact assessment documents inside the data dir.
    pub fn assessments_dir(&self) -> PathBuf {
        self.data_dir.join("assessments")
    }

    /// Path of the end-of-run report inside the data dir.
    pub fn run_report_path(&self) -> PathBuf {
        self.data_dir.join("run_report.json")
    }

    fn check_range(
        name: &'static str,
        expected: &'static str,
        value: impl Display,
        ok: bool,
    ) -> Result<(), ConfigError> {
        if ok {
            Ok(())
        } else {
            Err(ConfigError::OutOfRange {
                name,
                expected,
                value: value.to_string(),
            })
        }
    }

    fn parse_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: var_name,
                    value: value.clone(),
                    reason: e.to_string(),
                }),
            Err(_) => Ok(default),
        }
    }

    fn parse_bool_from_env(var_name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match env::var(var_name) {
            Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    name: var_name,
                    value,
                    reason: "expected true or false".to_string(),
                }),
            },
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }
}
