//! Configuration and data directory management.
//!
//! Every option has a default, so a missing config file is not an error.
//! Values are resolved in order: defaults → JSON file → `DOCSAGE_*` env vars.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Locations of the document corpus and the persisted index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataPaths {
    /// Directory scanned for raw documents (`data/`).
    pub data_dir: PathBuf,
    /// Directory holding the persisted vector index (`vectorstore/`).
    pub index_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            index_dir: PathBuf::from("vectorstore"),
        }
    }
}

/// Chunk length and overlap, both measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalStrategyKind {
    /// Top-k by cosine similarity.
    Similarity,
    /// Maximal marginal relevance over an oversampled pool.
    Mmr,
}

impl std::fmt::Display for RetrievalStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Similarity => write!(f, "similarity"),
            Self::Mmr => write!(f, "mmr"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub strategy: RetrievalStrategyKind,
    pub top_k: usize,
    /// Candidate pool size for MMR; raised to `top_k` when smaller.
    pub fetch_k: usize,
    /// λ in `λ·relevance − (1−λ)·redundancy`.
    pub diversity_weight: f32,
    /// Retrieved chunks scoring below this are not shown to the generator.
    pub min_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: RetrievalStrategyKind::Similarity,
            top_k: 4,
            fetch_k: 20,
            diversity_weight: 0.5,
            min_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: usize,
    pub repetition_penalty: f32,
    /// Answers shorter than this (after trimming) are replaced by the fallback message.
    pub min_answer_chars: usize,
    /// Language the generator is asked to answer in.
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 256,
            repetition_penalty: 1.1,
            min_answer_chars: 5,
            language: "Vietnamese".into(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature hashing, no model required.
    Hash,
    /// OpenAI-compatible `/v1/embeddings` endpoint.
    Http,
    /// Local SentenceTransformers ONNX model.
    Onnx,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    /// Maximum number of embedding batches in flight during ingestion.
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            model: "intfloat/multilingual-e5-small".into(),
            dimension: 384,
            batch_size: 32,
            concurrency: 4,
            timeout_secs: 30,
            base_url: None,
            api_key: None,
            model_dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Groq,
    /// Any OpenAI-compatible server (vLLM, llama.cpp, Ollama).
    Local,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAI => write!(f, "openai"),
            Self::Groq => write!(f, "groq"),
            Self::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Local,
            model: "Qwen/Qwen2.5-1.5B-Instruct".into(),
            base_url: None,
            api_key: None,
        }
    }
}

impl LlmConfig {
    /// Chat-completions endpoint for the configured provider.
    pub fn endpoint(&self) -> String {
        let base = match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAI) => "https://api.openai.com/v1".into(),
            (None, LlmProvider::Groq) => "https://api.groq.com/openai/v1".into(),
            (None, LlmProvider::Local) => "http://localhost:8080/v1".into(),
        };
        format!("{}/chat/completions", base)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Deterministic keyword-rule answers; no index or models needed.
    Mock,
    /// Real retrieval over the persisted index plus an external generator.
    Generative,
}

/// Top-level DocSage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub mode: ServiceMode,
    pub port: u16,
    pub paths: DataPaths,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::Mock,
            port: 8000,
            paths: DataPaths::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from a JSON file (if it exists), apply env overrides, validate.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let parsed: AppConfig = serde_json::from_str(&raw)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                info!("Loaded configuration from {}", path.display());
                parsed
            }
            Some(path) => {
                debug!("No config file at {}, using defaults", path.display());
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCSAGE_*` overrides from the given lookup.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(mode) = var("DOCSAGE_MODE") {
            self.mode = match mode.to_lowercase().as_str() {
                "mock" => ServiceMode::Mock,
                "generative" => ServiceMode::Generative,
                other => return Err(Error::Config(format!("unknown mode '{}'", other))),
            };
        }
        if let Some(port) = var("PORT") {
            self.port = parse_var("PORT", &port)?;
        }
        if let Some(dir) = var("DOCSAGE_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("DOCSAGE_INDEX_DIR") {
            self.paths.index_dir = PathBuf::from(dir);
        }
        if let Some(v) = var("DOCSAGE_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_var("DOCSAGE_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = var("DOCSAGE_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_var("DOCSAGE_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = var("DOCSAGE_TOP_K") {
            self.retrieval.top_k = parse_var("DOCSAGE_TOP_K", &v)?;
        }
        if let Some(v) = var("DOCSAGE_STRATEGY") {
            self.retrieval.strategy = match v.to_lowercase().as_str() {
                "similarity" => RetrievalStrategyKind::Similarity,
                "mmr" => RetrievalStrategyKind::Mmr,
                other => return Err(Error::Config(format!("unknown strategy '{}'", other))),
            };
        }
        if let Some(v) = var("DOCSAGE_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }

        // Env vars as fallback for API keys
        if self.llm.api_key.is_none() {
            self.llm.api_key = match self.llm.provider {
                LlmProvider::OpenAI => var("OPENAI_API_KEY"),
                LlmProvider::Groq => var("GROQ_API_KEY"),
                LlmProvider::Local => var("DOCSAGE_LLM_API_KEY"),
            };
        }
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = var("OPENAI_API_KEY");
        }
        Ok(())
    }

    /// Check that parameters are consistent.
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }

        let r = &self.retrieval;
        if r.top_k == 0 {
            return Err(Error::Config("top_k must be greater than zero".into()));
        }
        if r.fetch_k < r.top_k {
            return Err(Error::Config(format!(
                "fetch_k ({}) must be at least top_k ({})",
                r.fetch_k, r.top_k
            )));
        }
        if !(0.0..=1.0).contains(&r.diversity_weight) {
            return Err(Error::Config(format!(
                "diversity_weight ({}) must be within [0, 1]",
                r.diversity_weight
            )));
        }

        let g = &self.generation;
        if g.temperature < 0.0 {
            return Err(Error::Config("temperature must not be negative".into()));
        }
        if g.max_tokens == 0 {
            return Err(Error::Config("max_tokens must be greater than zero".into()));
        }

        let e = &self.embedding;
        if e.batch_size == 0 || e.concurrency == 0 {
            return Err(Error::Config(
                "embedding batch_size and concurrency must be greater than zero".into(),
            ));
        }
        if e.dimension == 0 {
            return Err(Error::Config("embedding dimension must be greater than zero".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has an invalid value '{}'", key, value)))
}
