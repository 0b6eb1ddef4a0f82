//! DocSage Core: shared data model, error taxonomy, configuration, capability timeouts.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod types;

pub use capabilities::{with_timeout, Capability};
pub use config::{
    AppConfig, ChunkingConfig, DataPaths, EmbeddingConfig, EmbeddingProviderKind, GenerationConfig,
    LlmConfig, LlmProvider, RetrievalConfig, RetrievalStrategyKind, ServiceMode,
};
pub use error::{Error, ErrorKind, Result};
pub use types::*;
