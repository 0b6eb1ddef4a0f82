//! DocSage Infer: embedding providers and the query embedding cache.
//!
//! Provides the `Embedder` trait the index builder and retriever consume.
//! `HashEmbedder` needs no model and is always available; `HttpEmbedder`
//! calls an OpenAI-compatible endpoint; `OnnxEmbedder` (feature `onnx`)
//! runs a local SentenceTransformers model.

pub mod cache;
pub mod embedder;
pub mod http_embedder;
pub mod onnx_embedder;

pub use cache::{CachedEmbedder, QueryCache};
pub use embedder::{l2_normalize, Embedder, HashEmbedder};
pub use http_embedder::HttpEmbedder;

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::sync::Arc;

use docsage_core::{EmbeddingConfig, EmbeddingProviderKind, Result};

/// Create the embedder selected by configuration.
///
/// Unlike a search-only fallback, an index must be built and queried with the
/// same embedder, so an unavailable provider is an error rather than a downgrade.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProviderKind::Hash => {
            tracing::info!("Using hash embedder (dim={})", config.dimension);
            Ok(Arc::new(HashEmbedder::new(config.dimension)))
        }
        EmbeddingProviderKind::Http => {
            let embedder = HttpEmbedder::from_config(config)?;
            tracing::info!("Using HTTP embedder (model={})", config.model);
            Ok(Arc::new(embedder))
        }
        EmbeddingProviderKind::Onnx => create_onnx(config),
    }
}

#[cfg(feature = "onnx")]
fn create_onnx(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let embedder = OnnxEmbedder::load(&config.model_dir, config.dimension)?;
    tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "onnx"))]
fn create_onnx(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    Err(docsage_core::Error::Config(format!(
        "ONNX embedder requested (model_dir={}) but the `onnx` feature is disabled",
        config.model_dir.display()
    )))
}
