//! Question → top-k chunks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use docsage_core::{with_timeout, Capability, Result, RetrievalConfig, RetrievalResult};
use docsage_infer::Embedder;
use docsage_store::SharedIndex;

use crate::strategy::{strategy_for, RetrievalStrategy};

/// Anything that can turn a question into ranked chunks.
#[async_trait]
pub trait Retrieve: Send + Sync {
    async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult>;
}

/// Embeds the question and runs the configured strategy over the current
/// index snapshot.
pub struct Retriever {
    index: SharedIndex,
    embedder: Arc<dyn Embedder>,
    strategy: Box<dyn RetrievalStrategy>,
    embed_timeout: Duration,
}

impl Retriever {
    pub fn new(
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        strategy: Box<dyn RetrievalStrategy>,
        embed_timeout: Duration,
    ) -> Self {
        Self {
            index,
            embedder,
            strategy,
            embed_timeout,
        }
    }

    pub fn from_config(
        index: SharedIndex,
        embedder: Arc<dyn Embedder>,
        config: &RetrievalConfig,
        embed_timeout: Duration,
    ) -> Self {
        Self::new(index, embedder, strategy_for(config), embed_timeout)
    }
}

#[async_trait]
impl Retrieve for Retriever {
    async fn retrieve(&self, question: &str, k: usize) -> Result<RetrievalResult> {
        let index = self.index.snapshot();
        if k == 0 || index.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let query = with_timeout(
            Capability::Embedding,
            self.embed_timeout,
            self.embedder.embed(question),
        )
        .await?;
        let items = self.strategy.select(&index, &query, k)?;

        debug!(
            strategy = %self.strategy.kind(),
            k,
            returned = items.len(),
            best = items.first().map(|i| i.score),
            "Retrieved chunks"
        );
        Ok(RetrievalResult::new(items))
    }
}
