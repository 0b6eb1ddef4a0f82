//! Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
//!
//! Works with api.openai.com as well as local servers exposing the same
//! route (text-embeddings-inference, llama.cpp, vLLM).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use docsage_core::{Capability, EmbeddingConfig, Error, Result};

use crate::embedder::Embedder;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

impl HttpEmbedder {
    /// Build from configuration. Needs either a `base_url` (local server) or
    /// an `api_key` (hosted OpenAI).
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.clone().filter(|k| !k.is_empty());
        let base = match (&config.base_url, &api_key) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Some(_)) => OPENAI_BASE_URL.to_string(),
            (None, None) => {
                return Err(Error::Config(
                    "HTTP embedder needs embedding.base_url or an API key".into(),
                ))
            }
        };

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/embeddings", base),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Error::capability(Capability::Embedding, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.model, "embedding batch");

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "embedding request failed");
            Error::capability(Capability::Embedding, format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(%status, "embedding API error");
            return Err(Error::capability(
                Capability::Embedding,
                format!("API returned {status}: {detail}"),
            ));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            Error::capability(Capability::Embedding, format!("failed to parse response: {e}"))
        })?;

        let mut data = parsed.data;
        if data.len() != texts.len() {
            return Err(Error::capability(
                Capability::Embedding,
                format!("expected {} vectors, got {}", texts.len(), data.len()),
            ));
        }
        // Servers may answer out of order; `index` restores input order.
        data.sort_by_key(|d| d.index.unwrap_or(0));

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn id(&self) -> String {
        format!("http:{}", self.model)
    }
}
