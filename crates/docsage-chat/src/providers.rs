//! Generation over OpenAI-compatible chat-completions APIs.
//!
//! OpenAI, Groq and local servers (vLLM, llama.cpp, Ollama) share the same
//! SSE streaming format. Tokens are streamed and concatenated into the answer.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use docsage_core::{Capability, Error, LlmConfig, LlmProvider, Result};

use crate::types::{GenerationRequest, StreamChunk};

/// Boxed stream type for returning different stream implementations.
pub type BoxedStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// The generation capability: prompt in, answer text out.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct HttpGenerator {
    client: Client,
    endpoint: String,
    provider: LlmProvider,
    model: String,
    api_key: Option<String>,
}

impl HttpGenerator {
    /// Hosted providers need an API key; local servers may run without one.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());
        if api_key.is_none() && config.provider != LlmProvider::Local {
            return Err(Error::Config(format!(
                "no API key configured for LLM provider '{}'",
                config.provider
            )));
        }

        Ok(Self {
            client: Client::new(),
            endpoint: config.endpoint(),
            provider: config.provider,
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request body for one streamed completion.
    ///
    /// Hosted APIs only understand `frequency_penalty` (additive, 0 = off);
    /// local servers take the multiplicative `repetition_penalty` directly.
    pub fn request_body(&self, request: &GenerationRequest) -> Value {
        let messages: Vec<Value> = request
            .prompt
            .messages()
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        match self.provider {
            LlmProvider::Local => {
                body["repetition_penalty"] = json!(request.repetition_penalty);
            }
            LlmProvider::OpenAI | LlmProvider::Groq => {
                let penalty = (request.repetition_penalty - 1.0).clamp(0.0, 2.0);
                body["frequency_penalty"] = json!(penalty);
            }
        }
        body
    }

    /// Stream tokens for a request.
    pub fn stream(&self, request: &GenerationRequest) -> BoxedStream {
        Box::pin(stream_openai_compat(
            self.client.clone(),
            self.endpoint.clone(),
            self.request_body(request),
            self.api_key.clone(),
        ))
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut stream = self.stream(request);
        let mut answer = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                StreamChunk::Token(token) => answer.push_str(&token),
                StreamChunk::Done { tokens_used } => {
                    debug!(tokens_used, model = %self.model, "Generation finished");
                    break;
                }
                StreamChunk::Error(message) => {
                    warn!(provider = %self.provider, "Generation failed: {}", message);
                    return Err(Error::capability(Capability::Generation, message));
                }
            }
        }
        Ok(answer)
    }
}

/// What one SSE line carries.
#[derive(Debug, PartialEq)]
enum SseLine {
    Token(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(parsed) => match parsed["choices"][0]["delta"]["content"].as_str() {
            Some(content) if !content.is_empty() => SseLine::Token(content.to_string()),
            _ => SseLine::Skip,
        },
        Err(_) => SseLine::Skip,
    }
}

fn stream_openai_compat(
    client: Client,
    url: String,
    body: Value,
    api_key: Option<String>,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        debug!("Streaming from {} with model {}", url, body["model"]);

        let mut builder = client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body);
        if let Some(key) = &api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                yield StreamChunk::Error(format!("Request failed: {}", e));
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            yield StreamChunk::Error(format!("API error {}: {}", status, body));
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut token_count = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };

            buffer.extend_from_slice(&bytes);

            // Decode complete lines only: a multi-byte character may straddle chunks.
            while let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=line_end).collect();
                let line = String::from_utf8_lossy(&raw).trim().to_string();

                match parse_sse_line(&line) {
                    SseLine::Token(token) => {
                        token_count += 1;
                        yield StreamChunk::Token(token);
                    }
                    SseLine::Done => {
                        yield StreamChunk::Done { tokens_used: token_count };
                        return;
                    }
                    SseLine::Skip => {}
                }
            }
        }

        yield StreamChunk::Done { tokens_used: token_count };
    }
}
