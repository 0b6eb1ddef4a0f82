//! Request and response types for answer generation.

use serde::{Deserialize, Serialize};

use docsage_core::GenerationConfig;

use crate::prompt::Prompt;

/// A single chat message in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// One call to the generation capability.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub max_tokens: usize,
    pub temperature: f32,
    pub repetition_penalty: f32,
}

impl GenerationRequest {
    pub fn new(prompt: Prompt, config: &GenerationConfig) -> Self {
        Self {
            prompt,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            repetition_penalty: config.repetition_penalty,
        }
    }
}

/// A single streamed token or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Token(String),
    Done { tokens_used: usize },
    Error(String),
}

/// What a synthesizer produced for one question, before sources are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub text: String,
    /// Within [0, 1].
    pub confidence: f32,
    /// The text is a fixed message rather than a synthesized answer.
    pub used_fallback: bool,
}
