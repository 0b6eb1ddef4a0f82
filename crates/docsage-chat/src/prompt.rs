//! Grounded prompt assembly.

use docsage_core::RetrievalResult;

use crate::types::ChatMessage;

/// System and user halves of a generation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Build a prompt that presents the retrieved chunks as numbered reference
/// passages and restricts the answer to them.
pub fn build_prompt(question: &str, retrieved: &RetrievalResult, language: &str) -> Prompt {
    let system = format!(
        "You are an assistant for internal company documents. \
         Answer the question using only the reference passages provided. \
         If the passages do not contain the answer, say that the information \
         is not in the internal documents and do not guess. \
         Answer in {language}, briefly and factually."
    );

    let mut user = String::from("Reference passages:\n");
    for (i, item) in retrieved.items.iter().enumerate() {
        let source = item.chunk.source().unwrap_or("unknown");
        user.push_str(&format!("\n[{}] (source: {})\n{}\n", i + 1, source, item.chunk.text.trim()));
    }
    user.push_str(&format!("\nQuestion: {}\nAnswer:", question.trim()));

    Prompt { system, user }
}
