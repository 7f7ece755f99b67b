#![forbid(unsafe_code)]

use std::sync::Arc;

use prompt::{extract_reply, PromptTemplate, Turn};
use serde_json::Value;

use crate::error::AssistantError;

/// A causal language model seen as "prompt in, decoded text out".
///
/// The returned text is the whole decoded sequence (prompt and continuation)
/// with special tokens removed.
pub trait Generator {
    /// Continue `prompt` and return the decoded sequence.
    fn generate(&self, prompt: &str) -> Result<String, AssistantError>;
}

impl<G: Generator + ?Sized> Generator for Arc<G> {
    fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        (**self).generate(prompt)
    }
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        (**self).generate(prompt)
    }
}

/// One request/response cycle of the support chat: history in, reply out.
pub struct ChatService<G> {
    generator: G,
    template: PromptTemplate,
}

impl<G: Generator> ChatService<G> {
    /// Service over `generator` rendering prompts with `template`.
    pub fn new(generator: G, template: PromptTemplate) -> Self {
        Self { generator, template }
    }

    /// Reply to `message` given history in any of the shapes `history::normalize` accepts.
    ///
    /// Malformed history never fails the call; generation errors do.
    pub fn respond(&self, message: &str, history: Option<&Value>) -> Result<String, AssistantError> {
        let turns = ::history::normalize(history);
        self.respond_turns(message, &turns)
    }

    /// Reply to `message` after already normalized `turns`.
    pub fn respond_turns(&self, message: &str, turns: &[Turn]) -> Result<String, AssistantError> {
        let prompt = self.template.build(message, turns);
        tracing::debug!(turns = turns.len(), prompt_bytes = prompt.len(), "prompt built");
        let decoded = self.generator.generate(&prompt)?;
        Ok(extract_reply(&decoded).to_string())
    }

    /// Template used for prompts.
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Underlying generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }
}
