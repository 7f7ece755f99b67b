#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
#![deny(missing_docs, unused_must_use)]

//! Support assistant: a thin chat layer over a fine-tuned causal LM.
//!
//! A request is handled in one straight line: normalize the history the UI
//! sent, build the `### Role:` prompt, let the model continue it, and cut the
//! assistant reply out of the decoded text. The model and tokenizer are loaded
//! once into a [`ChatService`] that callers own and share by reference.
//!
//! Layout (important files):
//! - `config.rs`: environment configuration (`HF_MODEL_ID` and friends)
//! - `engine.rs`: hub download, Llama loading and the sampling loop
//! - `service.rs`: `Generator` seam and the request/response cycle
//! - `bin/chat.rs`: terminal REPL over the same service

/// Environment configuration.
pub mod config;
/// Model loading and token generation.
pub mod engine;
/// Error type shared by loading and generation.
pub mod error;
/// Logging setup for the binaries.
pub mod logging;
/// Request/response cycle over a `Generator`.
pub mod service;

pub use config::{Config, ConfigError, DevicePreference};
pub use engine::LlamaEngine;
pub use error::AssistantError;
pub use prompt::{PromptTemplate, Turn};
pub use service::{ChatService, Generator};

/// Load the configured model and wrap it in a ready-to-use service.
///
/// Failure here is meant to stop the process before it starts serving.
pub fn load_service(config: &Config) -> Result<ChatService<LlamaEngine>, AssistantError> {
    let engine = LlamaEngine::load(config)?;
    Ok(ChatService::new(engine, config.template()))
}
