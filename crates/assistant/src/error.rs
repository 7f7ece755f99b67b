#![forbid(unsafe_code)]

use tokenize::TokenizeError;

use crate::config::ConfigError;

/// Errors raised while loading the model or producing a reply.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// invalid environment configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// model files could not be fetched from the hub
    #[error("model hub error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),
    /// tensor or model failure inside candle
    #[error("inference error: {0}")]
    Candle(#[from] candle_core::Error),
    /// tokenizer failure
    #[error(transparent)]
    Tokenize(#[from] TokenizeError),
    /// filesystem failure reading model files
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// malformed model config or weight index
    #[error("invalid model metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    /// prompt leaves no room for a reply inside the model context
    #[error("prompt has {prompt_tokens} tokens but the model context holds {limit}")]
    ContextOverflow {
        /// tokens in the encoded prompt
        prompt_tokens: usize,
        /// model context length
        limit: usize,
    },
}
