#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
#![deny(missing_docs, unused_must_use)]

//! Text <-> token id conversion around a Hugging Face `tokenizer.json`.

use std::path::Path;

use tokenizers::Tokenizer;

/// Tokens tried, in order, when the model config does not name an end-of-sequence id.
pub const EOS_CANDIDATES: &[&str] = &["</s>", "<|endoftext|>", "<|eot_id|>"];

/// Error type for tokenizer operations
#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    /// tokenizer file could not be read or parsed
    #[error("failed to load tokenizer: {0}")]
    Load(String),
    /// text could not be encoded
    #[error("failed to encode text: {0}")]
    Encode(String),
    /// ids could not be decoded
    #[error("failed to decode tokens: {0}")]
    Decode(String),
    /// no end-of-sequence token could be resolved
    #[error("tokenizer has no end-of-sequence token")]
    MissingEos,
}

/// Tokenizer plus the special ids generation needs.
#[derive(Debug, Clone)]
pub struct TextTokenizer {
    inner: Tokenizer,
    eos_token_id: u32,
}

impl TextTokenizer {
    /// Load `tokenizer.json` from `path`.
    ///
    /// `eos_hint` is the end-of-sequence id from the model config, when it has one.
    pub fn from_file(path: impl AsRef<Path>, eos_hint: Option<u32>) -> Result<Self, TokenizeError> {
        let inner = Tokenizer::from_file(path).map_err(|e| TokenizeError::Load(e.to_string()))?;
        Self::new(inner, eos_hint)
    }

    /// Parse a `tokenizer.json` document held in memory.
    pub fn from_bytes(bytes: impl AsRef<[u8]>, eos_hint: Option<u32>) -> Result<Self, TokenizeError> {
        let inner = Tokenizer::from_bytes(bytes).map_err(|e| TokenizeError::Load(e.to_string()))?;
        Self::new(inner, eos_hint)
    }

    /// Wrap an already built tokenizer.
    pub fn new(inner: Tokenizer, eos_hint: Option<u32>) -> Result<Self, TokenizeError> {
        let eos_token_id = eos_hint
            .or_else(|| EOS_CANDIDATES.iter().find_map(|t| inner.token_to_id(t)))
            .ok_or(TokenizeError::MissingEos)?;
        tracing::debug!(eos_token_id, vocab = inner.get_vocab_size(true), "tokenizer ready");
        Ok(Self { inner, eos_token_id })
    }

    /// Encode `text`, adding the model's special tokens (e.g. BOS).
    pub fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizeError> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| TokenizeError::Encode(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Decode `ids` back to text, optionally dropping special tokens.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String, TokenizeError> {
        self.inner
            .decode(ids, skip_special_tokens)
            .map_err(|e| TokenizeError::Decode(e.to_string()))
    }

    /// End-of-sequence id; generation stops when it is sampled.
    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }

    /// Padding id. The fine-tuned models ship without one, so it is the EOS id.
    pub fn pad_token_id(&self) -> u32 {
        self.inner
            .get_padding()
            .map_or(self.eos_token_id, |padding| padding.pad_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": "</s>", "single_word": false, "lstrip": false,
             "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"</s>": 0, "[UNK]": 1, "hello": 2, "world": 3, "refund": 4},
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn resolves_eos_from_vocab() {
        let tok = TextTokenizer::from_bytes(FIXTURE, None).unwrap();
        assert_eq!(tok.eos_token_id(), 0);
        assert_eq!(tok.pad_token_id(), 0);
    }

    #[test]
    fn config_eos_wins() {
        let tok = TextTokenizer::from_bytes(FIXTURE, Some(4)).unwrap();
        assert_eq!(tok.eos_token_id(), 4);
        assert_eq!(tok.pad_token_id(), 4);
    }

    #[test]
    fn encode_and_decode_words() {
        let tok = TextTokenizer::from_bytes(FIXTURE, None).unwrap();
        let ids = tok.encode("hello world").unwrap();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(tok.decode(&[2, 0, 3], true).unwrap(), "hello world");
        assert_eq!(tok.encode("goodbye").unwrap(), vec![1]);
    }

    #[test]
    fn missing_eos_is_an_error() {
        let fixture = FIXTURE
            .replace(r#""</s>": 0, "#, "")
            .replace(r#""content": "</s>""#, r#""content": "<pad>""#);
        let err = TextTokenizer::from_bytes(fixture, None).unwrap_err();
        assert!(matches!(err, TokenizeError::MissingEos));
    }

    #[test]
    fn garbage_is_a_load_error() {
        let err = TextTokenizer::from_bytes("not json", None).unwrap_err();
        assert!(matches!(err, TokenizeError::Load(_)));
    }
}
