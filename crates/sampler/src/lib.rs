#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
#![deny(missing_docs, unused_must_use)]

//! Token sampling: generation settings plus the logits -> next token step.

use candle_core::Tensor;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use serde::{Deserialize, Serialize};

/// Generation settings for one reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// upper bound on tokens generated after the prompt
    pub max_new_tokens: usize,
    /// sample from the distribution; `false` means greedy decoding
    pub do_sample: bool,
    /// softmax temperature
    pub temperature: f64,
    /// keep only the `k` most likely tokens before the nucleus cut; `None` disables it
    pub top_k: Option<usize>,
    /// nucleus (top-p) probability mass
    pub top_p: f64,
    /// penalty applied to logits of tokens already in the context; 1.0 disables it
    pub repetition_penalty: f32,
    /// fixed RNG seed; a fresh random seed per reply when `None`
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            do_sample: true,
            temperature: 0.7,
            top_k: Some(50),
            top_p: 0.9,
            repetition_penalty: 1.1,
            seed: None,
        }
    }
}

impl SamplingConfig {
    /// Sampling strategy for the logits processor.
    pub fn sampling(&self) -> Sampling {
        if !self.do_sample || self.temperature <= 0.0 {
            return Sampling::ArgMax;
        }
        let temperature = self.temperature;
        let nucleus = self.top_p > 0.0 && self.top_p < 1.0;
        match (self.top_k, nucleus) {
            (Some(k), true) => Sampling::TopKThenTopP {
                k,
                p: self.top_p,
                temperature,
            },
            (Some(k), false) => Sampling::TopK { k, temperature },
            (None, true) => Sampling::TopP {
                p: self.top_p,
                temperature,
            },
            (None, false) => Sampling::All { temperature },
        }
    }
}

/// Stateful next-token picker for a single generation.
pub struct Sampler {
    processor: LogitsProcessor,
    repetition_penalty: f32,
}

impl Sampler {
    /// Build a sampler from `config`.
    pub fn new(config: &SamplingConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            processor: LogitsProcessor::from_sampling(seed, config.sampling()),
            repetition_penalty: config.repetition_penalty,
        }
    }

    /// Pick the next token from 1-D `logits`, penalising every id in `context`.
    pub fn next_token(&mut self, logits: &Tensor, context: &[u32]) -> candle_core::Result<u32> {
        if (self.repetition_penalty - 1.0).abs() < f32::EPSILON || context.is_empty() {
            return self.processor.sample(logits);
        }
        let logits = candle_transformers::utils::apply_repeat_penalty(
            logits,
            self.repetition_penalty,
            context,
        )?;
        self.processor.sample(&logits)
    }
}
