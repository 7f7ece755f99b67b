#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::llama::{self, Cache, Llama, LlamaConfig, LlamaEosToks};
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use sampler::{Sampler, SamplingConfig};
use serde::Deserialize;
use tokenize::TextTokenizer;
use tracing::{debug, info};

use crate::config::{Config, DevicePreference};
use crate::error::AssistantError;
use crate::service::Generator;

/// Llama-family causal LM with its tokenizer, loaded once per process.
///
/// Generation only borrows the model: every call builds its own KV cache and
/// sampler, so one engine can serve concurrent requests.
pub struct LlamaEngine {
    model: Llama,
    config: llama::Config,
    tokenizer: TextTokenizer,
    stop_tokens: Vec<u32>,
    device: Device,
    dtype: DType,
    sampling: SamplingConfig,
}

#[derive(Deserialize)]
struct WeightIndex {
    weight_map: HashMap<String, String>,
}

impl LlamaEngine {
    /// Fetch `config.json`, `tokenizer.json` and the safetensors weights of
    /// `config.model_id` from the hub (or its local cache) and build the model.
    pub fn load(config: &Config) -> Result<Self, AssistantError> {
        let started = Instant::now();
        let device = select_device(config.device)?;
        let dtype = if device.is_cuda() { DType::BF16 } else { DType::F32 };
        info!(model_id = %config.model_id, revision = %config.revision, ?dtype, "loading model");

        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            config.model_id.clone(),
            RepoType::Model,
            config.revision.clone(),
        ));
        let config_path = repo.get("config.json")?;
        let tokenizer_path = repo.get("tokenizer.json")?;
        let weight_paths = weight_files(&repo)?;

        let raw: LlamaConfig = serde_json::from_slice(&std::fs::read(config_path)?)?;
        let model_config = raw.into_config(false);
        let eos_hint = config_eos_tokens(&model_config).first().copied();
        let tokenizer = TextTokenizer::from_file(tokenizer_path, eos_hint)?;

        let vb = var_builder(&weight_paths, dtype, &device)?;
        let model = Llama::load(vb, &model_config)?;
        let engine = Self::from_parts(model, model_config, tokenizer, device, dtype, config.sampling.clone());
        info!(
            shards = weight_paths.len(),
            context = engine.config.max_position_embeddings,
            eos = ?engine.stop_tokens,
            pad = engine.tokenizer.pad_token_id(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model ready"
        );
        Ok(engine)
    }

    /// Assemble an engine from an already built model and tokenizer.
    ///
    /// Generation stops on every EOS id of `config` and on the tokenizer's EOS.
    pub fn from_parts(
        model: Llama,
        config: llama::Config,
        tokenizer: TextTokenizer,
        device: Device,
        dtype: DType,
        sampling: SamplingConfig,
    ) -> Self {
        let mut stop_tokens = config_eos_tokens(&config);
        if !stop_tokens.contains(&tokenizer.eos_token_id()) {
            stop_tokens.push(tokenizer.eos_token_id());
        }
        Self {
            model,
            config,
            tokenizer,
            stop_tokens,
            device,
            dtype,
            sampling,
        }
    }
}

impl Generator for LlamaEngine {
    /// Encode `prompt`, sample up to `max_new_tokens` continuation tokens and
    /// decode prompt plus continuation with special tokens removed.
    fn generate(&self, prompt: &str) -> Result<String, AssistantError> {
        let started = Instant::now();
        let mut tokens = self.tokenizer.encode(prompt)?;
        let prompt_tokens = tokens.len();
        let limit = self.config.max_position_embeddings;
        if prompt_tokens >= limit {
            return Err(AssistantError::ContextOverflow { prompt_tokens, limit });
        }
        let budget = self.sampling.max_new_tokens.min(limit - prompt_tokens);

        let mut cache = Cache::new(true, self.dtype, &self.config, &self.device)?;
        let mut sampler = Sampler::new(&self.sampling);
        let mut index_pos = 0usize;
        for _ in 0..budget {
            // first step feeds the whole prompt, later steps only the newest token
            let fresh = tokens.get(index_pos..).unwrap_or_default();
            let input = Tensor::new(fresh, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, index_pos, &mut cache)?.squeeze(0)?;
            index_pos += fresh.len();

            let next = sampler.next_token(&logits, &tokens)?;
            if self.stop_tokens.contains(&next) {
                break;
            }
            tokens.push(next);
        }

        let generated = tokens.len() - prompt_tokens;
        debug!(
            prompt_tokens,
            generated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );
        Ok(self.tokenizer.decode(&tokens, true)?)
    }
}

fn config_eos_tokens(config: &llama::Config) -> Vec<u32> {
    match &config.eos_token_id {
        Some(LlamaEosToks::Single(id)) => vec![*id],
        Some(LlamaEosToks::Multiple(ids)) => ids.clone(),
        None => Vec::new(),
    }
}

fn select_device(preference: DevicePreference) -> Result<Device, AssistantError> {
    let device = match preference {
        DevicePreference::Auto => Device::cuda_if_available(0)?,
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => Device::new_cuda(0)?,
    };
    Ok(device)
}

/// Single `model.safetensors`, or every shard listed in the safetensors index.
fn weight_files(repo: &ApiRepo) -> Result<Vec<PathBuf>, AssistantError> {
    match repo.get("model.safetensors") {
        Ok(path) => Ok(vec![path]),
        Err(single) => {
            debug!(error = %single, "no single weight file, trying sharded index");
            let index_path = repo.get("model.safetensors.index.json")?;
            let index: WeightIndex = serde_json::from_slice(&std::fs::read(index_path)?)?;
            shard_names(&index)
                .into_iter()
                .map(|name| repo.get(&name).map_err(AssistantError::from))
                .collect()
        }
    }
}

fn shard_names(index: &WeightIndex) -> Vec<String> {
    let unique: BTreeSet<&String> = index.weight_map.values().collect();
    unique.into_iter().cloned().collect()
}

fn var_builder(
    paths: &[PathBuf],
    dtype: DType,
    device: &Device,
) -> Result<VarBuilder<'static>, AssistantError> {
    let mut tensors = HashMap::new();
    for path in paths {
        tensors.extend(candle_core::safetensors::load(path, device)?);
    }
    Ok(VarBuilder::from_tensors(tensors, dtype, device))
}
