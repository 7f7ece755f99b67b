#![forbid(unsafe_code)]

use std::str::FromStr;

use prompt::PromptTemplate;
use sampler::SamplingConfig;

/// Model loaded when `HF_MODEL_ID` is not set.
pub const DEFAULT_MODEL_ID: &str = "BekiTila/bitext-dpo-tinyllama-support";
/// Hub revision loaded when `HF_REVISION` is not set.
pub const DEFAULT_REVISION: &str = "main";
/// Address the chat server listens on when `ASSISTANT_BIND` is not set.
pub const DEFAULT_BIND: &str = "0.0.0.0:7860";

/// Error type for configuration parsing
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// `ASSISTANT_DEVICE` is not one of `auto`, `cpu`, `cuda`
    #[error("unknown device {0:?} (expected auto, cpu or cuda)")]
    InvalidDevice(String),
    /// `ASSISTANT_SEED` is not an unsigned integer
    #[error("invalid seed {0:?}")]
    InvalidSeed(String),
}

/// Where the model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// first CUDA device when compiled in and present, CPU otherwise
    #[default]
    Auto,
    /// always CPU
    Cpu,
    /// CUDA device 0; loading fails without one
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            _ => Err(ConfigError::InvalidDevice(s.to_string())),
        }
    }
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Hugging Face model repository id
    pub model_id: String,
    /// repository revision (branch, tag or commit)
    pub revision: String,
    /// device selection
    pub device: DevicePreference,
    /// generation settings
    pub sampling: SamplingConfig,
    /// replacement for the built-in system instruction
    pub system_prompt: Option<String>,
    /// server listen address
    pub bind: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            device: DevicePreference::Auto,
            sampling: SamplingConfig::default(),
            system_prompt: None,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; blank values count as unset.
    ///
    /// Variables: `HF_MODEL_ID`, `HF_REVISION`, `ASSISTANT_DEVICE`,
    /// `ASSISTANT_SEED`, `ASSISTANT_SYSTEM_PROMPT`, `ASSISTANT_BIND`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(model_id) = get("HF_MODEL_ID") {
            config.model_id = model_id.trim().to_string();
        }
        if let Some(revision) = get("HF_REVISION") {
            config.revision = revision.trim().to_string();
        }
        if let Some(device) = get("ASSISTANT_DEVICE") {
            config.device = device.parse()?;
        }
        if let Some(seed) = get("ASSISTANT_SEED") {
            let seed = seed
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSeed(seed.clone()))?;
            config.sampling.seed = Some(seed);
        }
        config.system_prompt = get("ASSISTANT_SYSTEM_PROMPT");
        if let Some(bind) = get("ASSISTANT_BIND") {
            config.bind = bind.trim().to_string();
        }
        Ok(config)
    }

    /// Prompt template honouring the configured system instruction.
    pub fn template(&self) -> PromptTemplate {
        match &self.system_prompt {
            Some(system) => PromptTemplate::with_system(system.as_str()),
            None => PromptTemplate::default(),
        }
    }
}
