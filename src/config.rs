//! Simulator configuration: defaults, YAML file loading and CLI overlay.
//!
//! Resolution order is CLI flag > config file value > default, matching the
//! vLLM server CLI contract. `--served-model-name` takes space-separated
//! aliases; `--lora-modules` takes space-separated JSON objects.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 8000;

/// Simulator mode: what the synthetic responses contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Return the request's own text (last user message or prompt)
    Echo,
    /// Return random sentences from a fixed bank
    Random,
}

/// A LoRA adapter known at startup or loaded through the API.
#[derive(Debug, Clone, Deserialize)]
pub struct LoraModule {
    pub name: String,
    pub path: Option<String>,
    pub base_model_name: Option<String>,
}

/// Immutable simulator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimConfig {
    /// Port to listen on
    pub port: u16,

    /// Canonical base model name
    pub model: String,

    /// Aliases the base model is served under; the first one is the display
    /// name. Defaults to `[model]` when left empty.
    pub served_model_name: Vec<String>,

    /// LoRA adapters loaded at startup
    pub lora_modules: Vec<LoraModule>,

    /// Maximum number of LoRAs in a single batch
    pub max_loras: usize,

    /// Maximum number of LoRAs to keep in CPU memory
    pub max_cpu_loras: usize,

    /// Hard cap on concurrently running requests; also the worker pool size
    pub max_num_seqs: usize,

    /// Cap on summed in-flight tokens; 0 disables the constraint
    pub max_num_batched_tokens: i64,

    /// Model context window: prompt plus completion tokens per request
    pub max_model_len: i64,

    /// Response generation mode
    pub mode: Mode,

    /// Time to generate one token, in milliseconds
    pub inter_token_latency: u64,

    /// Time to first token, in milliseconds
    pub time_to_first_token: u64,

    /// Time for a KV-cache transfer from a remote instance, in milliseconds
    pub kv_cache_transfer_latency: u64,

    /// Random seed; the nanosecond clock is used when unset
    pub seed: Option<i64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            model: String::new(),
            served_model_name: Vec::new(),
            lora_modules: Vec::new(),
            max_loras: 1,
            max_cpu_loras: 0,
            max_num_seqs: 5,
            max_num_batched_tokens: 0,
            max_model_len: 1024,
            mode: Mode::Random,
            inter_token_latency: 0,
            time_to_first_token: 0,
            kv_cache_transfer_latency: 0,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: SimConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate and normalize. Must be called before the config is used.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.model.is_empty() {
            bail!("model parameter is empty");
        }
        if self.max_model_len <= 0 {
            bail!("max-model-len must be positive, got {}", self.max_model_len);
        }
        if self.max_num_seqs == 0 {
            bail!("max-num-seqs must be positive");
        }
        if self.max_num_batched_tokens < 0 {
            bail!(
                "max-num-batched-tokens cannot be negative, got {}",
                self.max_num_batched_tokens
            );
        }
        if self.max_loras == 0 {
            bail!("max-loras must be positive");
        }
        if self.max_cpu_loras == 0 {
            self.max_cpu_loras = self.max_loras;
        }
        if self.max_cpu_loras < self.max_loras {
            bail!(
                "max-cpu-loras ({}) cannot be less than max-loras ({})",
                self.max_cpu_loras,
                self.max_loras
            );
        }
        if self.served_model_name.is_empty() {
            self.served_model_name = vec![self.model.clone()];
        }
        Ok(())
    }

    /// The display name for base-model requests: the first served alias.
    pub fn display_base_model(&self) -> &str {
        &self.served_model_name[0]
    }

    pub fn is_served_alias(&self, model: &str) -> bool {
        self.served_model_name.iter().any(|name| name == model)
    }
}

/// Command line arguments. Every non-boolean config option is settable here;
/// set values overwrite the config file ones.
#[derive(Debug, Parser)]
#[command(name = "velosim")]
#[command(version)]
#[command(about = "vLLM-style OpenAI-compatible inference simulator", long_about = None)]
pub struct CliArgs {
    /// Path to a YAML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Currently "loaded" model
    #[arg(long)]
    pub model: Option<String>,

    /// Model names exposed by the API (space-separated)
    #[arg(long = "served-model-name", num_args(0..))]
    pub served_model_name: Option<Vec<String>>,

    /// LoRA adapters (space-separated JSON objects)
    #[arg(long = "lora-modules", num_args(0..))]
    pub lora_modules: Option<Vec<String>>,

    /// Maximum number of LoRAs in a single batch
    #[arg(long)]
    pub max_loras: Option<usize>,

    /// Maximum number of LoRAs to store in CPU memory
    #[arg(long)]
    pub max_cpu_loras: Option<usize>,

    /// Maximum number of inference requests processed at the same time
    #[arg(long)]
    pub max_num_seqs: Option<usize>,

    /// Maximum number of batched tokens per iteration
    #[arg(long)]
    pub max_num_batched_tokens: Option<i64>,

    /// Model's context window in tokens
    #[arg(long)]
    pub max_model_len: Option<i64>,

    /// Simulator mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Time to generate one token (milliseconds)
    #[arg(long)]
    pub inter_token_latency: Option<u64>,

    /// Time to first token (milliseconds)
    #[arg(long)]
    pub time_to_first_token: Option<u64>,

    /// Time for KV-cache transfer from a remote instance (milliseconds)
    #[arg(long)]
    pub kv_cache_transfer_latency: Option<u64>,

    /// Random seed for response generation
    #[arg(long)]
    pub seed: Option<i64>,
}

impl CliArgs {
    /// Resolve the final configuration: file values first, then flags on top.
    pub fn resolve(self) -> anyhow::Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if let Some(names) = self.served_model_name {
            config.served_model_name = names;
        }
        if let Some(modules) = self.lora_modules {
            config.lora_modules = modules
                .iter()
                .map(|raw| {
                    serde_json::from_str::<LoraModule>(raw)
                        .with_context(|| format!("invalid lora module {raw:?}"))
                })
                .collect::<anyhow::Result<_>>()?;
        }
        if let Some(max_loras) = self.max_loras {
            config.max_loras = max_loras;
        }
        if let Some(max_cpu_loras) = self.max_cpu_loras {
            config.max_cpu_loras = max_cpu_loras;
        }
        if let Some(max_num_seqs) = self.max_num_seqs {
            config.max_num_seqs = max_num_seqs;
        }
        if let Some(max_batched) = self.max_num_batched_tokens {
            config.max_num_batched_tokens = max_batched;
        }
        if let Some(max_model_len) = self.max_model_len {
            config.max_model_len = max_model_len;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(itl) = self.inter_token_latency {
            config.inter_token_latency = itl;
        }
        if let Some(ttft) = self.time_to_first_token {
            config.time_to_first_token = ttft;
        }
        if let Some(kv) = self.kv_cache_transfer_latency {
            config.kv_cache_transfer_latency = kv;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_config() -> SimConfig {
        SimConfig {
            model: "test-model".to_string(),
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_validate_fills_served_names() {
        let mut config = base_config();
        config.validate().unwrap();
        assert_eq!(config.served_model_name, vec!["test-model"]);
        assert_eq!(config.display_base_model(), "test-model");
        assert_eq!(config.max_cpu_loras, config.max_loras);
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let mut config = SimConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_lora_limits() {
        let mut config = base_config();
        config.max_loras = 4;
        config.max_cpu_loras = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_load_and_flag_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "port: 9000\nmodel: yaml-model\nmax-num-seqs: 3\nmode: echo\ntime-to-first-token: 200\n"
        )
        .unwrap();

        let args = CliArgs::parse_from([
            "velosim",
            "--config",
            file.path().to_str().unwrap(),
            "--port",
            "9100",
            "--served-model-name",
            "alias-one",
            "alias-two",
        ]);
        let config = args.resolve().unwrap();

        // flag wins over file, file wins over default
        assert_eq!(config.port, 9100);
        assert_eq!(config.model, "yaml-model");
        assert_eq!(config.max_num_seqs, 3);
        assert_eq!(config.mode, Mode::Echo);
        assert_eq!(config.time_to_first_token, 200);
        assert_eq!(config.served_model_name, vec!["alias-one", "alias-two"]);
        assert_eq!(config.display_base_model(), "alias-one");
    }

    #[test]
    fn test_lora_modules_json_args() {
        let args = CliArgs::parse_from([
            "velosim",
            "--model",
            "m",
            "--lora-modules",
            r#"{"name": "adapter-a", "path": "/tmp/a"}"#,
            r#"{"name": "adapter-b"}"#,
        ]);
        let config = args.resolve().unwrap();

        assert_eq!(config.lora_modules.len(), 2);
        assert_eq!(config.lora_modules[0].name, "adapter-a");
        assert_eq!(config.lora_modules[0].path.as_deref(), Some("/tmp/a"));
        assert_eq!(config.lora_modules[1].name, "adapter-b");
    }

    #[test]
    fn test_invalid_lora_module_json() {
        let args = CliArgs::parse_from([
            "velosim",
            "--model",
            "m",
            "--lora-modules",
            "not-json",
        ]);
        assert!(args.resolve().is_err());
    }
}
