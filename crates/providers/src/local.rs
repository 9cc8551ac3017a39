//! Local inference provider — runs the model directly on this machine.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to run
//! GGUF-quantized instruct models with no external inference server.
//!
//! Supported model families:
//! - **Qwen2 / Qwen2.5** (0.5B–1.5B) — the default playbook assistant model
//! - **TinyLlama** (1.1B) — small Llama-architecture chat model
//! - **SmolLM** (360M) — smallest practical model, for CI and edge boxes
//!
//! `model.model_id` may be a preset alias (`qwen2.5:1.5b`), the HuggingFace
//! id of a preset (`Qwen/Qwen2.5-1.5B-Instruct`), or a path to a `.gguf` file
//! with `tokenizer.json` next to it.

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama as qlm;
use candle_transformers::models::quantized_qwen2 as qqwen2;
use hf_hub::api::sync::Api;
use imali_core::error::ProviderError;
use imali_core::provider::{ProviderRequest, ProviderResponse, Usage};
use imali_core::template::ChatTemplate;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info};

// ── Well-known model aliases ───────────────────────────────────────────

/// Model presets: friendly aliases that resolve to HuggingFace repos + filenames.
struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
    chat_template: ChatTemplate,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    let alias_lower = alias.to_lowercase();
    match alias_lower.as_str() {
        "qwen2.5:1.5b" | "qwen2.5-1.5b" | "qwen/qwen2.5-1.5b-instruct" => Some(ModelPreset {
            repo: "Qwen/Qwen2.5-1.5B-Instruct-GGUF",
            gguf_file: "qwen2.5-1.5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2.5-1.5B-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "qwen2.5:0.5b" | "qwen2.5-0.5b" | "qwen/qwen2.5-0.5b-instruct" => Some(ModelPreset {
            repo: "Qwen/Qwen2.5-0.5B-Instruct-GGUF",
            gguf_file: "qwen2.5-0.5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2.5-0.5B-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
            chat_template: ChatTemplate::TinyLlama,
        }),
        "smollm:360m" | "smollm-360m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
            gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
            chat_template: ChatTemplate::ChatML,
        }),
        _ => None,
    }
}

// ── Local Provider ─────────────────────────────────────────────────────

/// A provider that runs GGUF-quantized language models locally via Candle.
///
/// The model sits behind a Mutex: one inference runs at a time, on a
/// blocking thread.
pub struct LocalProvider {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    model_name: String,
    chat_template: ChatTemplate,
}

/// Quantized weights for the supported architectures.
enum Weights {
    Llama(qlm::ModelWeights),
    Qwen2(qqwen2::ModelWeights),
}

impl Weights {
    fn from_gguf(
        content: gguf_file::Content,
        file: &mut std::fs::File,
        device: &Device,
    ) -> Result<Self, ProviderError> {
        let arch = content
            .metadata
            .get("general.architecture")
            .and_then(|v| v.to_string().ok())
            .cloned()
            .unwrap_or_else(|| "llama".to_string());

        debug!(arch = %arch, "Loading GGUF weights");

        match arch.as_str() {
            "qwen2" => qqwen2::ModelWeights::from_gguf(content, file, device)
                .map(Weights::Qwen2)
                .map_err(|e| ProviderError::NotConfigured(format!("Failed to load model weights: {e}"))),
            "llama" => qlm::ModelWeights::from_gguf(content, file, device)
                .map(Weights::Llama)
                .map_err(|e| ProviderError::NotConfigured(format!("Failed to load model weights: {e}"))),
            other => Err(ProviderError::NotConfigured(format!(
                "Unsupported GGUF architecture '{other}' (expected llama or qwen2)"
            ))),
        }
    }

    /// Logits for the last position of `input`, shape `(vocab,)`.
    fn forward(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
        let logits = match self {
            Weights::Llama(m) => m.forward(input, index_pos)?,
            Weights::Qwen2(m) => m.forward(input, index_pos)?,
        };
        logits.squeeze(0)?.to_dtype(DType::F32)
    }
}

/// The loaded model state (tokenizer + weights).
struct LocalModelState {
    weights: Weights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_ids: Vec<u32>,
}

impl LocalProvider {
    /// Create a new local provider. The model is loaded lazily on first request.
    pub fn new(model_name: &str) -> Self {
        let chat_template = resolve_preset(model_name)
            .map(|p| p.chat_template)
            .unwrap_or(ChatTemplate::ChatML);
        Self {
            inner: Arc::new(Mutex::new(None)),
            model_name: model_name.to_string(),
            chat_template,
        }
    }

    /// Override the prompt format chosen from the preset.
    pub fn with_chat_template(mut self, template: ChatTemplate) -> Self {
        self.chat_template = template;
        self
    }
}

impl LocalModelState {
    /// Load a model by preset alias or GGUF path.
    fn load(model_name: &str) -> Result<Self, ProviderError> {
        let device = Device::Cpu;

        if Path::new(model_name).exists() && model_name.ends_with(".gguf") {
            return Self::load_from_path(Path::new(model_name), &device);
        }

        let preset = resolve_preset(model_name).ok_or_else(|| {
            ProviderError::ModelNotFound(format!(
                "Unknown local model '{model_name}'. Available presets: qwen2.5:1.5b, \
                 qwen2.5:0.5b, tinyllama, smollm:360m. Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model = model_name,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        // Download via HuggingFace Hub (cached automatically)
        let api = Api::new().map_err(|e| {
            ProviderError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api.model(preset.repo.to_string()).get(preset.gguf_file).map_err(|e| {
            ProviderError::Network(format!(
                "Failed to download model '{}' from '{}': {e}",
                preset.gguf_file, preset.repo
            ))
        })?;

        let tokenizer_path = api
            .model(preset.tokenizer_repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download tokenizer from '{}': {e}",
                    preset.tokenizer_repo
                ))
            })?;

        info!(path = %model_path.display(), "Model file ready");
        Self::load_files(&model_path, &tokenizer_path, &device)
    }

    /// Load from an explicit GGUF file path with `tokenizer.json` beside it.
    fn load_from_path(path: &Path, device: &Device) -> Result<Self, ProviderError> {
        let tokenizer_path = path.with_file_name("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(ProviderError::NotConfigured(format!(
                "No tokenizer.json found next to {}",
                path.display()
            )));
        }
        Self::load_files(path, &tokenizer_path, device)
    }

    fn load_files(
        model_path: &Path,
        tokenizer_path: &Path,
        device: &Device,
    ) -> Result<Self, ProviderError> {
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to load tokenizer: {e}")))?;

        let mut file = std::fs::File::open(model_path)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to open model file: {e}")))?;

        let gguf = gguf_file::Content::read(&mut file)
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;

        let weights = Weights::from_gguf(gguf, &mut file, device)?;

        // Chat models stop on their end-of-turn marker, base models on EOS.
        let eos_token_ids: Vec<u32> = ["<|im_end|>", "<|endoftext|>", "</s>", "<|eot_id|>"]
            .iter()
            .filter_map(|t| tokenizer.token_to_id(t))
            .collect();

        info!(eos = ?eos_token_ids, "Local model loaded successfully");

        Ok(Self {
            weights,
            tokenizer,
            device: device.clone(),
            eos_token_ids,
        })
    }

    /// Run inference: tokenize → sample tokens → decode the continuation.
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
        seed: u64,
    ) -> Result<(String, u32, u32), ProviderError> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| ProviderError::Inference(format!("Tokenization failed: {e}")))?;

        let prompt_tokens = encoding.get_ids();
        let prompt_len = prompt_tokens.len();

        debug!(
            prompt_tokens = prompt_len,
            max_tokens = max_tokens,
            temperature = temperature,
            "Starting local generation"
        );

        let mut logits_processor = if temperature <= 0.0 {
            LogitsProcessor::new(seed, None, None)
        } else {
            LogitsProcessor::new(seed, Some(temperature as f64), None)
        };

        let mut generated_tokens: Vec<u32> = Vec::new();
        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;

        for _ in 0..max_tokens {
            // First pass feeds the whole prompt at position 0; afterwards
            // one token at a time after everything seen so far.
            let index_pos = if generated_tokens.is_empty() {
                0
            } else {
                prompt_len + generated_tokens.len() - 1
            };

            let logits = self.weights.forward(&input, index_pos).map_err(map_candle_err)?;
            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;

            if self.eos_token_ids.contains(&next_token) {
                break;
            }

            generated_tokens.push(next_token);

            input = Tensor::new(&[next_token][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let completion_len = generated_tokens.len() as u32;

        let output = self
            .tokenizer
            .decode(&generated_tokens, true)
            .map_err(|e| ProviderError::Inference(format!("Detokenization failed: {e}")))?;

        debug!(
            completion_tokens = completion_len,
            output_len = output.len(),
            "Generation complete"
        );

        Ok((output, prompt_len as u32, completion_len))
    }
}

/// Map Candle errors to ProviderError.
fn map_candle_err(e: candle_core::Error) -> ProviderError {
    ProviderError::Inference(format!("Candle inference error: {e}"))
}

// ── Provider trait implementation ──────────────────────────────────────

#[async_trait]
impl imali_core::provider::Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model_name
    }

    fn chat_template(&self) -> ChatTemplate {
        self.chat_template
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        // Ensure model is loaded (lazy initialization)
        {
            let mut state = self.inner.lock().await;
            if state.is_none() {
                info!(model = %self.model_name, "Loading local model on first request...");
                let name = self.model_name.clone();
                let loaded = tokio::task::spawn_blocking(move || LocalModelState::load(&name))
                    .await
                    .map_err(|e| ProviderError::Inference(format!("Model loading task failed: {e}")))??;
                *state = Some(loaded);
            }
        }

        let params = request.params;
        let prompt = request.prompt.clone();
        let seed = rand::random::<u64>();

        let inner = self.inner.clone();
        let (continuation, prompt_tokens, completion_tokens) =
            tokio::task::spawn_blocking(move || {
                let mut guard = inner.blocking_lock();
                let state = guard
                    .as_mut()
                    .ok_or_else(|| ProviderError::NotConfigured("local model is not loaded".into()))?;
                state.generate(
                    &prompt,
                    params.max_new_tokens,
                    params.effective_temperature(),
                    seed,
                )
            })
            .await
            .map_err(|e| ProviderError::Inference(format!("Inference task panicked: {e}")))??;

        // Echo the prompt like a text-generation pipeline does.
        let generated_text = format!("{}{}", request.prompt, continuation);

        Ok(ProviderResponse {
            generated_text,
            usage: Some(Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            model: format!("local/{}", request.model),
        })
    }
}
