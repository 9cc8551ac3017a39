//! Provider trait — the abstraction over text-generation backends.
//!
//! A Provider takes a fully rendered prompt plus sampling parameters and
//! returns the generated text. Like a HuggingFace `text-generation`
//! pipeline, the returned text is expected to echo the prompt followed by
//! the continuation; the answer is cut out of it by the caller.
//!
//! Implementations: OpenAI-compatible completion servers (vLLM, llama.cpp,
//! Ollama), local Candle inference.

use crate::error::ProviderError;
use crate::template::ChatTemplate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Sampling parameters. These are process-wide constants, never per-request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of new tokens to generate
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// Sampling temperature (ignored when `do_sample` is false)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Sample from the distribution instead of greedy decoding
    #[serde(default = "default_do_sample")]
    pub do_sample: bool,
}

fn default_max_new_tokens() -> u32 {
    256
}

fn default_temperature() -> f32 {
    0.7
}

fn default_do_sample() -> bool {
    true
}

impl GenerationParams {
    /// The temperature actually sent to the backend: 0.0 means greedy.
    pub fn effective_temperature(&self) -> f32 {
        if self.do_sample { self.temperature } else { 0.0 }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            do_sample: default_do_sample(),
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "Qwen/Qwen2.5-1.5B-Instruct")
    pub model: String,

    /// The prompt, already rendered through the provider's chat template
    pub prompt: String,

    /// Sampling parameters
    #[serde(default)]
    pub params: GenerationParams,
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Everything the backend produced. Echoing backends include the prompt.
    pub generated_text: String,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// Every generation backend implements this trait. The prediction pipeline
/// renders its conversation with [`Provider::chat_template`] and calls
/// [`Provider::complete`] without knowing which backend is in use.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "vllm", "local").
    fn name(&self) -> &str;

    /// The model identifier served by this provider.
    fn model(&self) -> &str;

    /// How conversations are flattened into a prompt for this backend.
    fn chat_template(&self) -> ChatTemplate {
        ChatTemplate::ChatML
    }

    /// Generate a continuation of `request.prompt`.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
