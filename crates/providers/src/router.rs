//! Provider router — builds the configured generation backend.

use crate::openai_compat::OpenAiCompatProvider;
use imali_config::AppConfig;
use imali_core::error::ProviderError;
use imali_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

/// Build the generation backend named by `config.model.provider`.
///
/// `"local"` needs the `local` feature; every other name is served by an
/// OpenAI-compatible completion endpoint.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let model = &config.model;

    if model.provider == "local" {
        return build_local(config);
    }

    let base_url = model
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&model.provider));

    let mut provider = OpenAiCompatProvider::new(&model.provider, &base_url, &model.model_id)?;
    if let Some(template) = model.chat_template {
        provider = provider.with_chat_template(template);
    }
    if let Some(key) = &model.api_key {
        provider = provider.with_api_key(key);
    }

    info!(
        provider = %model.provider,
        model = %model.model_id,
        base_url = %base_url,
        template = ?provider.chat_template(),
        "Generation backend configured"
    );

    Ok(Arc::new(provider))
}

#[cfg(feature = "local")]
fn build_local(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let mut provider = crate::local::LocalProvider::new(&config.model.model_id);
    if let Some(template) = config.model.chat_template {
        provider = provider.with_chat_template(template);
    }
    info!(
        model = %config.model.model_id,
        template = ?provider.chat_template(),
        "Local Candle backend configured (loads on first request)"
    );
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "local"))]
fn build_local(_config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    Err(ProviderError::NotConfigured(
        "provider 'local' requires building with `--features local`".into(),
    ))
}

/// Get the default base URL for well-known backends.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        // The gateway itself listens on 8000.
        "vllm" => "http://localhost:8001/v1".into(),
        "tgi" => "http://localhost:8080/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        _ => format!("http://localhost:8001/{provider_name}/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imali_core::ChatTemplate;

    #[test]
    fn default_base_urls() {
        assert_eq!(default_base_url("vllm"), "http://localhost:8001/v1");
        assert!(default_base_url("ollama").contains("localhost:11434"));
        assert!(default_base_url("openai").contains("api.openai.com"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "vllm");
        assert_eq!(provider.model(), "Qwen/Qwen2.5-1.5B-Instruct");
        assert_eq!(provider.chat_template(), ChatTemplate::ChatML);
    }

    #[test]
    fn configured_template_and_url_are_used() {
        let mut config = AppConfig::default();
        config.model.provider = "llamacpp".into();
        config.model.chat_template = Some(ChatTemplate::Llama3);
        config.model.api_url = Some("http://gpu-box:9000/v1".into());
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "llamacpp");
        assert_eq!(provider.chat_template(), ChatTemplate::Llama3);
    }

    #[cfg(feature = "local")]
    #[test]
    fn local_uses_configured_template() {
        let mut config = AppConfig::default();
        config.model.provider = "local".into();
        config.model.model_id = "/models/llama3-8b-instruct.Q4_K_M.gguf".into();
        config.model.chat_template = Some(ChatTemplate::Llama3);
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "local");
        assert_eq!(provider.chat_template(), ChatTemplate::Llama3);
    }

    #[cfg(feature = "local")]
    #[test]
    fn local_without_template_follows_preset() {
        let mut config = AppConfig::default();
        config.model.provider = "local".into();
        config.model.model_id = "tinyllama".into();
        let provider = build_from_config(&config).unwrap();
        assert_eq!(provider.chat_template(), ChatTemplate::TinyLlama);
    }

    #[cfg(not(feature = "local"))]
    #[test]
    fn local_without_feature_is_rejected() {
        let mut config = AppConfig::default();
        config.model.provider = "local".into();
        let err = build_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("--features local"));
    }
}
