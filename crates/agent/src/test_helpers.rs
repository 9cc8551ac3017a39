//! Stub generation backends for pipeline tests.

use imali_core::error::ProviderError;
use imali_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::sync::Mutex;

/// Echoes the prompt followed by a fixed continuation, like a
/// text-generation pipeline. Records every request it sees.
pub struct EchoProvider {
    continuation: String,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl EchoProvider {
    pub fn new(continuation: &str) -> Self {
        Self {
            continuation: continuation.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo_mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text = format!("{} {}", request.prompt, self.continuation);
        self.requests.lock().unwrap().push(request);
        Ok(make_response(&text))
    }
}

/// Returns scripted outputs in order, without echoing the prompt.
///
/// Panics if more calls are made than outputs provided.
pub struct ScriptedProvider {
    outputs: Vec<String>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(outputs: Vec<&str>) -> Self {
        Self {
            outputs: outputs.into_iter().map(String::from).collect(),
            call_count: Mutex::new(0),
        }
    }

    pub fn single(output: &str) -> Self {
        Self::new(vec![output])
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        let output = self.outputs.get(*count).unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more outputs (call #{}, have {})",
                *count,
                self.outputs.len()
            )
        });
        *count += 1;
        Ok(make_response(output))
    }
}

/// Always fails with the given error.
pub struct FailingProvider {
    error: ProviderError,
}

impl FailingProvider {
    pub fn new(error: ProviderError) -> Self {
        Self { error }
    }
}

#[async_trait::async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "failing_mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(self.error.clone())
    }
}

pub fn make_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        generated_text: text.to_string(),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}
