//! The predict pipeline: retrieval, prompt assembly, generation and
//! answer extraction for one query.
//!
//! # Flow
//!
//! 1. Select up to three playbook strategies for the query
//! 2. Frame them in the Imali-Bot system prompt, followed by the query
//! 3. Render through the backend's chat template
//! 4. Generate
//! 5. Strip the echoed prompt and report which strategies were used

use crate::context::{ContextSnippet, assemble, retrieve};
use crate::extract::extract_answer;
use imali_core::provider::{GenerationParams, Provider, ProviderRequest};
use imali_playbook::KnowledgeBase;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inbound query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,

    /// Prior turns. Accepted for compatibility, not used.
    #[serde(default)]
    pub history: Vec<serde_json::Value>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
        }
    }
}

/// Successful answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictResponse {
    pub response: String,

    /// One label per strategy line in the prompt, in retrieval order,
    /// e.g. `- [Fraud]`.
    pub strategies_used: Vec<String>,
}

/// Owns everything a request needs. Built once at startup and shared.
pub struct PredictPipeline {
    knowledge_base: Arc<KnowledgeBase>,
    provider: Arc<dyn Provider>,
    params: GenerationParams,
}

impl PredictPipeline {
    pub fn new(
        knowledge_base: Arc<KnowledgeBase>,
        provider: Arc<dyn Provider>,
        params: GenerationParams,
    ) -> Self {
        Self {
            knowledge_base,
            provider,
            params,
        }
    }

    /// The model identifier of the generation backend.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    /// The strategy lines that would be placed in the prompt for `query`.
    pub fn retrieve_context(&self, query: &str) -> Vec<ContextSnippet> {
        retrieve(query, &self.knowledge_base)
    }

    /// Answer one query. Any generation failure is returned unchanged;
    /// there is no retry and no partial answer.
    pub async fn handle(&self, request: &QueryRequest) -> imali_core::Result<PredictResponse> {
        let request_id = uuid::Uuid::new_v4();

        if !request.history.is_empty() {
            debug!(%request_id, turns = request.history.len(), "Ignoring conversation history");
        }

        let snippets = self.retrieve_context(&request.query);
        let strategies_used: Vec<String> = snippets.iter().map(ContextSnippet::label).collect();

        let messages = assemble(&request.query, &snippets);
        let prompt = self.provider.chat_template().render(&messages);

        debug!(
            %request_id,
            strategies = ?strategies_used,
            prompt_len = prompt.len(),
            "Prompt assembled"
        );

        let provider_request = ProviderRequest {
            model: self.provider.model().to_string(),
            prompt: prompt.clone(),
            params: self.params,
        };

        let output = self.provider.complete(provider_request).await.map_err(|e| {
            warn!(%request_id, provider = self.provider.name(), error = %e, "Generation failed");
            e
        })?;

        let response = extract_answer(&prompt, &output.generated_text);

        info!(
            %request_id,
            strategies = strategies_used.len(),
            answer_len = response.len(),
            completion_tokens = output.usage.as_ref().map(|u| u.completion_tokens),
            "Prediction complete"
        );

        Ok(PredictResponse {
            response,
            strategies_used,
        })
    }
}
