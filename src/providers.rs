//! OpenAI-compatible HTTP providers for the enrichment traits.
//!
//! Both providers speak the plain `/chat/completions` and `/embeddings`
//! JSON shapes against a configurable base URL, so any compatible gateway
//! (or a mock server in tests) can stand behind them.

use async_trait::async_trait;
use serde::Deserialize;

use crate::enrich::{ChatProvider, EmbeddingProvider};
use crate::types::RagError;

/// JSON-mode chat completion client.
#[derive(Clone, Debug)]
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, RagError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Provider(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Provider(err.to_string()))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| RagError::Provider(err.to_string()))?;
        let content = parsed
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| RagError::Provider("chat response carried no choices".to_string()))?;

        serde_json::from_str(content).map_err(|err| {
            RagError::Provider(format!("chat response content is not valid JSON: {err}"))
        })
    }
}

/// Single-input embeddings client.
#[derive(Clone, Debug)]
pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddings {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RagError::Provider(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Provider(err.to_string()))?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RagError::Provider(err.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| RagError::Provider("embedding response carried no data".to_string()))
    }
}
