//! OpenAI-compatible embedding provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::usage::TokenUsage;
use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::{CollaboratorError, Result};

/// Embedding provider over the `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    dimension: usize,
    batch_size: usize,
    timeout_secs: u64,
    usage: TokenUsage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<EmbeddingUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingUsage {
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiEmbeddings {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                CollaboratorError::MissingApiKey(
                    "embedding.api_key not set and OPENAI_API_KEY env var not set".to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            dimension: Self::model_dimension(&config.model),
            batch_size: config.batch_size.max(1),
            timeout_secs: config.timeout_secs,
            usage: TokenUsage::new(),
        })
    }

    /// Count tokens into a shared ledger.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    fn model_dimension(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            // text-embedding-3-small, text-embedding-ada-002
            _ => 1536,
        }
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.timeout_secs)
                } else {
                    CollaboratorError::Api(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = serde_json::from_str::<ErrorResponse>(&error_text)
                .map(|r| r.error.message)
                .unwrap_or(error_text);
            return Err(CollaboratorError::Api(format!("API error ({}): {}", status, message)).into());
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::MalformedResponse(e.to_string()))?;

        if let Some(usage) = &result.usage {
            self.usage.record(usage.total_tokens);
        }

        let mut data = result.data;
        data.sort_by_key(|d| d.index);
        if data.len() != texts.len() {
            return Err(CollaboratorError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            ))
            .into());
        }
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            tracing::debug!("Embedding batch of {} texts", chunk.len());
            embeddings.extend(self.request_embeddings(chunk).await?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
