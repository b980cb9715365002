//! Answer generation from retrieved reviews.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reviewrag_embeddings::ollama;

use crate::config::AnswerConfig;
use crate::error::{Result, RetrievalError};

const PROMPT_TEMPLATE: &str = "You are an expert assistant for a pizza restaurant. \
Your role is to help customers by answering their questions based on real customer reviews.

Here are some relevant customer reviews from the restaurant:
{reviews}

Based on these reviews, please answer the following question in a helpful and informative way. \
If the reviews don't contain enough information to fully answer the question, say so honestly.

Question: {question}

Answer:";

/// Fill the prompt template with formatted reviews and the question.
pub fn build_prompt(question: &str, reviews: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{reviews}", reviews)
        .replace("{question}", question)
}

/// Produces a natural-language answer from a question and review context.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, reviews: &str) -> Result<String>;
}

/// Answer generator backed by Ollama's `/api/generate`.
pub struct OllamaGenerator {
    base_url: String,
    client: reqwest::Client,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RetrievalError::Generation(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Check that the server is reachable and has the answer model installed.
    pub async fn ensure_model(&self) -> Result<()> {
        ollama::ensure_installed(&self.client, &self.base_url, &self.model)
            .await
            .map_err(|e| RetrievalError::Generation(e.to_string()))?;
        info!("Answer model {} is available", self.model);
        Ok(())
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    async fn generate(&self, question: &str, reviews: &str) -> Result<String> {
        let prompt = build_prompt(question, reviews);
        let url = format!("{}/api/generate", self.base_url);
        debug!("Generating answer with model: {}", self.model);

        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RetrievalError::Generation(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Generation(format!(
                "model {} failed ({status}): {error_text}",
                self.model
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Generation(format!("unreadable response: {e}")))?;

        Ok(result.response.trim().to_string())
    }
}
