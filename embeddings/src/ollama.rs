//! Ollama embedding provider.
//!
//! Talks to a local Ollama server over its HTTP API. Batches go through
//! `/api/embed`, which accepts a list of inputs and answers with one vector
//! per input in the same order.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Default address of a local Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "mxbai-embed-large";

/// Embedding provider backed by an Ollama server.
pub struct OllamaProvider {
    /// API base URL, without a trailing slash.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Embedding model name.
    model: String,
}

impl OllamaProvider {
    /// Create a provider for the default local server and model.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Bound every request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server is reachable and has the model installed.
    pub async fn ensure_model(&self) -> Result<()> {
        ensure_installed(&self.client, &self.base_url, &self.model).await?;
        info!("Embedding model {} is available", self.model);
        Ok(())
    }

    async fn request_embeddings(&self, input: Vec<&str>) -> Result<Vec<Embedding>> {
        let expected = input.len();
        let url = format!("{}/api/embed", self.base_url);
        let body = EmbedRequest {
            model: &self.model,
            input,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::NOT_FOUND || error_text.contains("not found") {
                return Err(EmbeddingError::ModelMissing {
                    model: self.model.clone(),
                });
            }
            return Err(EmbeddingError::ApiRequest(format!(
                "API error ({status}): {error_text}"
            )));
        }

        let result: EmbedResponse = response.json().await?;
        if result.embeddings.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "requested {expected} embeddings, received {}",
                result.embeddings.len()
            )));
        }

        Ok(result.embeddings)
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        debug!("Generating embedding with model: {}", self.model);

        self.request_embeddings(vec![text])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("No embedding in response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Generating batch embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let embeddings = self
            .request_embeddings(texts.iter().map(String::as_str).collect())
            .await?;

        debug!("Generated {} batch embeddings", embeddings.len());
        Ok(embeddings)
    }
}

/// Check that the Ollama server at `base_url` has `model` installed.
///
/// Model names without a tag match the `:latest` tag, the way the Ollama
/// CLI resolves them.
pub async fn ensure_installed(client: &reqwest::Client, base_url: &str, model: &str) -> Result<()> {
    let url = format!("{base_url}/api/tags");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| transport_error(base_url, e))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::ApiRequest(format!(
            "listing models failed ({status}): {error_text}"
        )));
    }

    let tags: TagsResponse = response.json().await?;
    if tags.models.iter().any(|m| model_matches(&m.name, model)) {
        Ok(())
    } else {
        Err(EmbeddingError::ModelMissing {
            model: model.to_string(),
        })
    }
}

fn transport_error(base_url: &str, error: reqwest::Error) -> EmbeddingError {
    if error.is_connect() || error.is_timeout() {
        EmbeddingError::ServiceUnavailable {
            url: base_url.to_string(),
            reason: error.to_string(),
        }
    } else {
        EmbeddingError::Http(error)
    }
}

fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted || (!wanted.contains(':') && installed == format!("{wanted}:latest"))
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_embed_batch_keeps_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_json(json!({
                "model": "mxbai-embed-large",
                "input": ["great crust", "cold pizza"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "mxbai-embed-large",
                "embeddings": [[1.0, 0.0], [0.0, 1.0]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let texts = vec!["great crust".to_string(), "cold pizza".to_string()];
        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_single() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.5, 0.5, 0.5]]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let embedding = provider.embed("is the crust crispy?").await.unwrap();

        assert_eq!(embedding, vec![0.5, 0.5, 0.5]);
    }

    #[tokio::test]
    async fn test_missing_model_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "model \"nomic\" not found, try pulling it first"
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new()
            .with_base_url(server.uri())
            .with_model("nomic");
        let err = provider.embed("hello").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::ModelMissing { ref model } if model == "nomic"));
    }

    #[tokio::test]
    async fn test_count_mismatch_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[1.0]]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = provider.embed_batch(&texts).await.unwrap_err();

        assert!(matches!(err, EmbeddingError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_service_unavailable() {
        // Port 9 (discard) is not expected to host an HTTP server.
        let provider = OllamaProvider::new().with_base_url("http://127.0.0.1:9");
        let err = provider.embed("hello").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::ServiceUnavailable { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_ensure_model_accepts_latest_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "mxbai-embed-large:latest"}, {"name": "llama3.2:latest"}]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::new().with_base_url(server.uri());
        provider.ensure_model().await.unwrap();

        let missing = OllamaProvider::new()
            .with_base_url(server.uri())
            .with_model("all-minilm");
        assert!(matches!(
            missing.ensure_model().await,
            Err(EmbeddingError::ModelMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embeddings": [[1.0]] }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::new()
            .with_base_url(server.uri())
            .with_timeout(Duration::from_millis(100))
            .unwrap();
        let err = provider.embed("hello").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::ServiceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_ensure_installed_checks_any_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [{"name": "llama3.2:latest"}]
            })))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        ensure_installed(&client, &server.uri(), "llama3.2").await.unwrap();
        let err = ensure_installed(&client, &server.uri(), "mistral")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "model 'mistral' is not installed; pull it first (e.g. `ollama pull mistral`)"
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = OllamaProvider::new().with_base_url("http://ollama:11434/");
        assert_eq!(provider.base_url(), "http://ollama:11434");
    }
}
