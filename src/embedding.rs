//! Embedding capability.
//!
//! The engine never computes embeddings itself; it consumes an injected
//! [`Embedder`] (`text -> vector`). Two implementations ship with the crate:
//! - **[`DisabledEmbedder`]**: always fails with `EmbeddingUnavailable`; used
//!   when no provider is configured, leaving the engine lexical-only.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed`.
//!
//! # Retry Strategy
//!
//! HTTP 429, 5xx, and network errors are retried with exponential backoff
//! (1s, 2s, 4s, ... capped at 32s). Other 4xx responses fail immediately.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier recorded next to every stored vector.
    fn model_name(&self) -> &str;

    /// Embed one text. Fails with [`Error::EmbeddingUnavailable`] when the
    /// backend cannot produce a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the embedder selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledEmbedder)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        other => Err(Error::InvalidInput(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Disabled ============

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::EmbeddingUnavailable(
            "embedding provider is disabled".into(),
        ))
    }
}

// ============ Ollama ============

/// Embedder backed by a local Ollama server (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingUnavailable(format!("http client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::EmbeddingUnavailable(format!("invalid Ollama response: {}", e))
                        })?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = Error::EmbeddingUnavailable(format!(
                        "Ollama API error {}: {}",
                        status, body_text
                    ));
                    if status.as_u16() == 429 || status.is_server_error() {
                        debug!("retryable embedding failure: {}", err);
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(Error::EmbeddingUnavailable(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::EmbeddingUnavailable("Ollama embedding failed after retries".into())
        }))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::EmbeddingUnavailable("Invalid Ollama response: missing embeddings array".into())
        })?;

    let vec: Vec<f32> = first
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect();

    if vec.is_empty() {
        return Err(Error::EmbeddingUnavailable(
            "Ollama returned an empty embedding".into(),
        ));
    }
    Ok(vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            url: url.to_string(),
            timeout_secs: 5,
            max_retries: 0,
        }
    }

    #[tokio::test]
    async fn test_disabled_is_unavailable() {
        let err = DisabledEmbedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[tokio::test]
    async fn test_ollama_parses_first_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({ "model": "nomic-embed-text" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "nomic-embed-text",
                "embeddings": [[0.5, -1.0, 2.0]]
            })))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&config_for(&server.uri())).unwrap();
        assert_eq!(embedder.embed("hello").await.unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_ollama_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(&config_for(&server.uri())).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingUnavailable(_)));
    }

    #[test]
    fn test_parse_rejects_missing_array() {
        assert!(parse_ollama_response(&serde_json::json!({ "error": "nope" })).is_err());
        assert!(parse_ollama_response(&serde_json::json!({ "embeddings": [[]] })).is_err());
    }

    #[test]
    fn test_create_embedder_by_provider() {
        let disabled = create_embedder(&EmbeddingConfig::default()).unwrap();
        assert_eq!(disabled.model_name(), "disabled");

        let ollama = create_embedder(&config_for("http://localhost:11434")).unwrap();
        assert_eq!(ollama.model_name(), "nomic-embed-text");
    }
}
