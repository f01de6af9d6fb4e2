//! Embedding clients for the OpenAI and Ollama HTTP APIs.
//!
//! The store only ever talks to [`EmbeddingClient`]: build one from the
//! `[embedding]` config section, then call [`EmbeddingClient::embed`] or
//! [`EmbeddingClient::embed_one`]. Construction fails when the provider is
//! `disabled` or misconfigured, so a client in hand is always usable.
//!
//! Transient failures retry with exponential backoff (1s, 2s, 4s, ...
//! capped at 32s): HTTP 429, 5xx, and network errors retry; any other
//! client error fails immediately. Returned vectors are checked against the
//! configured `dims` so a model mismatch surfaces at embed time instead of
//! as garbage similarity scores.
//!
//! Vectors persist as little-endian f32 BLOBs; [`vec_to_blob`],
//! [`blob_to_vec`], and [`cosine_similarity`] encode and score them.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;

use crate::config::EmbeddingConfig;

/// A configured embedding backend.
pub enum EmbeddingClient {
    OpenAi(OpenAiClient),
    Ollama(OllamaClient),
}

impl EmbeddingClient {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        match config.provider.as_str() {
            "openai" => Ok(Self::OpenAi(OpenAiClient::new(config)?)),
            "ollama" => Ok(Self::Ollama(OllamaClient::new(config)?)),
            "disabled" => bail!("Embedding provider is disabled"),
            other => bail!("Unknown embedding provider: {}", other),
        }
    }

    /// Embed a batch of texts: one vector per input, in input order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match self {
            Self::OpenAi(c) => c.embed(texts).await,
            Self::Ollama(c) => c.embed(texts).await,
        }
    }

    /// Embed a single query string.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        if vectors.is_empty() {
            bail!("Empty embedding response");
        }
        Ok(vectors.remove(0))
    }
}

/// Client for `POST /v1/embeddings` on the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiClient {
    http: reqwest::Client,
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
}

impl OpenAiClient {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("embedding.model required for the openai provider")?;
        let dims = config
            .dims
            .context("embedding.dims required for the openai provider")?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set")?;

        Ok(Self {
            http: http_client(config)?,
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            backoff(attempt).await;

            let resp = self
                .http
                .post("https://api.openai.com/v1/embeddings")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) if response.status().is_success() => {
                    let json: serde_json::Value = response.json().await?;
                    let vectors = parse_openai(&json)?;
                    check_dims(&vectors, self.dims)?;
                    return Ok(vectors);
                }
                Ok(response) if retryable(response.status()) => {
                    last_err = Some(api_error("OpenAI", response).await);
                }
                Ok(response) => return Err(api_error("OpenAI", response).await),
                Err(e) => last_err = Some(e.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("OpenAI embedding failed after retries")))
    }
}

fn parse_openai(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .context("Invalid OpenAI response: missing data array")?;

    data.iter()
        .map(|item| {
            let arr = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .context("Invalid OpenAI response: missing embedding")?;
            Ok(arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
        })
        .collect()
}

/// Client for `POST /api/embed` on a local Ollama instance.
///
/// Needs an embedding model pulled first, e.g.
/// `ollama pull nomic-embed-text`.
pub struct OllamaClient {
    http: reqwest::Client,
    model: String,
    dims: usize,
    endpoint: String,
    max_retries: u32,
}

impl OllamaClient {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .context("embedding.model required for the ollama provider")?;
        let dims = config
            .dims
            .context("embedding.dims required for the ollama provider")?;
        let base = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            http: http_client(config)?,
            model,
            dims,
            endpoint: format!("{}/api/embed", base.trim_end_matches('/')),
            max_retries: config.max_retries,
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            backoff(attempt).await;

            let resp = self.http.post(&self.endpoint).json(&body).send().await;

            match resp {
                Ok(response) if response.status().is_success() => {
                    let json: serde_json::Value = response.json().await?;
                    let vectors = parse_ollama(&json)?;
                    check_dims(&vectors, self.dims)?;
                    return Ok(vectors);
                }
                Ok(response) if retryable(response.status()) => {
                    last_err = Some(api_error("Ollama", response).await);
                }
                Ok(response) => return Err(api_error("Ollama", response).await),
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.endpoint,
                        e
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama embedding failed after retries")))
    }
}

fn parse_ollama(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .context("Invalid Ollama response: missing embeddings array")?;

    embeddings
        .iter()
        .map(|embedding| {
            let arr = embedding
                .as_array()
                .context("Invalid Ollama response: embedding is not an array")?;
            Ok(arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
        })
        .collect()
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Sleep before retry `attempt`; a no-op on the first try.
async fn backoff(attempt: u32) {
    if attempt > 0 {
        tokio::time::sleep(Duration::from_secs(1 << (attempt - 1).min(5))).await;
    }
}

fn retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn api_error(which: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::anyhow!("{} API error {}: {}", which, status, body)
}

fn check_dims(vectors: &[Vec<f32>], dims: usize) -> Result<()> {
    for v in vectors {
        if v.len() != dims {
            bail!(
                "Embedding has {} dimensions, expected {} — wrong model configured?",
                v.len(),
                dims
            );
        }
    }
    Ok(())
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB back into a float vector. Trailing partial floats are
/// dropped.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity of two vectors; `0.0` for empty or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_disabled_config_has_no_client() {
        let config = EmbeddingConfig::default();
        assert!(EmbeddingClient::from_config(&config).is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "azure".to_string(),
            ..Default::default()
        };
        assert!(EmbeddingClient::from_config(&config).is_err());
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!retryable(StatusCode::BAD_REQUEST));
        assert!(!retryable(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_check_dims_rejects_mismatch() {
        let vectors = vec![vec![0.0f32; 8], vec![0.0f32; 4]];
        assert!(check_dims(&vectors, 8).is_err());
        assert!(check_dims(&vectors[..1].to_vec(), 8).is_ok());
    }
}
