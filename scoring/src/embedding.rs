//! Embedding-backed semantic similarity.
//!
//! Correctness scoring compares a captured answer to its reference by
//! embedding both texts and taking the cosine of the normalized vectors.
//! The embedding backend is an Ollama instance reached over HTTP; tests
//! inject a stub [`Embedder`] instead of a live backend.

use crate::config::EmbeddingConfig;
use crate::error::{ScoringError, ScoringResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// A text embedding backend. Implementations must return L2-normalized
/// vectors so that cosine similarity reduces to a dot product.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> ScoringResult<Vec<f32>>;

    fn embedder_name(&self) -> &'static str;
}

/// Shared handle to the process-wide embedding backend.
pub type SharedEmbedder = Arc<dyn Embedder>;

static GLOBAL_EMBEDDER: OnceLock<SharedEmbedder> = OnceLock::new();

/// Install the process-wide embedder. Later calls are no-ops; the first
/// installed instance wins for the lifetime of the process.
pub fn init_global(embedder: SharedEmbedder) -> &'static SharedEmbedder {
    GLOBAL_EMBEDDER.get_or_init(|| embedder)
}

/// The process-wide embedder, if one has been installed.
pub fn global() -> Option<&'static SharedEmbedder> {
    GLOBAL_EMBEDDER.get()
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedder backed by Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

impl OllamaEmbedder {
    pub fn new(config: EmbeddingConfig) -> ScoringResult<Self> {
        config
            .validate()
            .map_err(|msg| ScoringError::InvalidConfig { message: msg })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScoringError::Embedding {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn with_default_config() -> ScoringResult<Self> {
        Self::new(EmbeddingConfig::default())
    }

    fn handle_http_error(err: reqwest::Error) -> ScoringError {
        if err.is_timeout() {
            ScoringError::Embedding {
                message: "Embedding request timed out".to_string(),
            }
        } else if err.is_connect() {
            ScoringError::Embedding {
                message: "Cannot connect to embedding backend".to_string(),
            }
        } else {
            ScoringError::Network(err)
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> ScoringResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);
        let request = OllamaEmbeddingRequest {
            model: &self.config.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Self::handle_http_error)?;

        if !response.status().is_success() {
            return Err(ScoringError::Embedding {
                message: format!("Embedding backend returned {}", response.status()),
            });
        }

        let body: OllamaEmbeddingResponse =
            response.json().await.map_err(Self::handle_http_error)?;

        if body.embedding.is_empty() {
            return Err(ScoringError::Embedding {
                message: format!(
                    "Backend returned an empty embedding for model '{}'",
                    self.config.model
                ),
            });
        }

        debug!(dims = body.embedding.len(), "embedded text");
        Ok(normalize(body.embedding))
    }

    fn embedder_name(&self) -> &'static str {
        "ollama"
    }
}

/// Scale a vector to unit length. Zero vectors are returned unchanged;
/// their similarity against anything is 0.
pub fn normalize(mut vec: Vec<f32>) -> Vec<f32> {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in &mut vec {
            *x /= norm;
        }
    }
    vec
}

/// Cosine similarity of two normalized vectors, clamped to [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> ScoringResult<f32> {
    if a.len() != b.len() {
        return Err(ScoringError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    Ok(dot.clamp(-1.0, 1.0))
}

/// Embed two texts and return their cosine similarity.
pub async fn semantic_similarity(
    embedder: &dyn Embedder,
    text_a: &str,
    text_b: &str,
) -> ScoringResult<f32> {
    let vec_a = embedder.embed(text_a).await?;
    let vec_b = embedder.embed(text_b).await?;
    cosine_similarity(&vec_a, &vec_b)
}

/// Compare a model answer against a reference. Passes iff the similarity
/// score meets the threshold (boundary inclusive).
pub async fn is_correct(
    embedder: &dyn Embedder,
    model_answer: &str,
    reference: &str,
    threshold: f64,
) -> ScoringResult<(bool, f64)> {
    let score = semantic_similarity(embedder, model_answer, reference).await? as f64;
    Ok((score >= threshold, score))
}
