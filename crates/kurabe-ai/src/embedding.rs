//! Batch text embeddings over an OpenAI-compatible API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::AiError;

/// Most texts sent in one embedding request.
pub const EMBED_BATCH_SIZE: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A backend that turns texts into vectors for similarity search.
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, AiError>> + Send;
}

/// Embedding client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

impl OpenAiEmbedder {
    /// `base_url` is the API root, like `https://api.openai.com/v1`
    /// (no trailing slash).
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

impl EmbeddingBackend for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!(url = %url, count = texts.len(), "embedding request");
        let resp = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .bearer_auth(&self.api_key)
            .json(&json!({"model": self.model, "input": texts}))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: EmbeddingResponse = resp.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(AiError::Empty);
        }
        // The API documents input order but indexes each item; sort to be sure.
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

/// Embed texts in capped batches, absorbing per-batch failures.
///
/// A failed batch is logged and its texts yield `None`; the remaining
/// batches still run. Output length always equals input length.
pub async fn embed_resilient<E: EmbeddingBackend>(
    backend: &E,
    texts: &[String],
) -> Vec<Option<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH_SIZE) {
        match backend.embed_batch(batch).await {
            Ok(vectors) => out.extend(vectors.into_iter().map(Some)),
            Err(err) => {
                warn!(batch_size = batch.len(), error = %err, "embedding batch failed");
                out.extend(std::iter::repeat_with(|| None).take(batch.len()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails any batch containing a text that starts with "bad".
    struct FlakyBackend;

    impl EmbeddingBackend for FlakyBackend {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiError> {
            if texts.iter().any(|t| t.starts_with("bad")) {
                return Err(AiError::Empty);
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
        }
    }

    #[tokio::test]
    async fn resilient_embedding_absorbs_failed_batches() {
        let texts: Vec<String> = (0..EMBED_BATCH_SIZE)
            .map(|i| format!("text {i}"))
            .chain(std::iter::once("bad text".to_string()))
            .collect();
        let out = embed_resilient(&FlakyBackend, &texts).await;
        assert_eq!(out.len(), texts.len());
        assert!(out[..EMBED_BATCH_SIZE].iter().all(Option::is_some));
        // The second batch holds only the poisoned text and fails alone.
        assert!(out[EMBED_BATCH_SIZE].is_none());
    }

    #[tokio::test]
    async fn resilient_embedding_empty_input() {
        assert!(embed_resilient(&FlakyBackend, &[]).await.is_empty());
    }
}
