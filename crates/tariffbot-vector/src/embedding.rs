//! Embedding service trait and implementations.
//!
//! - `HashingEmbedding` maps word and word-bigram features into a fixed
//!   number of signed buckets. Local, deterministic, no network. Used in
//!   fallback-only mode and whenever remote embedding is unavailable.
//! - `OpenAiEmbedding` calls an OpenAI-compatible `/embeddings` endpoint.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tariffbot_core::error::TariffError;

/// Service for generating text embeddings.
///
/// Documents and queries must be embedded by the same service for their
/// similarity scores to be meaningful.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, TariffError>> + Send;

    /// Embed several texts. The default embeds them one at a time.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, TariffError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, which is not
/// object-safe. This trait boxes the future instead so a retriever can hold
/// an `Arc<dyn DynEmbeddingService>` chosen at startup.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, TariffError>>;

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, TariffError>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>, TariffError>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(
        &'a self,
        texts: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, TariffError>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in vector.iter_mut() {
            *val /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// HashingEmbedding - local feature hashing
// ---------------------------------------------------------------------------

/// Feature-hashing embedder over lower-cased words and adjacent word pairs.
///
/// Texts sharing vocabulary land close together, which is enough to rank
/// passages of a single reference document against a question.
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimensions: usize,
}

impl HashingEmbedding {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let mut hasher = DefaultHasher::new();
        feature.hash(&mut hasher);
        let h = hasher.finish();
        let index = (h % self.dimensions as u64) as usize;
        let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .map(|w| w.to_lowercase())
            .collect();

        let mut vector = vec![0.0f32; self.dimensions];
        for word in &words {
            let (i, sign) = self.bucket(word);
            vector[i] += sign;
        }
        for pair in words.windows(2) {
            let (i, sign) = self.bucket(&format!("{} {}", pair[0], pair[1]));
            vector[i] += 0.5 * sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

impl EmbeddingService for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, TariffError> {
        if text.trim().is_empty() {
            return Err(TariffError::Embedding("Cannot embed empty text".to_string()));
        }
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// OpenAiEmbedding - remote embeddings endpoint
// ---------------------------------------------------------------------------

/// Inputs per `/embeddings` request.
const BATCH_SIZE: usize = 64;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embeddings API.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedding {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedding {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: &str,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, TariffError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TariffError::Embedding(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            dimensions,
        })
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>, TariffError> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| TariffError::Embedding(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TariffError::Embedding(format!(
                "Embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| TariffError::Embedding(format!("Malformed embedding response: {}", e)))?;
        if parsed.data.len() != input.len() {
            return Err(TariffError::Embedding(format!(
                "Expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl EmbeddingService for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, TariffError> {
        if text.trim().is_empty() {
            return Err(TariffError::Embedding("Cannot embed empty text".to_string()));
        }
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| TariffError::Embedding("Empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TariffError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            debug!(size = batch.len(), model = %self.model, "Embedding batch");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn test_hashing_dimension() {
        let service = HashingEmbedding::new(128);
        let vec = service.embed("free trade agreement").await.unwrap();
        assert_eq!(vec.len(), 128);
        assert_eq!(EmbeddingService::dimensions(&service), 128);
    }

    #[tokio::test]
    async fn test_hashing_deterministic_and_normalized() {
        let service = HashingEmbedding::default();
        let v1 = service.embed("same text").await.unwrap();
        let v2 = service.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
        let norm: f32 = v1.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hashing_shared_vocabulary_scores_higher() {
        let service = HashingEmbedding::default();
        let query = service
            .embed("United States-Israel Free Trade Agreement")
            .await
            .unwrap();
        let related = service
            .embed("Products of Israel under the United States-Israel Free Trade Area Implementation Act")
            .await
            .unwrap();
        let unrelated = service
            .embed("Rules of origin for textile and apparel goods of Haiti")
            .await
            .unwrap();
        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_hashing_case_insensitive() {
        let service = HashingEmbedding::default();
        let a = service.embed("Israel").await.unwrap();
        let b = service.embed("israel").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_hashing_empty_text() {
        let service = HashingEmbedding::default();
        assert!(service.embed("").await.is_err());
        assert!(service.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_default_batch_through_dyn() {
        let service: Box<dyn DynEmbeddingService> = Box::new(HashingEmbedding::new(64));
        let texts = vec!["one text".to_string(), "another text".to_string()];
        let vectors = service.embed_batch_boxed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], service.embed_boxed("one text").await.unwrap());
    }

    #[tokio::test]
    async fn test_openai_unreachable_is_embedding_error() {
        let service = OpenAiEmbedding::new(
            "http://127.0.0.1:9",
            "sk-test".to_string(),
            "text-embedding-3-small",
            1536,
            Duration::from_secs(2),
        )
        .unwrap();
        let err = service.embed("hello").await.unwrap_err();
        assert!(matches!(err, TariffError::Embedding(_)));
    }
}
