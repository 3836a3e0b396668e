//! Document retriever: the reference document, chunked and embedded once at
//! startup, searched by cosine similarity per query.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use tariffbot_core::error::TariffError;
use tariffbot_core::types::RetrievedPassage;

use crate::chunker::{Chunk, TextChunker};
use crate::embedding::DynEmbeddingService;
use crate::index::VectorIndex;

/// Immutable passage index over one reference document.
///
/// An optional second index over the same passages, built with a local
/// embedder, answers queries the primary embedder fails to embed.
pub struct DocumentRetriever {
    chunks: Vec<Chunk>,
    index: VectorIndex,
    embedder: Arc<dyn DynEmbeddingService>,
    local: Option<LocalIndex>,
}

struct LocalIndex {
    index: VectorIndex,
    embedder: Arc<dyn DynEmbeddingService>,
}

impl DocumentRetriever {
    /// Chunk and embed `text`.
    pub async fn build(
        text: &str,
        chunker: TextChunker,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Result<Self, TariffError> {
        let chunks = chunker.split(text);
        let index = index_chunks(&chunks, embedder.as_ref()).await?;

        info!(passages = chunks.len(), "Reference document indexed");
        Ok(Self {
            chunks,
            index,
            embedder,
            local: None,
        })
    }

    /// Also index the passages with `embedder`. Queries fall back to this
    /// index when the primary embedder fails.
    pub async fn with_local_fallback(
        mut self,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Result<Self, TariffError> {
        let index = index_chunks(&self.chunks, embedder.as_ref()).await?;
        debug!(dimensions = index.dimensions(), "Local fallback index built");
        self.local = Some(LocalIndex { index, embedder });
        Ok(self)
    }

    /// Read a pre-extracted UTF-8 document from disk and build the index.
    pub async fn from_file(
        path: &Path,
        chunker: TextChunker,
        embedder: Arc<dyn DynEmbeddingService>,
    ) -> Result<Self, TariffError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            TariffError::Retrieval(format!(
                "Failed to read reference document {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::build(&text, chunker, embedder).await
    }

    /// A retriever with no passages. Every query returns nothing.
    pub fn empty(embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self {
            chunks: Vec::new(),
            index: VectorIndex::new(embedder.dimensions()),
            embedder,
            local: None,
        }
    }

    /// Top `k` passages for `query`, highest score first, ties in document
    /// order.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, TariffError> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let hits = match self.embedder.embed_boxed(query).await {
            Ok(query_vec) => self.index.search(&query_vec, k)?,
            Err(e) => {
                let Some(local) = &self.local else {
                    return Err(e);
                };
                warn!(error = %e, "Query embedding failed; searching the local index");
                let query_vec = local.embedder.embed_boxed(query).await?;
                local.index.search(&query_vec, k)?
            }
        };

        let passages: Vec<RetrievedPassage> = hits
            .into_iter()
            .filter_map(|hit| {
                self.chunks.get(hit.position).map(|chunk| RetrievedPassage {
                    text: chunk.text.clone(),
                    offset: chunk.offset,
                    ordinal: chunk.ordinal,
                    score: hit.score,
                })
            })
            .collect();

        debug!(k, returned = passages.len(), "Passages retrieved");
        Ok(passages)
    }

    pub fn passage_count(&self) -> usize {
        self.chunks.len()
    }
}

async fn index_chunks(
    chunks: &[Chunk],
    embedder: &dyn DynEmbeddingService,
) -> Result<VectorIndex, TariffError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch_boxed(&texts).await?;
    if vectors.len() != chunks.len() {
        return Err(TariffError::Retrieval(format!(
            "Embedded {} of {} passages",
            vectors.len(),
            chunks.len()
        )));
    }

    let mut index = VectorIndex::new(embedder.dimensions());
    for vector in vectors {
        index.insert(vector)?;
    }
    Ok(index)
}

impl std::fmt::Debug for DocumentRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentRetriever")
            .field("passages", &self.chunks.len())
            .field("dimensions", &self.index.dimensions())
            .field("local_fallback", &self.local.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::embedding::{EmbeddingService, HashingEmbedding};

    const NOTES: &str = "\
General Note 3(a). Rates of duty in column 1 apply to all products except those of countries enumerated in column 2.

General Note 8. Products of Israel. The United States-Israel Free Trade Area Implementation Act provides duty-free treatment for eligible products of Israel.

General Note 11. Products of Canada and Mexico under the North American Free Trade Agreement.

General Note 3(b). Column 2 rates apply to products of Cuba and North Korea.";

    fn embedder() -> Arc<dyn DynEmbeddingService> {
        Arc::new(HashingEmbedding::new(256))
    }

    /// Embeds normally until `down` is set, then fails like an unreachable
    /// endpoint.
    struct OutageEmbedding {
        inner: HashingEmbedding,
        down: AtomicBool,
    }

    impl EmbeddingService for OutageEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, TariffError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(TariffError::Embedding("connection refused".to_string()));
            }
            self.inner.embed(text).await
        }

        fn dimensions(&self) -> usize {
            EmbeddingService::dimensions(&self.inner)
        }
    }

    fn outage() -> Arc<OutageEmbedding> {
        Arc::new(OutageEmbedding {
            inner: HashingEmbedding::new(128),
            down: AtomicBool::new(false),
        })
    }

    async fn retriever() -> DocumentRetriever {
        DocumentRetriever::build(NOTES, TextChunker::new(160, 20).unwrap(), embedder())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_build_indexes_every_chunk() {
        let r = retriever().await;
        assert!(r.passage_count() >= 3);
    }

    #[tokio::test]
    async fn test_retrieve_relevant_passage_first() {
        let r = retriever().await;
        let passages = r
            .retrieve("What is the United States-Israel Free Trade Agreement?", 3)
            .await
            .unwrap();
        assert_eq!(passages.len(), 3);
        assert!(passages[0].text.contains("Israel"));
    }

    #[tokio::test]
    async fn test_scores_non_increasing_and_offsets_valid() {
        let r = retriever().await;
        let passages = r.retrieve("column 2 rates of duty", 10).await.unwrap();
        assert!(passages.windows(2).all(|w| w[0].score >= w[1].score));
        for p in &passages {
            assert_eq!(&NOTES[p.offset..p.offset + p.text.len()], p.text);
        }
    }

    #[tokio::test]
    async fn test_equal_scores_keep_document_order() {
        // Identical passages embed identically, so they tie.
        let text = "alpha beta gamma.\n\nalpha beta gamma.\n\nalpha beta gamma.";
        let r = DocumentRetriever::build(text, TextChunker::new(20, 2).unwrap(), embedder())
            .await
            .unwrap();
        let passages = r.retrieve("alpha beta", 3).await.unwrap();
        let ordinals: Vec<usize> = passages.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_empty_retriever_returns_nothing() {
        let r = DocumentRetriever::empty(embedder());
        assert!(r.retrieve("anything", 4).await.unwrap().is_empty());
        assert_eq!(r.passage_count(), 0);
    }

    #[tokio::test]
    async fn test_k_zero() {
        let r = retriever().await;
        assert!(r.retrieve("Israel", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_file_missing() {
        let result = DocumentRetriever::from_file(
            Path::new("/nonexistent/general_notes.txt"),
            TextChunker::new(100, 10).unwrap(),
            embedder(),
        )
        .await;
        assert!(matches!(result, Err(TariffError::Retrieval(_))));
    }

    #[tokio::test]
    async fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, NOTES).unwrap();
        let r = DocumentRetriever::from_file(&path, TextChunker::new(160, 20).unwrap(), embedder())
            .await
            .unwrap();
        assert!(r.passage_count() > 0);
    }

    #[tokio::test]
    async fn test_dimension_matches_embedder() {
        let service = HashingEmbedding::new(64);
        assert_eq!(EmbeddingService::dimensions(&service), 64);
        let r = DocumentRetriever::build(NOTES, TextChunker::new(160, 20).unwrap(), Arc::new(service))
            .await
            .unwrap();
        assert!(r.retrieve("Cuba", 1).await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_without_local_index_is_error() {
        let remote = outage();
        let r = DocumentRetriever::build(NOTES, TextChunker::new(160, 20).unwrap(), remote.clone())
            .await
            .unwrap();
        remote.down.store(true, Ordering::SeqCst);
        assert!(matches!(
            r.retrieve("Israel", 2).await,
            Err(TariffError::Embedding(_))
        ));
    }

    #[tokio::test]
    async fn test_query_embedding_failure_uses_local_index() {
        let remote = outage();
        let r = DocumentRetriever::build(NOTES, TextChunker::new(160, 20).unwrap(), remote.clone())
            .await
            .unwrap()
            .with_local_fallback(embedder())
            .await
            .unwrap();
        remote.down.store(true, Ordering::SeqCst);

        let passages = r
            .retrieve("What is the United States-Israel Free Trade Agreement?", 2)
            .await
            .unwrap();
        assert_eq!(passages.len(), 2);
        assert!(passages[0].text.contains("Israel"));
        assert!(passages[0].score >= passages[1].score);
    }
}
