//! TariffBot vector crate: embedding services, passage chunking, the
//! brute-force cosine index and the document retriever built on them.

pub mod chunker;
pub mod embedding;
pub mod index;
pub mod retriever;

pub use chunker::{Chunk, TextChunker};
pub use embedding::{DynEmbeddingService, EmbeddingService, HashingEmbedding, OpenAiEmbedding};
pub use index::{SearchHit, VectorIndex};
pub use retriever::DocumentRetriever;
