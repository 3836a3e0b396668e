//! In-memory vector index with brute-force cosine similarity search.
//!
//! The reference document is a few hundred passages, so an O(n) scan per
//! query is fast enough and keeps ordering exact.

use tariffbot_core::error::TariffError;

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Insertion position of the matching vector.
    pub position: usize,
    /// Cosine similarity to the query.
    pub score: f64,
}

/// Append-only vector index. Built once, then only searched.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimensions: usize,
    entries: Vec<Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    /// Append a vector; its position is the current length.
    pub fn insert(&mut self, embedding: Vec<f32>) -> Result<usize, TariffError> {
        if embedding.len() != self.dimensions {
            return Err(TariffError::Retrieval(format!(
                "Embedding has {} dimensions, index expects {}",
                embedding.len(),
                self.dimensions
            )));
        }
        self.entries.push(embedding);
        Ok(self.entries.len() - 1)
    }

    /// The `k` nearest vectors by cosine similarity.
    ///
    /// Sorted by descending score. The sort is stable, so equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, TariffError> {
        if query.len() != self.dimensions {
            return Err(TariffError::Retrieval(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<SearchHit> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, embedding)| SearchHit {
                position,
                score: cosine_similarity(query, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Cosine similarity; 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_search() {
        let mut index = VectorIndex::new(3);
        index.insert(vec![1.0, 0.0, 0.0]).unwrap();
        index.insert(vec![0.0, 1.0, 0.0]).unwrap();
        index.insert(vec![0.7, 0.7, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert_eq!(hits[1].position, 2);
    }

    #[test]
    fn test_scores_non_increasing() {
        let mut index = VectorIndex::new(2);
        for i in 0..20 {
            let angle = i as f32 * 0.15;
            index.insert(vec![angle.cos(), angle.sin()]).unwrap();
        }
        let hits = index.search(&[0.3, 0.9], 20).unwrap();
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let mut index = VectorIndex::new(2);
        index.insert(vec![0.0, 1.0]).unwrap();
        index.insert(vec![1.0, 0.0]).unwrap();
        index.insert(vec![0.0, 2.0]).unwrap();
        index.insert(vec![2.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0], 4).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        assert!(index.insert(vec![1.0]).is_err());
        assert!(index.search(&[1.0], 1).is_err());
    }

    #[test]
    fn test_empty_index() {
        let index = VectorIndex::new(3);
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let mut index = VectorIndex::new(2);
        index.insert(vec![0.0, 0.0]).unwrap();
        let hits = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].score, 0.0);
    }
}
