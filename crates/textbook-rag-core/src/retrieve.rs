//! Top-k ranking of indexed chunks against a free-text query.
//!
//! # Ranking Algorithm
//!
//! 1. Tokenize the query exactly like the corpus and weight it with the
//!    index's stored IDF values (terms outside the vocabulary are ignored).
//! 2. L2-normalize the query vector.
//! 3. Score every chunk by the dot product with its unit-length vector,
//!    i.e. cosine similarity in `[0, 1]`.
//! 4. Sort by score (desc), then chunk id (asc), and keep the first `k`.
//!
//! Ranking never fails. A query with no indexed terms scores every chunk at
//! zero and returns the first `k` chunks in ordinal order.

use std::cmp::Ordering;

use serde::Serialize;

use crate::index::{Chunk, Index, SparseVector};
use crate::tokenize::tokenize;

/// One ranked hit, borrowed from the index it was ranked against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedChunk<'a> {
    pub chunk: &'a Chunk,
    /// Cosine similarity; only comparable within one index.
    pub score: f64,
}

impl<'a> RankedChunk<'a> {
    pub fn source_label(&self) -> &'a str {
        &self.chunk.source_label
    }
}

/// Project `text` into `index`'s vocabulary and weighting space.
pub fn project(index: &Index, text: &str) -> SparseVector {
    index.vectorize(&tokenize(text))
}

/// Rank the chunks of `index` against `text` and return the best `k`.
///
/// Returns `min(k, index.len())` results. `k == 0` yields no results.
///
/// ```rust
/// use textbook_rag_core::index::{ChunkInput, Index, IndexOptions};
/// use textbook_rag_core::retrieve::query;
///
/// let index = Index::build(
///     vec![ChunkInput::new("alpha beta", "a"), ChunkInput::new("gamma", "b")],
///     &IndexOptions::default(),
/// )
/// .unwrap();
/// let ranked = query(&index, "gamma rays", 5);
/// assert_eq!(ranked.len(), 2);
/// assert_eq!(ranked[0].source_label(), "b");
/// ```
pub fn query<'a>(index: &'a Index, text: &str, k: usize) -> Vec<RankedChunk<'a>> {
    if k == 0 {
        return Vec::new();
    }

    let q = project(index, text);
    let mut scored: Vec<(usize, f64)> = index
        .chunk_vectors()
        .iter()
        .enumerate()
        .map(|(id, v)| (id, v.dot(&q)))
        .collect();

    if k < scored.len() {
        scored.select_nth_unstable_by(k - 1, by_rank);
        scored.truncate(k);
    }
    scored.sort_by(by_rank);

    let chunks = index.chunks();
    scored
        .into_iter()
        .map(|(id, score)| RankedChunk {
            chunk: &chunks[id],
            score,
        })
        .collect()
}

fn by_rank(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}
