//! TF-IDF index construction.
//!
//! An [`Index`] is built once from the whole chunk corpus and is immutable
//! afterwards. It bundles:
//!
//! - the [`Vocabulary`] (term → column),
//! - one inverse-document-frequency weight per column,
//! - one unit-length [`SparseVector`] per chunk, aligned with
//! - the [`Chunk`]s themselves, in ordinal order.
//!
//! # Build Algorithm
//!
//! 1. Tokenize every chunk with [`tokenize`].
//! 2. Count corpus-wide term frequency and per-term document frequency.
//! 3. If the corpus has more distinct terms than `max_features`, keep the
//!    most frequent ones (ties broken alphabetically).
//! 4. Assign columns in alphabetical term order.
//! 5. `idf(t) = ln((1 + n) / (1 + df(t))) + 1`.
//! 6. Each chunk vector holds `tf × idf` per term, L2-normalized. A chunk with
//!    no vocabulary terms keeps an empty vector.
//!
//! The same input always produces the same vocabulary, weights, and vectors.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::tokenize::tokenize;

/// Default cap on vocabulary size.
pub const DEFAULT_MAX_FEATURES: usize = 40_000;

/// One unit of corpus input: a chunk's text and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInput {
    pub text: String,
    pub source_label: String,
}

impl ChunkInput {
    pub fn new(text: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_label: source_label.into(),
        }
    }
}

/// An indexed chunk. `id` is its ordinal position in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    pub text: String,
    pub source_label: String,
}

/// Mapping from normalized term to column. Serialized as the term list,
/// where a term's position is its column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    terms: Vec<String>,
    columns: HashMap<String, usize>,
}

impl Vocabulary {
    /// Column of `term`, if it was indexed.
    pub fn column(&self, term: &str) -> Option<usize> {
        self.columns.get(term).copied()
    }

    /// Term stored at `column`.
    pub fn term(&self, column: usize) -> Option<&str> {
        self.terms.get(column).map(String::as_str)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(terms: Vec<String>) -> Self {
        let columns = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { terms, columns }
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.terms
    }
}

/// Sparse vector as `(column, weight)` pairs sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Build a unit-length vector from raw column weights.
    ///
    /// All-zero input yields the empty (zero) vector.
    pub fn normalized(weights: BTreeMap<usize, f64>) -> Self {
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            return Self::default();
        }
        Self {
            entries: weights
                .into_iter()
                .filter(|(_, w)| *w != 0.0)
                .map(|(c, w)| (c, w / norm))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dot product by merging the two sorted entry lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (ca, wa) = self.entries[i];
            let (cb, wb) = other.entries[j];
            match ca.cmp(&cb) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Euclidean length.
    pub fn norm(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt()
    }
}

/// Index construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOptions {
    /// Keep at most this many terms, by corpus-wide frequency. `None` keeps all.
    pub max_features: Option<usize>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_features: Some(DEFAULT_MAX_FEATURES),
        }
    }
}

/// Immutable retrieval index. See the [module docs](self) for how it is built.
///
/// Deserializing an `Index` re-checks its alignment invariants, so a
/// structurally broken artifact never yields a usable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IndexParts")]
pub struct Index {
    vocabulary: Vocabulary,
    idf: Vec<f64>,
    chunk_vectors: Vec<SparseVector>,
    chunks: Vec<Chunk>,
}

#[derive(Deserialize)]
struct IndexParts {
    vocabulary: Vocabulary,
    idf: Vec<f64>,
    chunk_vectors: Vec<SparseVector>,
    chunks: Vec<Chunk>,
}

impl TryFrom<IndexParts> for Index {
    type Error = RagError;

    fn try_from(parts: IndexParts) -> Result<Self> {
        let index = Index {
            vocabulary: parts.vocabulary,
            idf: parts.idf,
            chunk_vectors: parts.chunk_vectors,
            chunks: parts.chunks,
        };
        index.validate()?;
        Ok(index)
    }
}

impl Index {
    /// Build an index over `chunks`, in the order given.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyCorpus`] if `chunks` is empty.
    /// - [`RagError::InvalidConfiguration`] if `max_features` is `Some(0)`.
    pub fn build(chunks: Vec<ChunkInput>, options: &IndexOptions) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus);
        }
        if options.max_features == Some(0) {
            return Err(RagError::InvalidConfiguration(
                "max_features must be >= 1".to_string(),
            ));
        }

        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();

        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = Vec::with_capacity(tokens.len());
            for t in tokens {
                *term_freq.entry(t.as_str()).or_insert(0) += 1;
                seen.push(t.as_str());
            }
            seen.sort_unstable();
            seen.dedup();
            for t in seen {
                *doc_freq.entry(t).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<&str> = term_freq.keys().copied().collect();
        if let Some(max) = options.max_features {
            if terms.len() > max {
                terms.sort_unstable_by(|a, b| term_freq[b].cmp(&term_freq[a]).then(a.cmp(b)));
                terms.truncate(max);
            }
        }
        terms.sort_unstable();

        let n = chunks.len() as f64;
        let idf: Vec<f64> = terms
            .iter()
            .map(|t| ((1.0 + n) / (1.0 + doc_freq[t] as f64)).ln() + 1.0)
            .collect();
        let vocabulary = Vocabulary::from(terms.iter().map(|t| t.to_string()).collect::<Vec<_>>());

        let chunk_vectors: Vec<SparseVector> = tokenized
            .iter()
            .map(|tokens| weigh(&vocabulary, &idf, tokens))
            .collect();

        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .enumerate()
            .map(|(id, c)| Chunk {
                id,
                text: c.text,
                source_label: c.source_label,
            })
            .collect();

        Ok(Self {
            vocabulary,
            idf,
            chunk_vectors,
            chunks,
        })
    }

    /// Project already-tokenized terms into this index's weighting space.
    ///
    /// Terms outside the vocabulary are ignored.
    pub fn vectorize(&self, tokens: &[String]) -> SparseVector {
        weigh(&self.vocabulary, &self.idf, tokens)
    }

    /// Check the structural invariants a loaded index must satisfy.
    ///
    /// # Errors
    ///
    /// [`RagError::IndexLoadFailure`] naming the first broken invariant.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| -> Result<()> { Err(RagError::IndexLoadFailure(msg)) };

        if self.chunks.is_empty() {
            return fail("index contains no chunks".to_string());
        }
        if self.chunk_vectors.len() != self.chunks.len() {
            return fail(format!(
                "{} chunk vectors for {} chunks",
                self.chunk_vectors.len(),
                self.chunks.len()
            ));
        }
        if self.idf.len() != self.vocabulary.len() {
            return fail(format!(
                "{} idf weights for {} vocabulary terms",
                self.idf.len(),
                self.vocabulary.len()
            ));
        }
        if self.vocabulary.columns.len() != self.vocabulary.terms.len() {
            return fail("vocabulary contains duplicate terms".to_string());
        }
        for (i, chunk) in self.chunks.iter().enumerate() {
            if chunk.id != i {
                return fail(format!("chunk at position {} has id {}", i, chunk.id));
            }
        }
        if let Some(col) = self.idf.iter().position(|w| !is_positive_weight(*w)) {
            return fail(format!("idf weight for column {} is not a positive number", col));
        }
        let dims = self.vocabulary.len();
        for (i, v) in self.chunk_vectors.iter().enumerate() {
            if v.entries.iter().any(|(_, w)| !is_positive_weight(*w)) {
                return fail(format!(
                    "chunk vector {} has a weight that is not a positive number",
                    i
                ));
            }
            if v.entries.iter().any(|(c, _)| *c >= dims) {
                return fail(format!(
                    "chunk vector {} references a column outside the vocabulary ({} terms)",
                    i, dims
                ));
            }
            if v.entries.windows(2).any(|w| w[0].0 >= w[1].0) {
                return fail(format!("chunk vector {} is not sorted by column", i));
            }
        }
        Ok(())
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn chunk_vectors(&self) -> &[SparseVector] {
        &self.chunk_vectors
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn weigh(vocabulary: &Vocabulary, idf: &[f64], tokens: &[String]) -> SparseVector {
    let mut weights: BTreeMap<usize, f64> = BTreeMap::new();
    for t in tokens {
        if let Some(col) = vocabulary.column(t) {
            *weights.entry(col).or_insert(0.0) += 1.0;
        }
    }
    for (col, w) in weights.iter_mut() {
        *w *= idf[*col];
    }
    SparseVector::normalized(weights)
}

fn is_positive_weight(w: f64) -> bool {
    w.is_finite() && w > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<ChunkInput> {
        vec![
            ChunkInput::new("Physical AI refers to embodied agents.", "chunk_000.txt"),
            ChunkInput::new("ROS 2 is middleware for robots.", "chunk_001.txt"),
            ChunkInput::new("Gazebo is a physics simulator.", "chunk_002.txt"),
        ]
    }

    #[test]
    fn test_empty_corpus_rejected() {
        assert_eq!(
            Index::build(Vec::new(), &IndexOptions::default()),
            Err(RagError::EmptyCorpus)
        );
    }

    #[test]
    fn test_zero_max_features_rejected() {
        let opts = IndexOptions {
            max_features: Some(0),
        };
        assert!(matches!(
            Index::build(corpus(), &opts),
            Err(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_alignment_and_ids() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.chunk_vectors().len(), index.chunks().len());
        for (i, c) in index.chunks().iter().enumerate() {
            assert_eq!(c.id, i);
        }
        assert_eq!(index.chunks()[1].source_label, "chunk_001.txt");
        assert!(index.validate().is_ok());
    }

    #[test]
    fn test_vocabulary_alphabetical_without_stopwords() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        let terms = index.vocabulary().terms();
        let mut sorted = terms.to_vec();
        sorted.sort();
        assert_eq!(terms, sorted.as_slice());
        assert!(index.vocabulary().column("ros").is_some());
        assert!(index.vocabulary().column("is").is_none());
        assert!(index.vocabulary().column("2").is_none());
        assert_eq!(index.idf().len(), index.vocabulary().len());
    }

    #[test]
    fn test_idf_lower_for_common_terms() {
        let chunks = vec![
            ChunkInput::new("robot arm", "a"),
            ChunkInput::new("robot leg", "b"),
            ChunkInput::new("robot wheel", "c"),
        ];
        let index = Index::build(chunks, &IndexOptions::default()).unwrap();
        let vocab = index.vocabulary();
        let robot = index.idf()[vocab.column("robot").unwrap()];
        let arm = index.idf()[vocab.column("arm").unwrap()];
        assert!((robot - 1.0).abs() < 1e-12);
        assert!((arm - ((4.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
        assert!(robot < arm);
    }

    #[test]
    fn test_vectors_unit_length() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        for v in index.chunk_vectors() {
            assert!((v.norm() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_chunk_without_terms_keeps_zero_vector() {
        let chunks = vec![
            ChunkInput::new("robots move things", "a"),
            ChunkInput::new("   ", "b"),
            ChunkInput::new("the and of", "c"),
        ];
        let index = Index::build(chunks, &IndexOptions::default()).unwrap();
        assert_eq!(index.len(), 3);
        assert!(!index.chunk_vectors()[0].is_zero());
        assert!(index.chunk_vectors()[1].is_zero());
        assert!(index.chunk_vectors()[2].is_zero());
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let chunks = vec![
            ChunkInput::new("robot robot robot gazebo gazebo zebra", "a"),
            ChunkInput::new("robot apple", "b"),
        ];
        let opts = IndexOptions {
            max_features: Some(2),
        };
        let index = Index::build(chunks, &opts).unwrap();
        assert_eq!(index.vocabulary().terms(), &["gazebo", "robot"]);
    }

    #[test]
    fn test_max_features_ties_alphabetical() {
        let chunks = vec![ChunkInput::new("delta charlie bravo alpha", "a")];
        let opts = IndexOptions {
            max_features: Some(3),
        };
        let index = Index::build(chunks, &opts).unwrap();
        assert_eq!(index.vocabulary().terms(), &["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = Index::build(corpus(), &IndexOptions::default()).unwrap();
        let b = Index::build(corpus(), &IndexOptions::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sparse_dot() {
        let a = SparseVector {
            entries: vec![(0, 1.0), (2, 2.0), (5, 1.0)],
        };
        let b = SparseVector {
            entries: vec![(2, 3.0), (4, 1.0), (5, 2.0)],
        };
        assert!((a.dot(&b) - 8.0).abs() < 1e-12);
        assert_eq!(a.dot(&SparseVector::default()), 0.0);
    }

    #[test]
    fn test_deserialize_rejects_misaligned_index() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        let mut json = serde_json::to_value(&index).unwrap();
        json["chunk_vectors"].as_array_mut().unwrap().pop();
        let err = serde_json::from_value::<Index>(json).unwrap_err();
        assert!(err.to_string().contains("chunk vectors"));
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_column() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        let mut json = serde_json::to_value(&index).unwrap();
        json["chunk_vectors"][0] = serde_json::json!([[9999, 1.0]]);
        assert!(serde_json::from_value::<Index>(json).is_err());
    }

    #[test]
    fn test_deserialize_rejects_non_positive_weights() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        let clean = serde_json::to_value(&index).unwrap();

        let mut json = clean.clone();
        json["chunk_vectors"][0][0][1] = serde_json::json!(-0.5);
        let err = serde_json::from_value::<Index>(json).unwrap_err();
        assert!(err.to_string().contains("chunk vector 0"));

        let mut json = clean.clone();
        json["chunk_vectors"][1][0][1] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<Index>(json).is_err());

        let mut json = clean.clone();
        json["idf"][0] = serde_json::json!(0.0);
        let err = serde_json::from_value::<Index>(json).unwrap_err();
        assert!(err.to_string().contains("idf weight"));

        let mut json = clean;
        json["idf"][1] = serde_json::json!(-1.25);
        assert!(serde_json::from_value::<Index>(json).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let index = Index::build(corpus(), &IndexOptions::default()).unwrap();
        let json = serde_json::to_value(&index).unwrap();
        assert!(json["vocabulary"].is_array());
        assert!(json["idf"].is_array());
        assert_eq!(json["chunks"][2]["source_label"], "chunk_002.txt");
        let back: Index = serde_json::from_value(json).unwrap();
        assert_eq!(back.vocabulary(), index.vocabulary());
        assert_eq!(back.len(), 3);
    }
}
