//! # Textbook RAG Core
//!
//! The retrieval engine behind Textbook RAG: overlapping text chunking,
//! TF-IDF index construction, and top-k ranking of chunks for a query.
//!
//! This crate does no filesystem, network, or async work. Index
//! persistence, PDF extraction, and the answer service live in the
//! `textbook-rag` application crate.
//!
//! ```rust
//! use textbook_rag_core::index::{ChunkInput, Index, IndexOptions};
//! use textbook_rag_core::retrieve::query;
//!
//! let chunks = vec![
//!     ChunkInput::new("Physical AI refers to embodied agents.", "chunk_000.txt"),
//!     ChunkInput::new("ROS 2 is middleware for robots.", "chunk_001.txt"),
//!     ChunkInput::new("Gazebo is a physics simulator.", "chunk_002.txt"),
//! ];
//! let index = Index::build(chunks, &IndexOptions::default()).unwrap();
//! let ranked = query(&index, "What is ROS 2?", 2);
//! assert_eq!(ranked[0].chunk.source_label, "chunk_001.txt");
//! ```

pub mod chunk;
pub mod error;
pub mod index;
pub mod retrieve;
pub mod stopwords;
pub mod tokenize;

pub use error::{RagError, Result};
