//! # Textbook RAG
//!
//! Retrieval-augmented question answering over a single textbook.
//!
//! The retrieval engine itself (chunking, TF-IDF indexing, top-k ranking)
//! lives in the `textbook-rag-core` crate. This crate wraps it with PDF
//! extraction, the on-disk corpus and index artifact, answer synthesis, and
//! the CLI and HTTP front-ends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌──────────────┐   ┌────────────┐
//! │   PDF   │──▶│ Chunker  │──▶│   Indexer    │──▶│ index.json │
//! └─────────┘   └──────────┘   └──────────────┘   └─────┬──────┘
//!                                                       │ load once
//!                                                       ▼
//!                ┌──────────┐   ┌──────────────┐   ┌────────────┐
//!                │ Answerer │◀──│  Retriever   │◀──│  Service   │
//!                └──────────┘   └──────────────┘   │  Context   │
//!                                                  └─────┬──────┘
//!                                       ┌────────────────┤
//!                                       ▼                ▼
//!                                  ┌─────────┐     ┌──────────┐
//!                                  │   CLI   │     │   HTTP   │
//!                                  │  (rag)  │     │  (axum)  │
//!                                  └─────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest textbook/book.pdf          # extract, chunk, build index
//! rag search "ROS 2 middleware"
//! rag ask "What is Physical AI?"
//! rag serve                              # HTTP API on 127.0.0.1:8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF text extraction and whitespace cleanup |
//! | [`corpus`] | Chunk files on disk |
//! | [`ingest`] | Offline extract → chunk → build pipeline |
//! | [`artifact`] | Index persistence and demo fallback |
//! | [`answer`] | Answer synthesis (extractive or OpenAI-compatible) |
//! | [`service`] | Shared service context |
//! | [`search`] | CLI search and ask output |
//! | [`server`] | HTTP API |

pub mod answer;
pub mod artifact;
pub mod config;
pub mod corpus;
pub mod extract;
pub mod ingest;
pub mod search;
pub mod server;
pub mod service;
