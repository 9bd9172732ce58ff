//! Service context shared by the CLI and the HTTP server.
//!
//! [`ServiceContext`] owns everything a request needs: the configuration,
//! the loaded index, and the answerer. It is built once at startup and
//! passed to handlers explicitly.
//!
//! The index sits behind `RwLock<Arc<LoadedIndex>>`. Requests clone the
//! `Arc` and rank against that snapshot without holding the lock, and
//! [`ServiceContext::reload`] builds a complete replacement before swapping
//! it in. A live index is never mutated.

use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

use textbook_rag_core::retrieve::query;
use textbook_rag_core::RagError;

use crate::answer::{create_answerer, Answer, Answerer, ExtractiveAnswerer};
use crate::artifact::{load_index, load_or_demo, LoadedIndex};
use crate::config::Config;

/// One retrieval hit, detached from the index it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk_id: usize,
    pub chunk_text: String,
    pub source_label: String,
    pub score: f64,
}

pub struct ServiceContext {
    config: Arc<Config>,
    index: RwLock<Arc<LoadedIndex>>,
    answerer: Arc<dyn Answerer>,
}

impl ServiceContext {
    pub fn new(config: Config, index: LoadedIndex, answerer: Arc<dyn Answerer>) -> Self {
        Self {
            config: Arc::new(config),
            index: RwLock::new(Arc::new(index)),
            answerer,
        }
    }

    /// Load the index and answerer named by `config`.
    ///
    /// The demo corpus is used only if the artifact fails to load and either
    /// `demo_fallback` or `index.demo_fallback` is set.
    pub fn from_config(config: Config, demo_fallback: bool) -> Result<Self> {
        let fallback = demo_fallback || config.index.demo_fallback;
        let index = load_or_demo(&config.index.path, fallback)?;
        let answerer = create_answerer(&config.answer)?;
        tracing::info!(
            chunks = index.index.len(),
            demo = index.demo,
            answerer = answerer.name(),
            "service context ready"
        );
        Ok(Self::new(config, index, answerer))
    }

    /// Load only what ranking needs.
    ///
    /// The configured answerer is never constructed, so `search` works
    /// without provider credentials. [`ServiceContext::ask`] on this context
    /// answers extractively.
    pub fn for_search(config: Config, demo_fallback: bool) -> Result<Self> {
        let fallback = demo_fallback || config.index.demo_fallback;
        let index = load_or_demo(&config.index.path, fallback)?;
        tracing::info!(
            chunks = index.index.len(),
            demo = index.demo,
            "search context ready"
        );
        Ok(Self::new(config, index, Arc::new(ExtractiveAnswerer)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the index currently being served.
    pub fn current(&self) -> Arc<LoadedIndex> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reject questions shorter than `retrieval.min_query_chars`.
    pub fn validate_question<'q>(&self, question: &'q str) -> Result<&'q str, RagError> {
        let trimmed = question.trim();
        let min = self.config.retrieval.min_query_chars;
        if trimmed.chars().count() < min {
            return Err(RagError::InvalidQuery(format!(
                "query must be at least {} characters",
                min
            )));
        }
        Ok(trimmed)
    }

    /// Rank the current index against `text`; `k` defaults to `retrieval.top_k`.
    pub fn search(&self, text: &str, k: Option<usize>) -> Vec<SearchHit> {
        let k = k.unwrap_or(self.config.retrieval.top_k);
        let snapshot = self.current();
        query(&snapshot.index, text, k)
            .into_iter()
            .map(|r| SearchHit {
                chunk_id: r.chunk.id,
                chunk_text: r.chunk.text.clone(),
                source_label: r.chunk.source_label.clone(),
                score: r.score,
            })
            .collect()
    }

    /// Validate, retrieve `retrieval.top_k` chunks, and answer.
    ///
    /// # Errors
    ///
    /// [`RagError::InvalidQuery`] (downcastable from the returned error) for
    /// a too-short question; any other error comes from the answerer.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = self.validate_question(question)?;
        let snapshot = self.current();
        let ranked = query(&snapshot.index, question, self.config.retrieval.top_k);
        tracing::debug!(
            question,
            hits = ranked.len(),
            top_score = ranked.first().map(|r| r.score).unwrap_or(0.0),
            "retrieved context"
        );
        self.answerer.answer(question, &ranked).await
    }

    /// Load the artifact again and swap it in.
    ///
    /// On failure the current index keeps serving and the error is returned.
    pub fn reload(&self) -> Result<usize> {
        let fresh = load_index(&self.config.index.path)?;
        let count = fresh.index.len();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);
        tracing::info!(chunks = count, "index reloaded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{demo_index, save_index};
    use tempfile::TempDir;
    use textbook_rag_core::index::{ChunkInput, Index, IndexOptions};

    fn demo_context(config: Config) -> ServiceContext {
        ServiceContext::new(config, demo_index().unwrap(), Arc::new(ExtractiveAnswerer))
    }

    #[test]
    fn test_search_defaults_to_top_k() {
        let ctx = demo_context(Config::minimal());
        let hits = ctx.search("What is Gazebo?", None);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].source_label, "chapter5.txt");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_search_unknown_terms_returns_ordinal_order() {
        let ctx = demo_context(Config::minimal());
        let hits = ctx.search("xyzabc nonexistent", Some(10));
        let ids: Vec<usize> = hits.iter().map(|h| h.chunk_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[tokio::test]
    async fn test_ask_rejects_short_question() {
        let ctx = demo_context(Config::minimal());
        let err = ctx.ask(" a ").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_answers_with_sources() {
        let ctx = demo_context(Config::minimal());
        let answer = ctx.ask("What is ROS 2?").await.unwrap();
        assert!(answer.answer.starts_with("Based on the textbook: ROS 2"));
        assert_eq!(answer.sources[0], "chapter3.txt");
        assert_eq!(answer.sources.len(), 3);
    }

    #[test]
    fn test_from_config_without_index_fails_loudly() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.index.path = tmp.path().join("missing.json");
        assert!(ServiceContext::from_config(config.clone(), false).is_err());
        let ctx = ServiceContext::from_config(config, true).unwrap();
        assert!(ctx.current().demo);
    }

    #[test]
    fn test_search_context_skips_answer_provider() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.index.path = tmp.path().join("index.json");
        config.answer.provider = "openai".to_string();
        config.answer.api_key_env = "TEXTBOOK_RAG_TEST_UNSET_KEY_VAR".to_string();
        let index = Index::build(
            vec![ChunkInput::new("Humanoid gait controllers balance the robot.", "chunk_000.txt")],
            &IndexOptions::default(),
        )
        .unwrap();
        save_index(&config.index.path, &index, "fp").unwrap();

        let err = ServiceContext::from_config(config.clone(), false)
            .err()
            .expect("openai without a key must fail");
        assert!(err.to_string().contains("TEXTBOOK_RAG_TEST_UNSET_KEY_VAR"));

        let ctx = ServiceContext::for_search(config, false).unwrap();
        let hits = ctx.search("gait", None);
        assert_eq!(hits[0].source_label, "chunk_000.txt");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_reload_swaps_and_keeps_old_on_failure() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.index.path = tmp.path().join("index.json");
        let ctx = demo_context(config.clone());

        let err = ctx.reload().unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(ctx.current().demo);

        let before = ctx.current();
        let index = Index::build(
            vec![ChunkInput::new("Isaac Sim trains robots.", "chunk_000.txt")],
            &IndexOptions::default(),
        )
        .unwrap();
        save_index(&config.index.path, &index, "fp").unwrap();

        assert_eq!(ctx.reload().unwrap(), 1);
        assert!(!ctx.current().demo);
        assert_eq!(ctx.search("isaac", None).len(), 1);
        // Snapshots taken before the swap are unaffected.
        assert_eq!(before.index.len(), 5);
    }
}
