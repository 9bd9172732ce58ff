//! Offline index build pipeline.
//!
//! ```text
//! book.pdf ─extract─▶ textbook.txt ─chunk─▶ chunks/chunk_NNN.txt ─build─▶ index.json
//! ```
//!
//! Each stage is its own command so that a stage can be rerun by itself;
//! [`run_ingest`] runs all of them in sequence. Every build re-chunks and
//! re-indexes the whole corpus. Any failure aborts the build before an
//! artifact is written.

use anyhow::{Context, Result};
use std::path::Path;

use textbook_rag_core::chunk::chunk_text;
use textbook_rag_core::index::{Index, IndexOptions};

use crate::artifact::save_index;
use crate::config::Config;
use crate::corpus::{corpus_fingerprint, load_chunks, write_chunks};
use crate::extract::{extract_pdf_file, normalize_whitespace};

/// Summary of a completed index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub chunks: usize,
    pub vocabulary: usize,
    /// Chunks with no indexed term (kept with a zero vector).
    pub empty_vectors: usize,
    pub fingerprint: String,
}

/// Extract the text of `pdf` into `out`.
pub fn run_extract(pdf: &Path, out: &Path) -> Result<()> {
    let text = extract_pdf_file(pdf)?;
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, &text).with_context(|| format!("Failed to write {}", out.display()))?;

    println!("extract {}", pdf.display());
    println!("  characters: {}", text.chars().count());
    println!("  written: {}", out.display());
    println!("ok");
    Ok(())
}

/// Normalize and chunk `text`, then write the chunk files into `out_dir`.
///
/// Returns the number of chunks written.
pub fn chunk_into(config: &Config, text: &str, out_dir: &Path) -> Result<usize> {
    let normalized = normalize_whitespace(text);
    let chunks = chunk_text(
        &normalized,
        config.chunking.chunk_size,
        config.chunking.overlap,
    )?;
    write_chunks(out_dir, &chunks)?;
    tracing::debug!(
        chunks = chunks.len(),
        chunk_size = config.chunking.chunk_size,
        overlap = config.chunking.overlap,
        "chunked text"
    );
    Ok(chunks.len())
}

/// `rag chunk`: chunk a text file into `out_dir`.
pub fn run_chunk(config: &Config, text_path: &Path, out_dir: &Path) -> Result<()> {
    let text = std::fs::read_to_string(text_path)
        .with_context(|| format!("Failed to read {}", text_path.display()))?;
    let count = chunk_into(config, &text, out_dir)?;

    println!("chunk {}", text_path.display());
    println!("  chunks written: {}", count);
    println!("  directory: {}", out_dir.display());
    println!("ok");
    Ok(())
}

/// Build an index from the chunk files in `chunks_dir` and save it to `index_path`.
pub fn build_index(config: &Config, chunks_dir: &Path, index_path: &Path) -> Result<BuildReport> {
    let chunks = load_chunks(chunks_dir)?;
    let fingerprint = corpus_fingerprint(&chunks);
    let options = IndexOptions {
        max_features: Some(config.index.max_features),
    };

    let index = Index::build(chunks, &options)
        .with_context(|| format!("Failed to build index from {}", chunks_dir.display()))?;
    let empty_vectors = index.chunk_vectors().iter().filter(|v| v.is_zero()).count();
    if empty_vectors > 0 {
        tracing::warn!(empty_vectors, "some chunks contain no indexable terms");
    }

    save_index(index_path, &index, &fingerprint)?;

    Ok(BuildReport {
        chunks: index.len(),
        vocabulary: index.vocabulary().len(),
        empty_vectors,
        fingerprint,
    })
}

/// `rag build`.
pub fn run_build(config: &Config, chunks_dir: &Path, index_path: &Path) -> Result<()> {
    let report = build_index(config, chunks_dir, index_path)?;
    print_build_report(&report, index_path);
    Ok(())
}

/// `rag ingest`: extract, chunk, build, and save in one go.
pub fn run_ingest(config: &Config, pdf: &Path, chunks_dir: &Path, index_path: &Path) -> Result<()> {
    let text = extract_pdf_file(pdf)?;
    tracing::info!(characters = text.chars().count(), "extracted text");
    let count = chunk_into(config, &text, chunks_dir)?;
    println!("ingest {}", pdf.display());
    println!("  chunks written: {}", count);

    let report = build_index(config, chunks_dir, index_path)?;
    print_build_report(&report, index_path);
    Ok(())
}

fn print_build_report(report: &BuildReport, index_path: &Path) {
    println!("build");
    println!("  chunks: {}", report.chunks);
    println!("  vocabulary: {}", report.vocabulary);
    if report.empty_vectors > 0 {
        println!("  chunks without terms: {}", report.empty_vectors);
    }
    println!("  fingerprint: {}", &report.fingerprint[..12]);
    println!("  index: {}", index_path.display());
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::load_index;
    use tempfile::TempDir;
    use textbook_rag_core::RagError;

    fn small_config() -> Config {
        let mut config = Config::minimal();
        config.chunking.chunk_size = 40;
        config.chunking.overlap = 10;
        config
    }

    const TEXT: &str = "Physical AI refers to embodied agents.\n\n\n\nROS 2 is middleware \
                        for robots.\n \n\nGazebo is a physics simulator.";

    #[test]
    fn test_chunk_then_build() {
        let tmp = TempDir::new().unwrap();
        let chunks_dir = tmp.path().join("chunks");
        let index_path = tmp.path().join("index.json");
        let config = small_config();

        let count = chunk_into(&config, TEXT, &chunks_dir).unwrap();
        assert!(count >= 3);

        let report = build_index(&config, &chunks_dir, &index_path).unwrap();
        assert_eq!(report.chunks, count);
        assert!(report.vocabulary > 0);

        let loaded = load_index(&index_path).unwrap();
        assert_eq!(loaded.index.len(), count);
        assert_eq!(loaded.corpus_fingerprint, Some(report.fingerprint));
        assert_eq!(loaded.index.chunks()[0].source_label, "chunk_000.txt");
    }

    #[test]
    fn test_empty_corpus_writes_no_artifact() {
        let tmp = TempDir::new().unwrap();
        let chunks_dir = tmp.path().join("chunks");
        std::fs::create_dir_all(&chunks_dir).unwrap();
        let index_path = tmp.path().join("index.json");

        let err = build_index(&small_config(), &chunks_dir, &index_path).unwrap_err();
        assert_eq!(err.downcast_ref::<RagError>(), Some(&RagError::EmptyCorpus));
        assert!(!index_path.exists());
    }

    #[test]
    fn test_invalid_chunking_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut config = small_config();
        config.chunking.overlap = 40;
        let err = chunk_into(&config, TEXT, tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RagError>(),
            Some(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let chunks_dir = tmp.path().join("chunks");
        let config = small_config();
        chunk_into(&config, TEXT, &chunks_dir).unwrap();

        let a = build_index(&config, &chunks_dir, &tmp.path().join("a.json")).unwrap();
        let b = build_index(&config, &chunks_dir, &tmp.path().join("b.json")).unwrap();
        assert_eq!(a, b);
    }
}
