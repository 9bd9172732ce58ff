//! On-disk chunk corpus: one `chunk_NNN.txt` file per chunk.
//!
//! The file name is the chunk's source label, and the numeric part of the
//! name defines its ordinal position in the index.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobMatcher};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use textbook_rag_core::index::ChunkInput;

const CHUNK_GLOB: &str = "chunk_*.txt";

/// File name for the chunk at `ordinal`, zero-padded to `width` digits.
pub fn chunk_file_name(ordinal: usize, width: usize) -> String {
    format!("chunk_{:0width$}.txt", ordinal, width = width)
}

/// Write `chunks` into `dir` as `chunk_000.txt`, `chunk_001.txt`, ...
///
/// Stale chunk files from a previous run are removed first so that a
/// shorter corpus never inherits trailing chunks. Padding widens past three
/// digits when needed so that name order always matches ordinal order.
pub fn write_chunks(dir: &Path, chunks: &[String]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create chunk directory: {}", dir.display()))?;

    let stale = list_chunk_files(dir)?;
    for path in &stale {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove stale chunk: {}", path.display()))?;
    }
    if !stale.is_empty() {
        tracing::debug!("removed {} stale chunk files", stale.len());
    }

    let width = chunks.len().saturating_sub(1).to_string().len().max(3);
    let mut written = Vec::with_capacity(chunks.len());
    for (i, text) in chunks.iter().enumerate() {
        let path = dir.join(chunk_file_name(i, width));
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write chunk: {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Load every chunk file in `dir`, in ordinal order.
///
/// Returns an empty list when the directory holds no chunk files; the
/// indexer rejects that as an empty corpus.
pub fn load_chunks(dir: &Path) -> Result<Vec<ChunkInput>> {
    if !dir.is_dir() {
        bail!("Chunk directory does not exist: {}", dir.display());
    }

    list_chunk_files(dir)?
        .into_iter()
        .map(|path| {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read chunk: {}", path.display()))?;
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(ChunkInput::new(text, label))
        })
        .collect()
}

/// SHA-256 over every label and text, hex-encoded.
pub fn corpus_fingerprint(chunks: &[ChunkInput]) -> String {
    let mut hasher = Sha256::new();
    for c in chunks {
        hasher.update(c.source_label.as_bytes());
        hasher.update([0u8]);
        hasher.update((c.text.len() as u64).to_le_bytes());
        hasher.update(c.text.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn list_chunk_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let matcher = chunk_matcher()?;
    let mut files: Vec<(Option<u64>, PathBuf)> = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !matcher.is_match(&name) {
            continue;
        }
        files.push((chunk_ordinal(&name), entry.into_path()));
    }

    // Numbered files first by number, anything else after by name.
    files.sort_by(|(oa, pa), (ob, pb)| match (oa, ob) {
        (Some(a), Some(b)) => a.cmp(b).then_with(|| pa.cmp(pb)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => pa.cmp(pb),
    });

    Ok(files.into_iter().map(|(_, p)| p).collect())
}

fn chunk_matcher() -> Result<GlobMatcher> {
    Ok(Glob::new(CHUNK_GLOB)?.compile_matcher())
}

fn chunk_ordinal(name: &str) -> Option<u64> {
    name.strip_prefix("chunk_")?
        .strip_suffix(".txt")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn labels(chunks: &[ChunkInput]) -> Vec<&str> {
        chunks.iter().map(|c| c.source_label.as_str()).collect()
    }

    #[test]
    fn test_write_then_load_in_order() {
        let tmp = TempDir::new().unwrap();
        let texts = vec!["first".to_string(), "second".to_string(), "".to_string()];
        let written = write_chunks(tmp.path(), &texts).unwrap();
        assert_eq!(written.len(), 3);

        let loaded = load_chunks(tmp.path()).unwrap();
        assert_eq!(
            labels(&loaded),
            vec!["chunk_000.txt", "chunk_001.txt", "chunk_002.txt"]
        );
        assert_eq!(loaded[1].text, "second");
        assert_eq!(loaded[2].text, "");
    }

    #[test]
    fn test_rewrite_removes_stale_chunks() {
        let tmp = TempDir::new().unwrap();
        let five: Vec<String> = (0..5).map(|i| format!("chunk {}", i)).collect();
        write_chunks(tmp.path(), &five).unwrap();
        write_chunks(tmp.path(), &five[..2]).unwrap();
        assert_eq!(load_chunks(tmp.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_ignores_other_files() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        std::fs::write(tmp.path().join("chunk_000.md"), "x").unwrap();
        std::fs::write(tmp.path().join("chunk_000.txt"), "kept").unwrap();
        let loaded = load_chunks(tmp.path()).unwrap();
        assert_eq!(labels(&loaded), vec!["chunk_000.txt"]);
    }

    #[test]
    fn test_numeric_order_beyond_three_digits() {
        let tmp = TempDir::new().unwrap();
        for name in ["chunk_1000.txt", "chunk_101.txt", "chunk_002.txt"] {
            std::fs::write(tmp.path().join(name), name).unwrap();
        }
        let loaded = load_chunks(tmp.path()).unwrap();
        assert_eq!(
            labels(&loaded),
            vec!["chunk_002.txt", "chunk_101.txt", "chunk_1000.txt"]
        );
    }

    #[test]
    fn test_padding_widens_for_large_corpora() {
        assert_eq!(chunk_file_name(7, 3), "chunk_007.txt");
        assert_eq!(chunk_file_name(1234, 4), "chunk_1234.txt");
    }

    #[test]
    fn test_missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_chunks(&tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_empty_directory_loads_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(load_chunks(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_content_and_labels() {
        let a = vec![ChunkInput::new("text", "chunk_000.txt")];
        let b = vec![ChunkInput::new("text!", "chunk_000.txt")];
        let c = vec![ChunkInput::new("text", "chunk_001.txt")];
        assert_eq!(corpus_fingerprint(&a), corpus_fingerprint(&a.clone()));
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&b));
        assert_ne!(corpus_fingerprint(&a), corpus_fingerprint(&c));
        assert_eq!(corpus_fingerprint(&a).len(), 64);
    }
}
