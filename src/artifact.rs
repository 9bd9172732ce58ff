//! Persisted index artifact.
//!
//! The index is stored as a single JSON document:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "built_at": "2026-01-01T00:00:00Z",
//!   "corpus_fingerprint": "9f86d0…",
//!   "vocabulary": ["agents", "ai", …],
//!   "idf": [1.69, 1.69, …],
//!   "chunk_vectors": [[[0, 0.44], [1, 0.44]], …],
//!   "chunks": [{ "id": 0, "text": "…", "source_label": "chunk_000.txt" }, …]
//! }
//! ```
//!
//! Loading is all-or-nothing. A missing file, malformed JSON, an unknown
//! `format_version`, or an index whose parts do not line up is reported as
//! [`RagError::IndexLoadFailure`]. The built-in demo corpus is only served
//! when the caller opts in.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use textbook_rag_core::index::{ChunkInput, Index, IndexOptions};
use textbook_rag_core::RagError;

/// Schema version written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Five sentences served when the real index is unavailable and the demo
/// fallback is enabled.
const DEMO_CORPUS: [(&str, &str); 5] = [
    (
        "Physical AI refers to artificial intelligence systems that interact with the physical world through robots or other embodied agents.",
        "chapter1.txt",
    ),
    (
        "Humanoid Robotics focuses on creating robots that resemble the human form and can perform human-like tasks.",
        "chapter2.txt",
    ),
    (
        "ROS 2 (Robot Operating System) is middleware for robot control, providing tools and libraries for building robot applications.",
        "chapter3.txt",
    ),
    (
        "NVIDIA Isaac Sim is a simulation platform for training AI robots in virtual environments.",
        "chapter4.txt",
    ),
    (
        "Gazebo is a physics simulator used for testing robots in digital environments before physical deployment.",
        "chapter5.txt",
    ),
];

/// An index plus the provenance recorded alongside it.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub index: Index,
    /// `None` for the demo index.
    pub built_at: Option<DateTime<Utc>>,
    pub corpus_fingerprint: Option<String>,
    /// True when this is the built-in demo corpus, not a real artifact.
    pub demo: bool,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format_version: u32,
    built_at: DateTime<Utc>,
    corpus_fingerprint: &'a str,
    #[serde(flatten)]
    index: &'a Index,
}

#[derive(Deserialize)]
struct Artifact {
    built_at: DateTime<Utc>,
    corpus_fingerprint: String,
    #[serde(flatten)]
    index: Index,
}

/// Write `index` to `path`, replacing any previous artifact atomically.
///
/// The JSON is written to a temporary file next to `path` and renamed over
/// it, so a reader never observes a half-written artifact.
pub fn save_index(path: &Path, index: &Index, corpus_fingerprint: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create index directory: {}", dir.display()))?;

    let artifact = ArtifactRef {
        format_version: FORMAT_VERSION,
        built_at: Utc::now(),
        corpus_fingerprint,
        index,
    };
    let json = serde_json::to_vec(&artifact).context("Failed to serialize index")?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "index.json".to_string());
    let tmp_path = dir.join(format!(".{}.tmp-{}", file_name, std::process::id()));
    {
        let mut file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move index into place at {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        bytes = json.len(),
        chunks = index.len(),
        "index saved"
    );
    Ok(())
}

/// Load and validate the artifact at `path`.
pub fn load_index(path: &Path) -> Result<LoadedIndex, RagError> {
    let fail = |msg: String| RagError::IndexLoadFailure(msg);

    if !path.exists() {
        return Err(fail(format!(
            "index artifact not found at {}",
            path.display()
        )));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| fail(format!("cannot read {}: {}", path.display(), e)))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| fail(format!("{} is not valid JSON: {}", path.display(), e)))?;

    match value.get("format_version").and_then(|v| v.as_u64()) {
        Some(v) if v == u64::from(FORMAT_VERSION) => {}
        Some(v) => {
            return Err(fail(format!(
                "unsupported format_version {} (expected {})",
                v, FORMAT_VERSION
            )))
        }
        None => return Err(fail("missing format_version".to_string())),
    }

    let artifact: Artifact = serde_json::from_value(value)
        .map_err(|e| fail(format!("schema mismatch in {}: {}", path.display(), e)))?;

    tracing::info!(
        path = %path.display(),
        chunks = artifact.index.len(),
        vocabulary = artifact.index.vocabulary().len(),
        built_at = %artifact.built_at,
        "index loaded"
    );

    Ok(LoadedIndex {
        index: artifact.index,
        built_at: Some(artifact.built_at),
        corpus_fingerprint: Some(artifact.corpus_fingerprint),
        demo: false,
    })
}

/// Index over the built-in five-sentence demo corpus.
pub fn demo_index() -> textbook_rag_core::Result<LoadedIndex> {
    let chunks = DEMO_CORPUS
        .iter()
        .map(|(text, label)| ChunkInput::new(*text, *label))
        .collect();
    Ok(LoadedIndex {
        index: Index::build(chunks, &IndexOptions::default())?,
        built_at: None,
        corpus_fingerprint: None,
        demo: true,
    })
}

/// Load the artifact, or fall back to the demo index if `demo_fallback`.
///
/// Without the opt-in a load failure is returned to the caller unchanged.
pub fn load_or_demo(path: &Path, demo_fallback: bool) -> Result<LoadedIndex> {
    match load_index(path) {
        Ok(loaded) => Ok(loaded),
        Err(e) if demo_fallback => {
            tracing::warn!(
                error = %e,
                "serving the built-in DEMO index; answers are not drawn from the real corpus"
            );
            Ok(demo_index()?)
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "cannot start without an index at {} (run `rag build`, or pass --demo-fallback)",
                path.display()
            )
        }),
    }
}
