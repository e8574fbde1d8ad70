//! Stable on-disk identity for chunks, and dedup by disk comparison.
//!
//! URLs are normalized into deterministic, filesystem-safe relative paths so
//! repeated runs land on the same files. Two distinct URLs *can* normalize
//! to the same path when they differ only by characters the sanitizer
//! strips; that collision is accepted and documented rather than hidden
//! behind a hash suffix.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use url::Url;

use crate::ingestion::chunk::ProcessedChunk;
use crate::storage::disk;

/// Lowercases, strips accents, and drops everything outside
/// `[0-9a-z_-]` after mapping spaces to underscores.
fn safe_component(input: &str) -> String {
    let stripped: String = input.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        .collect()
}

/// Normalizes a URL into a relative `host/path` file stem.
///
/// The scheme is dropped; `www.` and dots in the host become underscores;
/// path separators become underscores; an empty path maps to `index`.
pub fn url_file_stem(url: &Url) -> String {
    let host = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .replace('.', "_");

    // The parsed URL percent-encodes non-ASCII path segments; decode before
    // sanitizing so accented characters reduce to their base letters.
    let path = percent_decode_str(url.path())
        .decode_utf8_lossy()
        .trim_matches('/')
        .replace('/', "_");
    let path = if path.is_empty() {
        "index".to_string()
    } else {
        path
    };

    let stem = format!(
        "{}/{}",
        safe_component(&host),
        safe_component(&path)
    );
    stem.trim_matches('_').to_string()
}

/// Maps URLs to their persisted locations under an export root and
/// reconciles fresh chunks against previously persisted ones.
///
/// This is the pipeline's sole caching/idempotence mechanism: byte-identical
/// content inherits previously computed metadata instead of triggering new
/// LLM calls.
#[derive(Clone, Debug)]
pub struct ChunkCache {
    root: PathBuf,
}

impl ChunkCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the whole-page markdown document for `url`.
    pub fn document_path(&self, url: &Url) -> PathBuf {
        self.root.join(format!("{}.md", url_file_stem(url)))
    }

    /// Location of chunk `chunk_number` of `url`.
    pub fn chunk_path(&self, url: &Url, chunk_number: usize) -> PathBuf {
        self.root
            .join("chunks")
            .join(url_file_stem(url))
            .join(format!("{chunk_number}.md"))
    }

    /// Location of the crawl progress log for a session.
    pub fn progress_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join("progress")
            .join(format!("{}.json", safe_component(session_id)))
    }

    /// Location of the URL manifest written for a session.
    pub fn urls_path(&self, session_id: &str) -> PathBuf {
        self.root
            .join("urls")
            .join(format!("{}.txt", safe_component(session_id)))
    }

    /// Compares `chunk` against its persisted counterpart, carrying forward
    /// previously computed enrichment when the content is byte-identical.
    ///
    /// Only fields that are currently empty on the candidate are filled; the
    /// persisted metadata and error logs are adopted wholesale. A missing
    /// file, a parse failure, or differing content all mean "cache miss" and
    /// leave the candidate untouched.
    ///
    /// Returns `true` on a cache hit.
    pub async fn reconcile(&self, url: &Url, chunk: &mut ProcessedChunk) -> bool {
        let path = self.chunk_path(url, chunk.chunk_number);
        let persisted = match disk::read_chunk(&path).await {
            Ok(persisted) => persisted,
            Err(_) => return false,
        };

        if persisted.content != chunk.content {
            return false;
        }

        if chunk.title.is_none() {
            chunk.title = persisted.title;
        }
        if chunk.summary.is_none() {
            chunk.summary = persisted.summary;
        }
        if !chunk.has_embedding() {
            chunk.embedding = persisted.embedding;
        }
        chunk.metadata = persisted.metadata;
        chunk.error_logs = persisted.error_logs;

        tracing::debug!(url = %chunk.url, chunk = chunk.chunk_number, "disk cache hit");
        true
    }
}
