//! The processed-chunk record and its derived metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::storage::StoreRecord;

/// Dimensionality of the embedding vectors the pipeline works with.
///
/// Serialized records substitute an all-zero vector of this length when no
/// embedding has been computed yet.
pub const EMBEDDING_DIM: usize = 1536;

/// Derived metadata recomputed whenever a chunk's content is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Logical collection / crawl-session identifier.
    pub source: String,
    pub crawled_at: DateTime<Utc>,
    /// Path component of the origin URL.
    pub url_path: String,
    pub content_length: usize,
}

impl ChunkMetadata {
    pub fn derive(source: &str, url: &str, content: &str) -> Self {
        let url_path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        Self {
            source: source.to_string(),
            crawled_at: Utc::now(),
            url_path,
            content_length: content.len(),
        }
    }
}

/// A contiguous slice of a document's text, carrying its own enrichment
/// metadata and persistence identity.
///
/// Identity is `(url, chunk_number)`; content plays no part in equality so
/// that dedup can compare a fresh candidate against a previously persisted
/// chunk at the same position.
#[derive(Clone, Debug)]
pub struct ProcessedChunk {
    pub source: String,
    pub url: String,
    /// Zero-based position within the document; stable and order-significant.
    pub chunk_number: usize,
    /// Immutable once the chunk is created.
    pub content: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub embedding: Option<Vec<f32>>,
    /// Append-only diagnostics accumulated during enrichment.
    pub error_logs: Vec<String>,
    pub metadata: ChunkMetadata,
}

impl PartialEq for ProcessedChunk {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.chunk_number == other.chunk_number
    }
}

impl Eq for ProcessedChunk {}

impl ProcessedChunk {
    pub fn new(
        source: impl Into<String>,
        url: &Url,
        chunk_number: usize,
        content: impl Into<String>,
    ) -> Self {
        let source = source.into();
        let content = content.into();
        let metadata = ChunkMetadata::derive(&source, url.as_str(), &content);
        Self {
            source,
            url: url.to_string(),
            chunk_number,
            content,
            title: None,
            summary: None,
            embedding: None,
            error_logs: Vec::new(),
            metadata,
        }
    }

    /// Records a diagnostic without interrupting the chunk's lifecycle.
    pub fn log_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(url = %self.url, chunk = self.chunk_number, "{message}");
        self.error_logs.push(message);
    }

    pub fn has_title_and_summary(&self) -> bool {
        self.title.is_some() && self.summary.is_some()
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }

    /// Store-facing representation: drops `source` (kept out of the table
    /// schema) and substitutes the zero-vector sentinel for a missing
    /// embedding.
    pub fn to_record(&self) -> StoreRecord {
        StoreRecord {
            url: self.url.clone(),
            chunk_number: self.chunk_number,
            title: self.title.clone().unwrap_or_else(|| "No Title".to_string()),
            summary: self
                .summary
                .clone()
                .unwrap_or_else(|| "No Summary".to_string()),
            content: self.content.clone(),
            metadata: serde_json::to_value(&self.metadata).unwrap_or_default(),
            embedding: self
                .embedding
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| vec![0.0; EMBEDDING_DIM]),
        }
    }
}
