//! Persistence sinks for processed chunks.
//!
//! Two sinks exist side by side: `disk` writes human-inspectable markdown
//! with frontmatter, and a [`Backend`] holds the queryable document table.
//! Both are keyed by `(url, chunk_number)` so re-processing a page replaces
//! its rows instead of accumulating duplicates.

pub mod disk;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::RagError;

pub use sqlite::SqliteChunkStore;

/// A chunk serialized for the document table.
///
/// Unlike the in-flight `ProcessedChunk`, every field here is concrete:
/// missing titles and summaries have already been substituted with their
/// placeholder strings and a missing embedding with the zero-vector
/// sentinel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub url: String,
    pub chunk_number: usize,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// Unified interface over chunk document stores.
///
/// Implementations replace on key conflict; inserting the same
/// `(url, chunk_number)` twice leaves one row holding the later values.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Inserts records, replacing any existing row with the same
    /// `(url, chunk_number)`.
    async fn upsert_chunks(&self, records: Vec<StoreRecord>) -> Result<(), RagError>;

    /// All stored chunks for a URL, ordered by chunk number.
    async fn chunks_for_url(&self, url: &str) -> Result<Vec<StoreRecord>, RagError>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize, RagError>;
}
