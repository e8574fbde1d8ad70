//! ```text
//! URL list ──► pipeline::Pipeline ──┬─► fetch::Fetcher ──► storage::disk (page documents)
//!                                   └─► ingestion::resume::CrawlProgress
//!
//! Page text ──► chunking::chunk_text ──► ingestion::ProcessedChunk
//!                                             │
//!                                             ├─► ingestion::ChunkCache (dedup by disk compare)
//!                                             └─► enrich::Enricher ──► providers (chat / embeddings)
//!
//! Enriched chunks ──► storage::disk (frontmatter markdown)
//!                  └─► storage::sqlite::SqliteChunkStore (document table)
//! ```
//!
//! Fan-out at both levels (chunks of a page, pages of a crawl) runs through
//! `concurrency::run_bounded` with a fixed ceiling; failures stay local to
//! their unit and surface as diagnostics, not aborts.

pub mod chunking;
pub mod concurrency;
pub mod enrich;
pub mod fetch;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod storage;
pub mod types;

pub use chunking::{chunk_text, chunk_text_default};
pub use enrich::Enricher;
pub use fetch::{FetchedPage, Fetcher, HttpFetcher};
pub use ingestion::{ChunkCache, ChunkMetadata, CrawlProgress, ProcessedChunk};
pub use pipeline::{CrawlReport, Pipeline, PipelineBuilder, PipelineConfig, UrlOutcome};
pub use storage::{Backend, SqliteChunkStore, StoreRecord};
pub use types::RagError;
