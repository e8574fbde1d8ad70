//! Chunk records, disk-cache identity, and crawl progress bookkeeping.

pub mod cache;
pub mod chunk;
pub mod resume;

pub use cache::{ChunkCache, url_file_stem};
pub use chunk::{ChunkMetadata, EMBEDDING_DIM, ProcessedChunk};
pub use resume::{CrawlProgress, ProgressState};
