//! Crawl orchestration: fetch, chunk, enrich, persist, and keep going.
//!
//! The pipeline is deliberately forgiving at the edges and strict in the
//! middle: a single chunk's enrichment failure is recorded and skipped, a
//! single URL's fetch failure marks that URL failed, and only configuration
//! problems (a missing collaborator) abort a run outright.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use url::Url;

use crate::chunking::{self, DEFAULT_BOUNDARY_FINDERS, DEFAULT_CHUNK_SIZE};
use crate::concurrency::{self, DEFAULT_CONCURRENCY};
use crate::enrich::{ChatProvider, EmbeddingProvider, Enricher};
use crate::fetch::Fetcher;
use crate::ingestion::cache::ChunkCache;
use crate::ingestion::chunk::ProcessedChunk;
use crate::ingestion::resume::{CrawlProgress, ProgressState};
use crate::storage::{Backend, disk};
use crate::types::RagError;

/// How often the progress log is flushed to disk, in completed pages.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Tunables for a crawl session. Collaborators (fetcher, providers, store)
/// are injected separately through [`PipelineBuilder`].
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Directory holding documents, chunks, and progress logs.
    pub export_root: PathBuf,
    /// Session identifier; doubles as the chunks' `source` tag.
    pub session_id: String,
    pub chunk_size: usize,
    pub max_concurrency: usize,
    pub checkpoint_interval: usize,
    /// Re-run LLM enrichment even when cached values exist.
    pub replace_llm_metadata: bool,
    /// Re-fetch and re-process URLs already marked successful.
    pub recrawl: bool,
}

impl PipelineConfig {
    pub fn new(export_root: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            export_root: export_root.into(),
            session_id: session_id.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: DEFAULT_CONCURRENCY,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            replace_llm_metadata: false,
            recrawl: false,
        }
    }
}

/// Outcome of processing a single URL.
#[derive(Debug)]
pub struct UrlOutcome {
    pub url: String,
    /// Chunks that made it to disk, in document order.
    pub chunks: Vec<ProcessedChunk>,
    /// Diagnostics for chunks that failed to persist.
    pub failures: Vec<String>,
}

/// Aggregate result of a crawl run; partial by design.
#[derive(Debug)]
pub struct CrawlReport {
    pub outcomes: Vec<UrlOutcome>,
    /// URLs skipped because a prior run already succeeded on them.
    pub skipped: Vec<String>,
    /// Final progress-log state after the run.
    pub progress: ProgressState,
}

/// Assembles a [`Pipeline`] from its collaborators.
///
/// Fetcher, chat, and embedding providers are required; the document store
/// is optional (disk-only runs are valid).
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    fetcher: Option<Arc<dyn Fetcher>>,
    chat: Option<Arc<dyn ChatProvider>>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<dyn Backend>>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn chat(mut self, chat: Arc<dyn ChatProvider>) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn embeddings(mut self, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    pub fn store(mut self, store: Arc<dyn Backend>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<Pipeline, RagError> {
        let config = self
            .config
            .ok_or_else(|| RagError::Configuration("pipeline config not supplied".to_string()))?;
        let fetcher = self
            .fetcher
            .ok_or_else(|| RagError::Configuration("no fetcher supplied".to_string()))?;
        let chat = self
            .chat
            .ok_or_else(|| RagError::Configuration("no chat provider supplied".to_string()))?;
        let embeddings = self.embeddings.ok_or_else(|| {
            RagError::Configuration("no embedding provider supplied".to_string())
        })?;

        let cache = ChunkCache::new(&config.export_root);
        Ok(Pipeline {
            enricher: Enricher::new(chat, embeddings),
            fetcher,
            store: self.store,
            cache,
            config,
        })
    }
}

/// The crawl/chunk/enrich/persist orchestrator.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    enricher: Enricher,
    store: Option<Arc<dyn Backend>>,
    cache: ChunkCache,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Takes one chunk through reconcile, enrich, disk write, and store
    /// upsert.
    ///
    /// Only the disk write can fail the chunk. A store fault is recorded in
    /// the chunk's `error_logs` and the chunk still counts as processed, so
    /// one flaky database write does not force the page to re-enrich.
    pub async fn process_chunk(
        &self,
        url: &Url,
        mut chunk: ProcessedChunk,
    ) -> Result<ProcessedChunk, RagError> {
        let cache_hit = self.cache.reconcile(url, &mut chunk).await;
        let fully_cached = cache_hit && chunk.has_title_and_summary() && chunk.has_embedding();

        if !fully_cached || self.config.replace_llm_metadata {
            self.enricher
                .generate_metadata(&mut chunk, self.config.replace_llm_metadata)
                .await;
        }

        let path = self.cache.chunk_path(url, chunk.chunk_number);
        disk::write_chunk(&path, &chunk).await?;

        if let Some(store) = &self.store {
            if let Err(err) = store.upsert_chunks(vec![chunk.to_record()]).await {
                chunk.log_error(format!("store upsert failed: {err}"));
            }
        }

        Ok(chunk)
    }

    /// Fetches (or re-reads from disk) one page, splits it, and fans the
    /// chunks out with bounded concurrency.
    pub async fn process_url(&self, url: &Url) -> Result<UrlOutcome, RagError> {
        let content = self.page_content(url).await?;
        let pieces =
            chunking::chunk_text(&content, self.config.chunk_size, DEFAULT_BOUNDARY_FINDERS);
        tracing::info!(%url, chunks = pieces.len(), "processing page");

        let units = pieces.into_iter().enumerate().map(|(number, piece)| {
            let chunk = ProcessedChunk::new(&self.config.session_id, url, number, piece);
            self.process_chunk(url, chunk)
        });
        let results = concurrency::run_bounded(units, self.config.max_concurrency).await;

        let mut chunks = Vec::new();
        let mut failures = Vec::new();
        for (number, result) in results.into_iter().enumerate() {
            match result {
                Ok(chunk) => chunks.push(chunk),
                Err(err) => failures.push(format!("chunk {number}: {err}")),
            }
        }
        Ok(UrlOutcome {
            url: url.to_string(),
            chunks,
            failures,
        })
    }

    /// Page text for `url`: the persisted markdown document when one exists
    /// (unless recrawl is set), a fetch otherwise. Fetched pages are written
    /// back so later runs can skip the network.
    async fn page_content(&self, url: &Url) -> Result<String, RagError> {
        let doc_path = self.cache.document_path(url);
        if !self.config.recrawl && doc_path.exists() {
            tracing::debug!(%url, "reusing persisted page document");
            return disk::read_document(&doc_path).await;
        }

        let page = self.fetcher.fetch(url, &self.config.session_id).await?;
        disk::write_document(&doc_path, url, &self.config.session_id, &page.content).await?;
        Ok(page.content)
    }

    /// Crawls a batch of URLs with bounded concurrency and a resumable
    /// progress log.
    ///
    /// URLs already marked successful by a prior run are skipped (unless
    /// recrawl is set); previously failed URLs are retried. The progress
    /// log is updated after each page completes and checkpointed every
    /// `checkpoint_interval` pages and at the end. One URL's failure never
    /// stops the batch.
    pub async fn process_urls(&self, urls: &[String]) -> Result<CrawlReport, RagError> {
        let progress = CrawlProgress::new(self.cache.progress_path(&self.config.session_id));
        progress.load().await?;

        let mut valid = Vec::new();
        let mut targets = Vec::new();
        let mut skipped = Vec::new();
        for raw in urls {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            valid.push(raw.to_string());
            if !self.config.recrawl && progress.is_success(raw).await {
                skipped.push(raw.to_string());
                continue;
            }
            targets.push(raw.to_string());
        }
        self.write_url_manifest(&valid).await?;
        tracing::info!(
            total = urls.len(),
            queued = targets.len(),
            skipped = skipped.len(),
            "starting crawl"
        );

        let units = targets.iter().map(|raw| {
            let raw = raw.clone();
            async move {
                let outcome = match Url::parse(&raw) {
                    Ok(url) => self.process_url(&url).await,
                    Err(err) => Err(RagError::Fetch(format!("invalid url '{raw}': {err}"))),
                };
                (raw, outcome)
            }
        });
        let stream = concurrency::bounded(units, self.config.max_concurrency);
        futures_util::pin_mut!(stream);

        let mut outcomes = Vec::new();
        let mut completed = 0usize;
        while let Some((raw, outcome)) = stream.next().await {
            match outcome {
                Ok(outcome) => {
                    progress.mark_success(&raw).await;
                    outcomes.push(outcome);
                }
                Err(err) => {
                    tracing::warn!(url = %raw, error = %err, "page failed");
                    progress.mark_failure(&raw).await;
                    outcomes.push(UrlOutcome {
                        url: raw,
                        chunks: Vec::new(),
                        failures: vec![err.to_string()],
                    });
                }
            }

            completed += 1;
            if completed % self.config.checkpoint_interval.max(1) == 0 {
                progress.checkpoint().await?;
            }
        }

        progress.checkpoint().await?;
        let state = progress.snapshot().await;
        tracing::info!(
            succeeded = state.success.len(),
            failed = state.failed.len(),
            "crawl finished"
        );
        Ok(CrawlReport {
            outcomes,
            skipped,
            progress: state,
        })
    }

    /// Records the session's URL list, one per line, blanks already
    /// filtered out.
    async fn write_url_manifest(&self, urls: &[String]) -> Result<(), RagError> {
        let path = self.cache.urls_path(&self.config.session_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, urls.join("\n")).await?;
        Ok(())
    }
}
