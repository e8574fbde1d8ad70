//! End-to-end pipeline tests with deterministic in-process collaborators.
//!
//! The fetcher, chat, and embedding providers are test doubles so runs are
//! reproducible and count their own invocations; persistence goes to a
//! tempdir and an in-memory SQLite store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use url::Url;

use ragline::enrich::{ChatProvider, EmbeddingProvider};
use ragline::fetch::{FetchedPage, Fetcher};
use ragline::storage::{Backend, SqliteChunkStore};
use ragline::{Pipeline, PipelineConfig, RagError};
use tracing_subscriber::FmtSubscriber;

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder().with_env_filter("info").finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

struct StaticFetcher {
    pages: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, content)| (url.to_string(), content.to_string()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url, _session_id: &str) -> Result<FetchedPage, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url.as_str()) {
            Some(content) => Ok(FetchedPage {
                url: url.clone(),
                content: content.clone(),
            }),
            None => Err(RagError::Fetch(format!("no fixture for {url}"))),
        }
    }
}

struct CountingChat {
    calls: AtomicUsize,
}

impl CountingChat {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for CountingChat {
    async fn complete(&self, _: &str, _: &str) -> Result<serde_json::Value, RagError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::json!({
            "title": format!("Title {n}"),
            "summary": format!("Summary {n}"),
        }))
    }
}

struct FailingChat;

#[async_trait]
impl ChatProvider for FailingChat {
    async fn complete(&self, _: &str, _: &str) -> Result<serde_json::Value, RagError> {
        Err(RagError::Provider("chat model unavailable".to_string()))
    }
}

struct StaticEmbeddings;

#[async_trait]
impl EmbeddingProvider for StaticEmbeddings {
    async fn embed(&self, _: &str) -> Result<Vec<f32>, RagError> {
        Ok(vec![0.5; 8])
    }
}

fn two_paragraph_page(tag: &str) -> String {
    format!("# {tag}\n\nFirst paragraph about {tag}.\n\nSecond paragraph about {tag}.")
}

fn build_pipeline(
    export_root: &std::path::Path,
    fetcher: Arc<StaticFetcher>,
    chat: Arc<dyn ChatProvider>,
    store: Arc<dyn Backend>,
    recrawl: bool,
) -> Pipeline {
    init_tracing();
    let mut config = PipelineConfig::new(export_root, "test-session");
    config.recrawl = recrawl;
    Pipeline::builder()
        .config(config)
        .fetcher(fetcher)
        .chat(chat)
        .embeddings(Arc::new(StaticEmbeddings))
        .store(store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn crawl_persists_documents_chunks_and_store_rows() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StaticFetcher::new(&[
        ("https://example.com/a", &two_paragraph_page("alpha")),
        ("https://example.com/b", &two_paragraph_page("beta")),
    ]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let chat = Arc::new(CountingChat::new());
    let pipeline = build_pipeline(dir.path(), fetcher.clone(), chat, store.clone(), false);

    let urls = vec![
        "https://example.com/a".to_string(),
        "https://example.com/b".to_string(),
    ];
    let report = pipeline.process_urls(&urls).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.progress.success.len(), 2);
    assert!(report.progress.failed.is_empty());

    for outcome in &report.outcomes {
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.chunks.len(), 1, "short pages fit a single chunk");
        let chunk = &outcome.chunks[0];
        assert!(chunk.has_title_and_summary());
        assert!(chunk.has_embedding());
    }

    // Page documents and chunk files are on disk.
    let a = Url::parse("https://example.com/a").unwrap();
    assert!(pipeline.cache().document_path(&a).exists());
    assert!(pipeline.cache().chunk_path(&a, 0).exists());
    assert!(pipeline.cache().progress_path("test-session").exists());

    assert_eq!(store.count().await.unwrap(), 2);
    let rows = store.chunks_for_url("https://example.com/a").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].embedding, vec![0.5; 8]);
}

#[tokio::test]
async fn successful_urls_are_skipped_on_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StaticFetcher::new(&[(
        "https://example.com/a",
        &two_paragraph_page("alpha"),
    )]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let urls = vec!["https://example.com/a".to_string()];

    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        Arc::new(CountingChat::new()),
        store.clone(),
        false,
    );
    pipeline.process_urls(&urls).await.unwrap();
    assert_eq!(fetcher.calls(), 1);

    // Fresh pipeline over the same export root reads the same progress log.
    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        Arc::new(CountingChat::new()),
        store.clone(),
        false,
    );
    let report = pipeline.process_urls(&urls).await.unwrap();
    assert_eq!(report.skipped, urls);
    assert!(report.outcomes.is_empty());
    assert_eq!(fetcher.calls(), 1, "skipped URL must not be re-fetched");
}

#[tokio::test]
async fn recrawl_reuses_cached_enrichment_for_identical_content() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StaticFetcher::new(&[(
        "https://example.com/a",
        &two_paragraph_page("alpha"),
    )]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let urls = vec!["https://example.com/a".to_string()];

    let first_chat = Arc::new(CountingChat::new());
    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        first_chat.clone(),
        store.clone(),
        false,
    );
    pipeline.process_urls(&urls).await.unwrap();
    assert_eq!(first_chat.calls(), 1);

    // Recrawl fetches the page again, but identical chunk content means the
    // disk cache supplies title/summary/embedding and no LLM call happens.
    let second_chat = Arc::new(CountingChat::new());
    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        second_chat.clone(),
        store.clone(),
        true,
    );
    let report = pipeline.process_urls(&urls).await.unwrap();

    assert_eq!(fetcher.calls(), 2);
    assert_eq!(second_chat.calls(), 0);
    let chunk = &report.outcomes[0].chunks[0];
    assert_eq!(chunk.title.as_deref(), Some("Title 0"));

    // The store still holds one row per (url, chunk_number).
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn one_failing_url_does_not_stop_the_batch_and_is_retried_later() {
    let dir = tempfile::tempdir().unwrap();
    // No fixture for /missing, so its fetch fails.
    let fetcher = Arc::new(StaticFetcher::new(&[(
        "https://example.com/a",
        &two_paragraph_page("alpha"),
    )]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let urls = vec![
        "https://example.com/missing".to_string(),
        "https://example.com/a".to_string(),
    ];

    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        Arc::new(CountingChat::new()),
        store.clone(),
        false,
    );
    let report = pipeline.process_urls(&urls).await.unwrap();

    assert!(report.progress.success.contains("https://example.com/a"));
    assert!(report.progress.failed.contains("https://example.com/missing"));
    let failed = report
        .outcomes
        .iter()
        .find(|o| o.url == "https://example.com/missing")
        .unwrap();
    assert!(failed.chunks.is_empty());
    assert!(!failed.failures.is_empty());

    // A later run skips the success but queues the failure again.
    let calls_before = fetcher.calls();
    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        Arc::new(CountingChat::new()),
        store.clone(),
        false,
    );
    let report = pipeline.process_urls(&urls).await.unwrap();
    assert_eq!(report.skipped, vec!["https://example.com/a".to_string()]);
    assert_eq!(fetcher.calls(), calls_before + 1, "failed URL is retried");
    assert!(report.progress.failed.contains("https://example.com/missing"));
}

#[tokio::test]
async fn enrichment_failure_still_persists_the_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StaticFetcher::new(&[(
        "https://example.com/a",
        &two_paragraph_page("alpha"),
    )]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let pipeline = build_pipeline(
        dir.path(),
        fetcher,
        Arc::new(FailingChat),
        store.clone(),
        false,
    );

    let urls = vec!["https://example.com/a".to_string()];
    let report = pipeline.process_urls(&urls).await.unwrap();

    // The page still counts as processed; the chat failure lives on the chunk.
    assert!(report.progress.success.contains("https://example.com/a"));
    let chunk = &report.outcomes[0].chunks[0];
    assert!(chunk.title.is_none());
    assert!(chunk.has_embedding());
    assert!(
        chunk
            .error_logs
            .iter()
            .any(|log| log.contains("title/summary"))
    );

    // Stored row substitutes the placeholder title.
    let rows = store.chunks_for_url("https://example.com/a").await.unwrap();
    assert_eq!(rows[0].title, "No Title");
}

#[tokio::test]
async fn blank_url_entries_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StaticFetcher::new(&[]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let pipeline = build_pipeline(
        dir.path(),
        fetcher.clone(),
        Arc::new(CountingChat::new()),
        store,
        false,
    );

    let urls = vec!["".to_string(), "   ".to_string()];
    let report = pipeline.process_urls(&urls).await.unwrap();
    assert!(report.outcomes.is_empty());
    assert!(report.skipped.is_empty());
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn url_manifest_records_only_non_blank_entries() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(StaticFetcher::new(&[(
        "https://example.com/a",
        &two_paragraph_page("alpha"),
    )]));
    let store = Arc::new(SqliteChunkStore::open_in_memory("chunks").await.unwrap());
    let pipeline = build_pipeline(
        dir.path(),
        fetcher,
        Arc::new(CountingChat::new()),
        store,
        false,
    );

    let urls = vec![
        "".to_string(),
        "https://example.com/a".to_string(),
        "   ".to_string(),
    ];
    pipeline.process_urls(&urls).await.unwrap();

    let manifest =
        std::fs::read_to_string(pipeline.cache().urls_path("test-session")).unwrap();
    assert_eq!(manifest, "https://example.com/a");
}
