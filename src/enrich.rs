//! LLM enrichment of chunks: title/summary extraction and embeddings.
//!
//! The enricher never fails the chunk it is given. Each step (title+summary,
//! embedding) is attempted independently; a failing provider call becomes an
//! entry in the chunk's `error_logs` and the remaining steps still run, so a
//! chunk with a dead embedding endpoint still gets its title.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ingestion::chunk::ProcessedChunk;
use crate::types::RagError;

/// How much of the chunk body is handed to the title/summary prompt.
const TITLE_SUMMARY_CONTEXT_CHARS: usize = 1000;

/// System instructions for the title/summary extraction call.
pub const TITLE_SUMMARY_PROMPT: &str = "You are an AI that extracts titles and \
summaries from documentation chunks. Return a JSON object with 'title' and \
'summary' keys. For the title: if this seems like the start of a document, \
extract its title; otherwise derive a descriptive title for the chunk. For \
the summary: create a concise summary of the main points in this chunk. Keep \
both title and summary concise but informative.";

/// Text-completion collaborator. Implementations return the parsed JSON
/// object the model produced.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, RagError>;
}

/// Embedding collaborator.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// Runs the enrichment steps against injected providers.
#[derive(Clone)]
pub struct Enricher {
    chat: Arc<dyn ChatProvider>,
    embeddings: Arc<dyn EmbeddingProvider>,
}

impl Enricher {
    pub fn new(chat: Arc<dyn ChatProvider>, embeddings: Arc<dyn EmbeddingProvider>) -> Self {
        Self { chat, embeddings }
    }

    /// Fills in title, summary, and embedding for `chunk`.
    ///
    /// With `replace_existing` false, steps whose outputs are already present
    /// are skipped (the disk cache may have filled them). Failures are
    /// recorded on the chunk; this method itself cannot fail.
    pub async fn generate_metadata(&self, chunk: &mut ProcessedChunk, replace_existing: bool) {
        if replace_existing || !chunk.has_title_and_summary() {
            self.apply_title_and_summary(chunk).await;
        }
        if replace_existing || !chunk.has_embedding() {
            self.apply_embedding(chunk).await;
        }
    }

    async fn apply_title_and_summary(&self, chunk: &mut ProcessedChunk) {
        let excerpt = char_prefix(&chunk.content, TITLE_SUMMARY_CONTEXT_CHARS);
        let user_prompt = format!("URL: {}\n\nContent:\n{}...", chunk.url, excerpt);

        match self.chat.complete(TITLE_SUMMARY_PROMPT, &user_prompt).await {
            Ok(value) => match parse_title_summary(&value) {
                Some((title, summary)) => {
                    chunk.title = Some(title);
                    chunk.summary = Some(summary);
                }
                None => chunk.log_error(format!(
                    "title/summary response missing expected keys: {value}"
                )),
            },
            Err(err) => chunk.log_error(format!("title/summary generation failed: {err}")),
        }
    }

    async fn apply_embedding(&self, chunk: &mut ProcessedChunk) {
        match self.embeddings.embed(&chunk.content).await {
            Ok(vector) => chunk.embedding = Some(vector),
            Err(err) => chunk.log_error(format!("embedding generation failed: {err}")),
        }
    }
}

fn parse_title_summary(value: &serde_json::Value) -> Option<(String, String)> {
    let title = value.get("title")?.as_str()?.to_string();
    let summary = value.get("summary")?.as_str()?.to_string();
    Some((title, summary))
}

/// First `max_chars` characters of `text`, respecting char boundaries.
fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
