//! Markdown-with-frontmatter persistence for pages and chunks.
//!
//! Files carry a `---`-delimited frontmatter block of `key: value` lines
//! (keys omitted when the value is absent), followed by the raw content.
//! Writers create parent directories as needed and overwrite any existing
//! file unconditionally.

use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::fs;
use url::Url;

use crate::ingestion::chunk::{ChunkMetadata, ProcessedChunk};
use crate::types::RagError;

/// Splits a raw file into its frontmatter fields and body.
///
/// Returns `None` when the file carries no frontmatter block. The body is
/// everything after the closing fence, verbatim, so round-tripping preserves
/// content byte-for-byte.
pub fn split_frontmatter(raw: &str) -> Option<(Vec<(String, String)>, &str)> {
    let rest = raw.strip_prefix("---\n")?;
    let end = rest.find("\n---\n")?;
    let (head, body) = (&rest[..end], &rest[end + 5..]);

    let fields = head
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect();

    Some((fields, body))
}

/// Renders a chunk in the persisted frontmatter layout.
///
/// Key order is fixed: `url`, `session_id`, `chunk_number`, `title`,
/// `summary`, `embedding`, `metadata`, `updated_dt`.
pub fn render_chunk(chunk: &ProcessedChunk, updated_dt: DateTime<Utc>) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("url: {}", chunk.url),
        format!("session_id: {}", chunk.source),
        format!("chunk_number: {}", chunk.chunk_number),
    ];
    if let Some(title) = &chunk.title {
        lines.push(format!("title: {}", sanitize_value(title)));
    }
    if let Some(summary) = &chunk.summary {
        lines.push(format!("summary: {}", sanitize_value(summary)));
    }
    if let Some(embedding) = &chunk.embedding {
        let encoded = serde_json::to_string(embedding).unwrap_or_else(|_| "[]".to_string());
        lines.push(format!("embedding: {encoded}"));
    }
    if let Ok(metadata) = serde_json::to_string(&chunk.metadata) {
        lines.push(format!("metadata: {metadata}"));
    }
    lines.push(format!("updated_dt: {}", updated_dt.to_rfc3339()));
    lines.push("---".to_string());
    lines.push(chunk.content.clone());
    lines.join("\n")
}

/// Frontmatter values live on a single line; newlines would break the
/// `key: value` layout.
fn sanitize_value(value: &str) -> String {
    value.replace(['\n', '\r'], " ").trim().to_string()
}

/// Reconstructs a chunk from a persisted markdown file's text.
///
/// Missing or malformed fields fall back to defaults; a file without a
/// frontmatter block is an error.
pub fn parse_chunk(raw: &str) -> Result<ProcessedChunk, RagError> {
    let (fields, body) = split_frontmatter(raw)
        .ok_or_else(|| RagError::Serialization("missing frontmatter block".to_string()))?;

    let field = |name: &str| {
        fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    };

    let url = field("url").unwrap_or("unknown-url").to_string();
    let source = field("session_id").unwrap_or("unknown-source").to_string();
    let chunk_number = field("chunk_number")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let title = field("title").filter(|v| !v.is_empty()).map(str::to_string);
    let summary = field("summary")
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let embedding = field("embedding")
        .and_then(|v| serde_json::from_str::<Vec<f32>>(v).ok())
        .filter(|e| !e.is_empty());
    let metadata = field("metadata")
        .and_then(|v| serde_json::from_str::<ChunkMetadata>(v).ok())
        .unwrap_or_else(|| ChunkMetadata::derive(&source, &url, body));

    Ok(ProcessedChunk {
        source,
        url,
        chunk_number,
        content: body.to_string(),
        title,
        summary,
        embedding,
        error_logs: Vec::new(),
        metadata,
    })
}

/// Writes a chunk file, creating parent directories and overwriting any
/// previous version.
pub async fn write_chunk(path: &Path, chunk: &ProcessedChunk) -> Result<(), RagError> {
    write_raw(path, &render_chunk(chunk, Utc::now())).await
}

pub async fn read_chunk(path: &Path) -> Result<ProcessedChunk, RagError> {
    let raw = fs::read_to_string(path).await?;
    parse_chunk(&raw)
}

/// Writes a whole-page markdown document (frontmatter carries only the URL
/// and session id).
pub async fn write_document(
    path: &Path,
    url: &Url,
    session_id: &str,
    content: &str,
) -> Result<(), RagError> {
    let raw = [
        "---".to_string(),
        format!("url: {url}"),
        format!("session_id: {session_id}"),
        format!("updated_dt: {}", Utc::now().to_rfc3339()),
        "---".to_string(),
        content.to_string(),
    ]
    .join("\n");
    write_raw(path, &raw).await
}

/// Reads a page document back, returning only its body.
pub async fn read_document(path: &Path) -> Result<String, RagError> {
    let raw = fs::read_to_string(path).await?;
    match split_frontmatter(&raw) {
        Some((_, body)) => Ok(body.to_string()),
        None => Ok(raw),
    }
}

async fn write_raw(path: &Path, raw: &str) -> Result<(), RagError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, raw).await?;
    Ok(())
}
