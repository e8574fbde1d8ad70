//! SQLite-backed chunk document store.
//!
//! Embeddings and metadata are stored as JSON text columns; similarity
//! search over the vectors is a downstream concern and not part of this
//! store.

use std::path::Path;

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use super::{Backend, StoreRecord};
use crate::types::RagError;

/// Chunk document table over a `tokio_rusqlite` connection.
///
/// Rows are keyed by `(url, chunk_number)`; inserting an existing key
/// replaces the row's contents.
#[derive(Clone)]
pub struct SqliteChunkStore {
    conn: Connection,
    table: String,
}

impl std::fmt::Debug for SqliteChunkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteChunkStore")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteChunkStore {
    /// Opens (or creates) the database at `path` and ensures the chunk
    /// table exists.
    pub async fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, RagError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::with_connection(conn, table).await
    }

    /// In-memory store, used by tests and dry runs.
    pub async fn open_in_memory(table: &str) -> Result<Self, RagError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        Self::with_connection(conn, table).await
    }

    async fn with_connection(conn: Connection, table: &str) -> Result<Self, RagError> {
        let table = validate_table_name(table)?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                url TEXT NOT NULL,
                chunk_number INTEGER NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding TEXT NOT NULL,
                updated_dt TEXT NOT NULL,
                PRIMARY KEY (url, chunk_number)
            )"
        );
        conn.call(move |conn| -> Result<(), tokio_rusqlite::Error> {
            conn.execute(&ddl, [])
                .map_err(tokio_rusqlite::Error::Error)?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self { conn, table })
    }

    /// Underlying connection, for queries not covered by [`Backend`].
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// Table names are interpolated into SQL, so only identifier characters are
/// accepted.
fn validate_table_name(table: &str) -> Result<String, RagError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(table.to_string())
    } else {
        Err(RagError::Configuration(format!(
            "invalid table name '{table}'"
        )))
    }
}

#[async_trait]
impl Backend for SqliteChunkStore {
    async fn upsert_chunks(&self, records: Vec<StoreRecord>) -> Result<(), RagError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let metadata = serde_json::to_string(&record.metadata)?;
            let embedding = serde_json::to_string(&record.embedding)?;
            rows.push((
                record.url,
                record.chunk_number as i64,
                record.title,
                record.summary,
                record.content,
                metadata,
                embedding,
            ));
        }

        let sql = format!(
            "INSERT INTO {} (url, chunk_number, title, summary, content, metadata, embedding, updated_dt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))
             ON CONFLICT(url, chunk_number) DO UPDATE SET
                 title = excluded.title,
                 summary = excluded.summary,
                 content = excluded.content,
                 metadata = excluded.metadata,
                 embedding = excluded.embedding,
                 updated_dt = excluded.updated_dt",
            self.table
        );

        self.conn
            .call(move |conn| -> Result<(), tokio_rusqlite::Error> {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Error)?;
                {
                    let mut stmt = tx.prepare(&sql).map_err(tokio_rusqlite::Error::Error)?;
                    for (url, chunk_number, title, summary, content, metadata, embedding) in &rows {
                        stmt.execute(tokio_rusqlite::rusqlite::params![
                            url,
                            chunk_number,
                            title,
                            summary,
                            content,
                            metadata,
                            embedding
                        ])
                        .map_err(tokio_rusqlite::Error::Error)?;
                    }
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn chunks_for_url(&self, url: &str) -> Result<Vec<StoreRecord>, RagError> {
        let url = url.to_string();
        let sql = format!(
            "SELECT url, chunk_number, title, summary, content, metadata, embedding
             FROM {} WHERE url = ?1 ORDER BY chunk_number",
            self.table
        );

        self.conn
            .call(move |conn| -> Result<Vec<StoreRecord>, tokio_rusqlite::Error> {
                let mut stmt = conn.prepare(&sql).map_err(tokio_rusqlite::Error::Error)?;
                let rows = stmt
                    .query_map([&url], |row| {
                        let chunk_number: i64 = row.get(1)?;
                        let metadata: String = row.get(5)?;
                        let embedding: String = row.get(6)?;
                        Ok(StoreRecord {
                            url: row.get(0)?,
                            chunk_number: chunk_number.max(0) as usize,
                            title: row.get(2)?,
                            summary: row.get(3)?,
                            content: row.get(4)?,
                            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                            embedding: serde_json::from_str(&embedding).unwrap_or_default(),
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut records = Vec::new();
                for row in rows {
                    records.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(records)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, RagError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        self.conn
            .call(move |conn| -> Result<usize, tokio_rusqlite::Error> {
                let count: i64 = conn
                    .query_row(&sql, [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(count.max(0) as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }
}
