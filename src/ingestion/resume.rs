//! Crawl progress bookkeeping for resumable runs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::types::RagError;

/// Success/failure URL sets for one crawl session.
///
/// A URL lives in at most one set: marking it success removes it from
/// `failed` and vice versa, so retries relocate rather than duplicate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProgressState {
    pub success: HashSet<String>,
    pub failed: HashSet<String>,
}

/// Tracks which URLs a crawl session has processed so re-runs can skip
/// completed work and automatically retry failures.
///
/// State is persisted as JSON keyed by session id; every checkpoint fully
/// overwrites the prior log file.
#[derive(Clone, Debug)]
pub struct CrawlProgress {
    path: PathBuf,
    state: Arc<Mutex<ProgressState>>,
}

impl CrawlProgress {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Arc::new(Mutex::new(ProgressState::default())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads previously persisted state; a missing file is an empty log.
    pub async fn load(&self) -> Result<(), RagError> {
        if !self.path.exists() {
            return Ok(());
        }
        let data = fs::read_to_string(&self.path).await?;
        let loaded: ProgressState =
            serde_json::from_str(&data).map_err(|err| RagError::Serialization(err.to_string()))?;
        *self.state.lock().await = loaded;
        Ok(())
    }

    pub async fn is_success(&self, url: &str) -> bool {
        self.state.lock().await.success.contains(url)
    }

    pub async fn mark_success(&self, url: &str) {
        let mut guard = self.state.lock().await;
        guard.failed.remove(url);
        guard.success.insert(url.to_string());
    }

    pub async fn mark_failure(&self, url: &str) {
        let mut guard = self.state.lock().await;
        guard.success.remove(url);
        guard.failed.insert(url.to_string());
    }

    pub async fn snapshot(&self) -> ProgressState {
        self.state.lock().await.clone()
    }

    /// Persists the current state, overwriting the prior log file.
    pub async fn checkpoint(&self) -> Result<(), RagError> {
        let serialized = {
            let guard = self.state.lock().await;
            serde_json::to_string_pretty(&*guard)
                .map_err(|err| RagError::Serialization(err.to_string()))?
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, serialized).await?;
        Ok(())
    }
}
