//! Page retrieval behind an injectable trait.
//!
//! The pipeline never constructs its own network client at the call site;
//! the fetcher is a collaborator supplied at build time, so tests swap in a
//! canned implementation and the orchestrator stays free of transport
//! details.

use async_trait::async_trait;
use url::Url;

use crate::types::RagError;

/// A fetched page, ready for chunking.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    pub url: Url,
    pub content: String,
}

/// Retrieves the markdown/text content behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, session_id: &str) -> Result<FetchedPage, RagError>;
}

/// `reqwest`-backed fetcher for plain HTTP(S) pages.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, session_id: &str) -> Result<FetchedPage, RagError> {
        tracing::debug!(%url, session_id, "fetching page");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| RagError::Fetch(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Fetch(err.to_string()))?;
        let content = response
            .text()
            .await
            .map_err(|err| RagError::Fetch(err.to_string()))?;
        Ok(FetchedPage {
            url: url.clone(),
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn fetches_page_text() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/docs");
                then.status(200).body("# Docs\n\nhello");
            })
            .await;

        let url = Url::parse(&server.url("/docs")).unwrap();
        let page = HttpFetcher::default().fetch(&url, "sess").await.unwrap();
        mock.assert_async().await;
        assert_eq!(page.content, "# Docs\n\nhello");
        assert_eq!(page.url, url);
    }

    #[tokio::test]
    async fn http_error_status_is_a_fetch_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let url = Url::parse(&server.url("/missing")).unwrap();
        let err = HttpFetcher::default().fetch(&url, "sess").await.unwrap_err();
        assert!(matches!(err, RagError::Fetch(_)));
    }
}
