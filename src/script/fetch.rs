//! Remote script retrieval

use crate::error::{ScriptrunError, ScriptrunResult};
use async_trait::async_trait;
use tracing::debug;

/// Retrieves script text for a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full body as text. Failures are final; nothing retries.
    async fn fetch(&self, url: &str) -> ScriptrunResult<String>;
}

/// Fetches `http(s)://` with ureq and `file://` from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    /// Blocking GET; non-2xx statuses are errors
    fn get(url: &str) -> ScriptrunResult<String> {
        let mut response = ureq::get(url)
            .call()
            .map_err(|e| ScriptrunError::fetch(url, e))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|e| ScriptrunError::fetch(url, e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> ScriptrunResult<String> {
        debug!("Fetching {}", url);

        if let Some(path) = url.strip_prefix("file://") {
            return tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ScriptrunError::fetch(url, e));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ScriptrunError::fetch(url, "unsupported URL scheme"));
        }

        let owned = url.to_string();
        tokio::task::spawn_blocking(move || Self::get(&owned))
            .await
            .map_err(|e| ScriptrunError::fetch(url, e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn fetches_file_url() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.kts");
        std::fs::write(&path, "println(\"from file\")").unwrap();

        let text = HttpFetcher::new()
            .fetch(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(text, "println(\"from file\")");
    }

    #[tokio::test]
    async fn missing_file_is_fetch_error() {
        let err = HttpFetcher::new()
            .fetch("file:///definitely/not/here.kts")
            .await
            .unwrap_err();
        assert!(matches!(err, ScriptrunError::Fetch { .. }));
    }

    #[tokio::test]
    async fn refused_connection_is_fetch_error() {
        let err = HttpFetcher::new()
            .fetch("http://127.0.0.1:1/script.kts")
            .await
            .unwrap_err();
        match err {
            ScriptrunError::Fetch { url, .. } => assert_eq!(url, "http://127.0.0.1:1/script.kts"),
            other => panic!("expected Fetch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unsupported_scheme() {
        let err = HttpFetcher::new().fetch("ftp://host/a.kts").await.unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
