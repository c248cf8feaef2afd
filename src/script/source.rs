//! Resolving script origins to cached files

use crate::cache::{digest_hex, ContentCache};
use crate::error::{ScriptrunError, ScriptrunResult};
use crate::script::fetch::{Fetcher, HttpFetcher};
use crate::script::kind::ScriptKind;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

/// File name prefix for scripts given as literal text
pub const LITERAL_PREFIX: &str = "scriptlet";

/// File name prefix for scripts fetched from a URL; their digest is over the URL
pub const URL_PREFIX: &str = "url";

/// Where a script's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    Literal(String),
    Url(String),
}

impl ScriptOrigin {
    /// Treat `http://`, `https://` and `file://` arguments as URLs, anything
    /// else as script text
    pub fn parse(arg: &str) -> Self {
        let is_url = ["http://", "https://", "file://"]
            .iter()
            .any(|scheme| arg.starts_with(scheme));
        if is_url {
            Self::Url(arg.to_string())
        } else {
            Self::Literal(arg.to_string())
        }
    }
}

/// Materializes scripts into the content cache
pub struct ScriptSource<F = HttpFetcher> {
    cache: ContentCache,
    fetcher: F,
    literal_extension: String,
}

impl ScriptSource<HttpFetcher> {
    pub fn with_http(cache: ContentCache) -> Self {
        Self::new(cache, HttpFetcher::new())
    }
}

impl<F: Fetcher> ScriptSource<F> {
    pub fn new(cache: ContentCache, fetcher: F) -> Self {
        Self {
            cache,
            fetcher,
            literal_extension: ScriptKind::Script.extension().to_string(),
        }
    }

    /// Extension used for literal scripts when the caller does not pass one
    pub fn literal_extension(mut self, extension: impl Into<String>) -> Self {
        self.literal_extension = extension.into();
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Resolve any origin to the path of its cached file
    pub async fn resolve(&self, origin: &ScriptOrigin) -> ScriptrunResult<PathBuf> {
        match origin {
            ScriptOrigin::Literal(text) => self.resolve_literal(text, None).await,
            ScriptOrigin::Url(url) => self.resolve_url(url).await,
        }
    }

    /// Cache literal script text under its own digest
    pub async fn resolve_literal(
        &self,
        text: &str,
        extension: Option<&str>,
    ) -> ScriptrunResult<PathBuf> {
        let extension = extension.unwrap_or(self.literal_extension.as_str());
        self.publish(None, text.to_string(), LITERAL_PREFIX, extension.to_string())
            .await
    }

    /// Cache a remote script under the digest of its URL.
    ///
    /// An existing entry for the URL is returned without any network access,
    /// even if the remote content has changed since.
    pub async fn resolve_url(&self, url: &str) -> ScriptrunResult<PathBuf> {
        let digest = digest_hex(url);
        let suffix_kind = ScriptKind::from_url(url);

        let candidates = match suffix_kind {
            Some(kind) => vec![kind],
            None => ScriptKind::ALL.to_vec(),
        };
        for kind in candidates {
            if let Some(path) = self.cache.lookup(&digest, URL_PREFIX, kind.extension()) {
                debug!("Using cached copy of {}: {}", url, path.display());
                return Ok(path);
            }
        }

        info!("Fetching script from {}", url);
        let content = self.fetcher.fetch(url).await?;
        let kind = suffix_kind.unwrap_or_else(|| ScriptKind::from_content(&content));
        debug!("Classified {} as .{}", url, kind);

        self.publish(
            Some(url.to_string()),
            content,
            URL_PREFIX,
            kind.extension().to_string(),
        )
        .await
    }

    /// Write an entry on the blocking pool, keyed by `key` or else by the content
    async fn publish(
        &self,
        key: Option<String>,
        content: String,
        prefix: &'static str,
        extension: String,
    ) -> ScriptrunResult<PathBuf> {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || match key {
            Some(key) => cache.materialize_keyed(key.as_bytes(), content.as_bytes(), prefix, &extension),
            None => cache.materialize(content.as_bytes(), prefix, &extension),
        })
        .await
        .map_err(|e| ScriptrunError::io("writing cache entry", io::Error::other(e)))?
    }
}
