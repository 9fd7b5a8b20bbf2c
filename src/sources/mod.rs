//! Source clients: one adapter per `SourceKind`.
//!
//! A client turns a `SourceDescriptor` into raw book candidates. It owns its
//! deadline (every scan runs through [`bounded`]) and skips listing entries
//! it cannot parse instead of failing the whole scan.

pub mod flat_listing;
pub mod git_tree;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::ListingConfig;
use crate::error::SourceError;
use crate::models::{RawCandidate, SourceDescriptor, SourceKind};

pub use flat_listing::FlatListingClient;
pub use git_tree::GitTreeClient;

/// Longest response body excerpt kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[async_trait]
pub trait SourceClient: Send + Sync {
    /// The descriptor kind this client understands.
    fn kind(&self) -> SourceKind;

    /// List the book files of one source.
    ///
    /// Must return within `timeout` and give up promptly once `cancel` fires.
    async fn scan(
        &self,
        descriptor: &SourceDescriptor,
        query: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawCandidate>, SourceError>;
}

/// Run a scan future under a deadline, racing it against cancellation.
pub async fn bounded<T, F>(
    timeout: Duration,
    cancel: &CancellationToken,
    scan: F,
) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(SourceError::Cancelled),

        result = tokio::time::timeout(timeout, scan) => match result {
            Ok(inner) => inner,
            Err(_) => Err(SourceError::Timeout),
        },
    }
}

/// Client lookup by source kind.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    clients: HashMap<SourceKind, Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in git tree and flat listing clients.
    pub fn with_default_clients(http: reqwest::Client, listing: ListingConfig) -> Self {
        let listing = Arc::new(listing);
        Self::new()
            .with_client(Arc::new(GitTreeClient::new(http.clone(), listing.clone())))
            .with_client(Arc::new(FlatListingClient::new(http, listing)))
    }

    /// Register a client, replacing any previous one for the same kind.
    pub fn with_client(mut self, client: Arc<dyn SourceClient>) -> Self {
        self.clients.insert(client.kind(), client);
        self
    }

    pub fn client_for(&self, kind: SourceKind) -> Option<Arc<dyn SourceClient>> {
        self.clients.get(&kind).cloned()
    }
}

/// Expand `{api}`, `{query}` and `{page}` in an endpoint template.
pub fn expand_template(template: &str, api_base: &str, query: &str, page: Option<usize>) -> String {
    let mut url = template
        .replace("{api}", api_base.trim_end_matches('/'))
        .replace("{query}", &urlencoding::encode(query));
    if let Some(page) = page {
        url = url.replace("{page}", &page.to_string());
    }
    url
}

/// Last path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// GET `url` and parse the body as JSON. Non-2xx answers are network errors,
/// bodies that are not JSON are parse errors.
pub(crate) async fn fetch_json(
    http: &reqwest::Client,
    url: &str,
    user_agent: &str,
    accept: Option<&str>,
) -> Result<serde_json::Value, SourceError> {
    let mut req = http.get(url).header(reqwest::header::USER_AGENT, user_agent);
    if let Some(accept) = accept {
        req = req.header(reqwest::header::ACCEPT, accept);
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return Err(SourceError::Network(format!("{url} returned {status}: {excerpt}")));
    }

    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| SourceError::Parse(format!("{url}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_template() {
        assert_eq!(
            expand_template(
                "{api}/repos/a/b/git/trees/HEAD?recursive=1",
                "https://api.github.com/",
                "x",
                None
            ),
            "https://api.github.com/repos/a/b/git/trees/HEAD?recursive=1"
        );
        assert_eq!(
            expand_template("{api}/list?q={query}&page={page}", "http://h", "深入 理解", Some(3)),
            "http://h/list?q=%E6%B7%B1%E5%85%A5%20%E7%90%86%E8%A7%A3&page=3"
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("a/b/Learning Python.epub"), "Learning Python.epub");
        assert_eq!(file_name("top.pdf"), "top.pdf");
    }

    #[test]
    fn test_registry_lookup() {
        let registry =
            SourceRegistry::with_default_clients(reqwest::Client::new(), ListingConfig::default());
        assert!(registry.client_for(SourceKind::GitRepoTree).is_some());
        assert!(registry.client_for(SourceKind::FlatListing).is_some());
        assert!(SourceRegistry::new().client_for(SourceKind::FlatListing).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = bounded(Duration::from_secs(1), &cancel, async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(SourceError::Timeout)));
    }

    #[tokio::test]
    async fn test_bounded_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = bounded(Duration::from_secs(60), &cancel, async { Ok(1) }).await;
        assert!(matches!(result, Err(SourceError::Cancelled)));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let cancel = CancellationToken::new();
        let result = bounded(Duration::from_secs(1), &cancel, async {
            Err::<(), _>(SourceError::Parse("bad".into()))
        })
        .await;
        assert!(matches!(result, Err(SourceError::Parse(_))));
    }
}
