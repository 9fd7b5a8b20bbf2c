use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{bounded, expand_template, fetch_json, SourceClient};
use crate::config::ListingConfig;
use crate::error::SourceError;
use crate::models::{RawCandidate, SourceDescriptor, SourceKind};

/// Scans a JSON directory listing: either a bare array of entries or an
/// object with an `items` array. When the endpoint template contains
/// `{page}`, pages are fetched from 1 until an empty page or the configured
/// page cap.
pub struct FlatListingClient {
    http: reqwest::Client,
    listing: Arc<ListingConfig>,
}

#[derive(Deserialize)]
struct ListingEntry {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "type", default = "default_entry_type")]
    kind: String,
    download_url: Option<String>,
}

fn default_entry_type() -> String {
    "file".to_string()
}

/// Pull the entry array out of a listing document.
fn entries_of(body: serde_json::Value) -> Option<Vec<serde_json::Value>> {
    match body {
        serde_json::Value::Array(entries) => Some(entries),
        serde_json::Value::Object(mut map) => match map.remove("items") {
            Some(serde_json::Value::Array(entries)) => Some(entries),
            _ => None,
        },
        _ => None,
    }
}

impl FlatListingClient {
    pub fn new(http: reqwest::Client, listing: Arc<ListingConfig>) -> Self {
        Self { http, listing }
    }

    fn candidates(
        &self,
        descriptor: &SourceDescriptor,
        entries: Vec<serde_json::Value>,
    ) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for value in entries {
            let Ok(entry) = serde_json::from_value::<ListingEntry>(value) else {
                skipped += 1;
                continue;
            };
            if entry.kind != "file" || !self.listing.is_book_file(&entry.name) {
                continue;
            }
            let Some(download_url) = entry.download_url.filter(|u| !u.is_empty()) else {
                skipped += 1;
                continue;
            };
            out.push(RawCandidate {
                source_id: descriptor.id.clone(),
                path: entry.path.unwrap_or_else(|| entry.name.clone()),
                raw_name: entry.name,
                download_url,
            });
        }

        if skipped > 0 {
            tracing::debug!("{}: skipped {skipped} unusable listing entries", descriptor.id);
        }
        out
    }

    async fn scan_pages(
        &self,
        descriptor: &SourceDescriptor,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        let paged = descriptor.endpoint_template.contains("{page}");
        let max_pages = if paged {
            self.listing.max_listing_pages.max(1)
        } else {
            1
        };
        let mut out = Vec::new();

        for page in 1..=max_pages {
            // Page boundary: stop before issuing another request.
            if cancel.is_cancelled() {
                return Err(SourceError::Cancelled);
            }

            let url = expand_template(
                &descriptor.endpoint_template,
                &self.listing.api_base_url,
                query,
                paged.then_some(page),
            );
            let body = fetch_json(&self.http, &url, &self.listing.user_agent, None).await?;
            let entries = entries_of(body)
                .ok_or_else(|| SourceError::Parse(format!("{url}: not a listing")))?;
            if entries.is_empty() {
                break;
            }
            out.extend(self.candidates(descriptor, entries));
        }

        Ok(out)
    }
}

#[async_trait]
impl SourceClient for FlatListingClient {
    fn kind(&self) -> SourceKind {
        SourceKind::FlatListing
    }

    async fn scan(
        &self,
        descriptor: &SourceDescriptor,
        query: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        bounded(timeout, cancel, self.scan_pages(descriptor, query, cancel)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> FlatListingClient {
        FlatListingClient::new(reqwest::Client::new(), Arc::new(ListingConfig::default()))
    }

    #[test]
    fn test_entries_of_accepts_array_and_items() {
        assert_eq!(entries_of(json!([1, 2])).map(|e| e.len()), Some(2));
        assert_eq!(entries_of(json!({"items": [1]})).map(|e| e.len()), Some(1));
        assert!(entries_of(json!({"message": "Not Found"})).is_none());
        assert!(entries_of(json!("nope")).is_none());
    }

    #[test]
    fn test_candidates() {
        let descriptor = SourceDescriptor::flat_listing("mirror", "Mirror", "{api}/books");
        let entries = vec![
            json!({"name": "Clean Code.epub", "path": "books/Clean Code.epub", "type": "file",
                   "download_url": "https://cdn.example.com/Clean%20Code.epub"}),
            json!({"name": "Refactoring.mobi", "download_url": "https://cdn.example.com/r.mobi"}),
            json!({"name": "novels", "type": "dir", "download_url": null}),
            json!({"name": "notes.txt", "type": "file", "download_url": "https://cdn.example.com/n"}),
            json!({"name": "Missing Link.pdf", "type": "file"}),
            json!({"type": "file"}),
        ];

        let found = client().candidates(&descriptor, entries);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].raw_name, "Clean Code.epub");
        assert_eq!(found[0].path, "books/Clean Code.epub");
        assert_eq!(found[1].path, "Refactoring.mobi");
        assert_eq!(found[1].download_url, "https://cdn.example.com/r.mobi");
    }

    /// Serves one listing page and cancels the scan while doing so.
    struct CancelWhileServing(CancellationToken);

    impl wiremock::Respond for CancelWhileServing {
        fn respond(&self, _request: &wiremock::Request) -> wiremock::ResponseTemplate {
            self.0.cancel();
            wiremock::ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Dune.epub", "type": "file", "download_url": "https://cdn.example.com/d"}
            ]))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_checked_between_pages() {
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        Mock::given(method("GET"))
            .and(query_param("page", "1"))
            .respond_with(CancelWhileServing(cancel.clone()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let client = FlatListingClient::new(
            reqwest::Client::new(),
            Arc::new(ListingConfig {
                api_base_url: server.uri(),
                ..Default::default()
            }),
        );
        let descriptor =
            SourceDescriptor::flat_listing("shelf", "Shelf", "{api}/books?page={page}");

        let result = client.scan_pages(&descriptor, "dune", &cancel).await;
        assert!(matches!(result, Err(SourceError::Cancelled)));
    }
}
