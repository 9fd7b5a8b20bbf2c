use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{bounded, expand_template, fetch_json, file_name, SourceClient};
use crate::config::ListingConfig;
use crate::error::SourceError;
use crate::models::{RawCandidate, SourceDescriptor, SourceKind};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Scans a repository through the git host's recursive tree listing.
pub struct GitTreeClient {
    http: reqwest::Client,
    listing: Arc<ListingConfig>,
}

// ─── Listing format ──────────────────────────────────────

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<serde_json::Value>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GitTreeClient {
    pub fn new(http: reqwest::Client, listing: Arc<ListingConfig>) -> Self {
        Self { http, listing }
    }

    /// `{web}/{owner/repo}/raw/HEAD/{path}` with each path segment
    /// percent-encoded.
    pub fn download_url(&self, repo: &str, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!(
            "{}/{}/raw/HEAD/{}",
            self.listing.web_base_url.trim_end_matches('/'),
            repo,
            encoded.join("/")
        )
    }

    fn candidates(
        &self,
        descriptor: &SourceDescriptor,
        entries: Vec<serde_json::Value>,
    ) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for value in entries {
            let entry: TreeEntry = match serde_json::from_value(value) {
                Ok(e) => e,
                Err(_) => {
                    skipped += 1;
                    continue;
                }
            };
            if entry.kind != "blob" {
                continue;
            }
            let name = file_name(&entry.path);
            if !self.listing.is_book_file(name) {
                continue;
            }
            out.push(RawCandidate {
                source_id: descriptor.id.clone(),
                raw_name: name.to_string(),
                download_url: self.download_url(&descriptor.id, &entry.path),
                path: entry.path,
            });
        }

        if skipped > 0 {
            tracing::debug!("{}: skipped {skipped} malformed tree entries", descriptor.id);
        }
        out
    }
}

#[async_trait]
impl SourceClient for GitTreeClient {
    fn kind(&self) -> SourceKind {
        SourceKind::GitRepoTree
    }

    async fn scan(
        &self,
        descriptor: &SourceDescriptor,
        query: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawCandidate>, SourceError> {
        let url = expand_template(
            &descriptor.endpoint_template,
            &self.listing.api_base_url,
            query,
            None,
        );

        bounded(timeout, cancel, async {
            let body = fetch_json(&self.http, &url, &self.listing.user_agent, Some(GITHUB_ACCEPT))
                .await?;
            let listing: TreeResponse = serde_json::from_value(body)
                .map_err(|e| SourceError::Parse(format!("{url}: {e}")))?;
            if listing.truncated {
                tracing::warn!("{}: tree listing truncated by the host", descriptor.id);
            }
            Ok(self.candidates(descriptor, listing.tree))
        })
        .await
    }
}
