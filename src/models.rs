use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SourceError, SourceErrorKind};

/// How a source exposes its contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A git host's recursive tree listing, one request per scan.
    GitRepoTree,
    /// A JSON directory listing, optionally paginated.
    FlatListing,
}

/// A curated remote repository of book files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub display_name: String,
    /// Listing URL. `{api}`, `{page}` and `{query}` are expanded by the client.
    pub endpoint_template: String,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    /// Descriptor for a GitHub repository given as `owner/repo`.
    pub fn git_repo(slug: &str) -> Self {
        let slug = slug.trim().trim_matches('/');
        let display_name = slug.rsplit('/').next().unwrap_or(slug).to_string();
        Self {
            id: slug.to_string(),
            display_name,
            endpoint_template: format!("{{api}}/repos/{slug}/git/trees/HEAD?recursive=1"),
            kind: SourceKind::GitRepoTree,
        }
    }

    pub fn flat_listing(id: &str, display_name: &str, endpoint_template: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            endpoint_template: endpoint_template.to_string(),
            kind: SourceKind::FlatListing,
        }
    }
}

/// One listing entry that looks like a book file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub source_id: String,
    pub path: String,
    pub raw_name: String,
    pub download_url: String,
}

/// A candidate accepted by the matcher
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub candidate: RawCandidate,
    /// In `[0, 1]`; exactly 1.0 only for substring matches.
    pub score: f32,
    pub matched_query: String,
    pub source_display_name: String,
    /// Position of the source in the search's descriptor list.
    pub source_order: usize,
    /// Position of the entry within its source's listing.
    pub listing_order: usize,
}

/// Longest label handed to list pickers.
const MAX_LABEL_CHARS: usize = 60;

impl Match {
    /// Tag the match with where it was found, for tie-breaking.
    pub fn found_at(mut self, source_order: usize, listing_order: usize) -> Self {
        self.source_order = source_order;
        self.listing_order = listing_order;
        self
    }

    /// Whether `self` ranks ahead of `other`: higher score first, then
    /// earlier source, then earlier listing entry.
    pub fn ranks_before(&self, other: &Match) -> bool {
        match self.score.total_cmp(&other.score) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                let ours = (self.source_order, self.listing_order);
                ours <= (other.source_order, other.listing_order)
            }
        }
    }

    pub fn display_name(&self) -> &str {
        &self.candidate.raw_name
    }

    pub fn download_url(&self) -> &str {
        &self.candidate.download_url
    }

    /// `"<file name> (<source>)"`, cut to 60 characters.
    pub fn display_label(&self) -> String {
        let label = format!("{} ({})", self.candidate.raw_name, self.source_display_name);
        if label.chars().count() <= MAX_LABEL_CHARS {
            return label;
        }
        let kept: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
        format!("{kept}...")
    }

    /// File name with characters most filesystems reject removed.
    pub fn suggested_filename(&self) -> String {
        self.candidate
            .raw_name
            .chars()
            .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
            .collect()
    }
}

/// The shape handed to the download step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSummary {
    pub display_name: String,
    pub download_url: String,
    pub source_display_name: String,
    pub score: f32,
    pub source_id: String,
    pub path: String,
    pub label: String,
    pub suggested_filename: String,
}

impl From<&Match> for MatchSummary {
    fn from(m: &Match) -> Self {
        Self {
            display_name: m.display_name().to_string(),
            download_url: m.download_url().to_string(),
            source_display_name: m.source_display_name.clone(),
            score: m.score,
            source_id: m.candidate.source_id.clone(),
            path: m.candidate.path.clone(),
            label: m.display_label(),
            suggested_filename: m.suggested_filename(),
        }
    }
}

/// Terminal result of scanning one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// `matches` counts entries accepted into the result set.
    Completed { matches: usize },
    Failed { error: SourceErrorKind },
    TimedOut,
    Cancelled,
}

impl ScanOutcome {
    /// Failed and timed-out scans both count toward "every source failed".
    pub fn is_failure(&self) -> bool {
        matches!(self, ScanOutcome::Failed { .. } | ScanOutcome::TimedOut)
    }
}

impl From<SourceError> for ScanOutcome {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Cancelled => ScanOutcome::Cancelled,
            SourceError::Timeout => ScanOutcome::TimedOut,
            SourceError::Network(_) => ScanOutcome::Failed {
                error: SourceErrorKind::Network,
            },
            SourceError::Parse(_) => ScanOutcome::Failed {
                error: SourceErrorKind::Parse,
            },
            SourceError::Unsupported(_) => ScanOutcome::Failed {
                error: SourceErrorKind::Unsupported,
            },
        }
    }
}

/// A scan outcome tagged with the source it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source_id: String,
    pub display_name: String,
    #[serde(flatten)]
    pub outcome: ScanOutcome,
}

/// Point-in-time view of a running or finished search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub sources_total: usize,
    /// Includes failed, timed-out and cancelled sources.
    pub sources_completed: usize,
    pub matches_found: usize,
    /// Display names of sources still in flight.
    pub currently_scanning: BTreeSet<String>,
    /// Terminal outcomes in completion order.
    pub outcomes: Vec<SourceOutcome>,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// Synchronous search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<MatchSummary>,
    pub progress: ProgressSnapshot,
}

/// Returned when a background search is accepted
#[derive(Debug, Clone, Serialize)]
pub struct StartSearchResponse {
    pub id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Running,
    Done,
    Failed,
}

/// State of a background search as seen by a poller
#[derive(Debug, Clone, Serialize)]
pub struct SearchJobResponse {
    pub id: Uuid,
    pub query: String,
    pub status: SearchStatus,
    pub started_at: DateTime<Utc>,
    pub progress: ProgressSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<MatchSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(name: &str, source: &str) -> Match {
        Match {
            candidate: RawCandidate {
                source_id: "owner/repo".to_string(),
                path: format!("books/{name}"),
                raw_name: name.to_string(),
                download_url: format!("https://example.com/{name}"),
            },
            score: 1.0,
            matched_query: "python".to_string(),
            source_display_name: source.to_string(),
            source_order: 0,
            listing_order: 0,
        }
    }

    #[test]
    fn test_git_repo_descriptor() {
        let d = SourceDescriptor::git_repo("fancy88/iBook");
        assert_eq!(d.id, "fancy88/iBook");
        assert_eq!(d.display_name, "iBook");
        assert_eq!(
            d.endpoint_template,
            "{api}/repos/fancy88/iBook/git/trees/HEAD?recursive=1"
        );
        assert_eq!(d.kind, SourceKind::GitRepoTree);
    }

    #[test]
    fn test_short_label_untouched() {
        let m = sample_match("Learning Python.epub", "iBook");
        assert_eq!(m.display_label(), "Learning Python.epub (iBook)");
    }

    #[test]
    fn test_long_label_truncated_to_sixty_chars() {
        let m = sample_match(&"a".repeat(80), "iBook");
        let label = m.display_label();
        assert_eq!(label.chars().count(), 60);
        assert!(label.ends_with("..."));
    }

    #[test]
    fn test_label_truncation_respects_char_boundaries() {
        let m = sample_match(&"深入理解计算机系统".repeat(10), "CS-Books");
        let label = m.display_label();
        assert_eq!(label.chars().count(), 60);
    }

    #[test]
    fn test_ties_rank_by_source_then_listing_position() {
        let first = sample_match("a.epub", "s").found_at(0, 3);
        let later_entry = sample_match("b.epub", "s").found_at(0, 5);
        let later_source = sample_match("c.epub", "s").found_at(1, 0);
        assert!(first.ranks_before(&later_entry));
        assert!(later_entry.ranks_before(&later_source));
        assert!(!later_source.ranks_before(&first));

        let mut weaker = sample_match("d.epub", "s").found_at(0, 0);
        weaker.score = 0.8;
        assert!(later_source.ranks_before(&weaker));
    }

    #[test]
    fn test_suggested_filename_strips_reserved_chars() {
        let m = sample_match("C++: A <Tour>?.epub", "iBook");
        assert_eq!(m.suggested_filename(), "C++ A Tour.epub");
    }

    #[test]
    fn test_scan_outcome_from_source_error() {
        assert_eq!(
            ScanOutcome::from(SourceError::Cancelled),
            ScanOutcome::Cancelled
        );
        assert_eq!(ScanOutcome::from(SourceError::Timeout), ScanOutcome::TimedOut);
        assert_eq!(
            ScanOutcome::from(SourceError::Parse("bad".into())),
            ScanOutcome::Failed {
                error: SourceErrorKind::Parse
            }
        );
        assert!(ScanOutcome::from(SourceError::Network("reset".into())).is_failure());
        assert!(!ScanOutcome::Cancelled.is_failure());
        assert!(!ScanOutcome::Completed { matches: 0 }.is_failure());
    }

    #[test]
    fn test_source_outcome_serializes_flat() {
        let outcome = SourceOutcome {
            source_id: "a/b".to_string(),
            display_name: "b".to_string(),
            outcome: ScanOutcome::Completed { matches: 2 },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["matches"], 2);
        assert_eq!(json["source_id"], "a/b");
    }
}
