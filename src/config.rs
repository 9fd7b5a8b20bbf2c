use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::models::SourceDescriptor;
use crate::search::matcher::DEFAULT_ACCEPTANCE_THRESHOLD;

/// Curated GitHub repositories scanned when no sources are configured.
pub const DEFAULT_SOURCES: &[&str] = &[
    "fancy88/iBook",
    "it-ebooks-0/geektime-books",
    "hehonghui/awesome-english-ebooks",
    "forthespada/CS-Books",
    "imarvinle/awesome-cs-books",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Aggregator tuning
    pub search: SearchConfig,
    /// Sources every search fans out to
    pub sources: Vec<SourceDescriptor>,
    /// Settings shared by the source clients
    pub listing: ListingConfig,
    /// Background searches kept in memory for polling
    pub max_tracked_searches: usize,
    /// Background searches allowed to run at once
    pub max_running_searches: usize,
}

/// Per-search knobs for the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Deadline for each source, independent of the others.
    pub timeout_per_source: Duration,
    /// Stop once the result set holds this many matches. 0 never stops early.
    pub max_total_matches: usize,
    /// Sources scanned at once. `None` scans all of them in parallel.
    pub concurrency_limit: Option<usize>,
    /// Matcher scores below this are discarded.
    pub acceptance_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_per_source: Duration::from_secs(15),
            max_total_matches: 30,
            concurrency_limit: None,
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
        }
    }
}

impl SearchConfig {
    /// Permits to hand out for `sources` scan tasks. Always at least 1.
    pub fn effective_concurrency(&self, sources: usize) -> usize {
        let all = sources.max(1);
        self.concurrency_limit.unwrap_or(all).clamp(1, all)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Expands `{api}` in endpoint templates
    pub api_base_url: String,
    /// Base for raw file download links of git tree sources
    pub web_base_url: String,
    pub user_agent: String,
    /// Lowercase extensions, without the dot, that count as books
    pub book_extensions: Vec<String>,
    /// Upper bound on pages fetched from one paginated listing
    pub max_listing_pages: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            web_base_url: "https://github.com".to_string(),
            user_agent: concat!("book-search/", env!("CARGO_PKG_VERSION")).to_string(),
            book_extensions: ["epub", "pdf", "mobi", "azw3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_listing_pages: 10,
        }
    }
}

impl ListingConfig {
    pub fn is_book_file(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.book_extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9100".to_string(),
            search: SearchConfig::default(),
            sources: DEFAULT_SOURCES
                .iter()
                .map(|slug| SourceDescriptor::git_repo(slug))
                .collect(),
            listing: ListingConfig::default(),
            max_tracked_searches: 32,
            max_running_searches: 8,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup. Unparsable values
    /// keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("BOOK_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(val) = lookup("BOOK_SEARCH_TIMEOUT_SECS") {
            if let Ok(v) = val.parse::<u64>() {
                config.search.timeout_per_source = Duration::from_secs(v.max(1));
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_MAX_MATCHES") {
            if let Ok(v) = val.parse() {
                config.search.max_total_matches = v;
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_CONCURRENCY") {
            if let Ok(v) = val.parse::<usize>() {
                config.search.concurrency_limit = Some(v.max(1));
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_THRESHOLD") {
            if let Ok(v) = val.parse::<f32>() {
                if v.is_finite() {
                    config.search.acceptance_threshold = v.clamp(0.0, 1.0);
                }
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_SOURCES") {
            let mut seen = HashSet::new();
            let sources: Vec<SourceDescriptor> = split_list(&val)
                .filter(|slug| slug.contains('/'))
                .map(SourceDescriptor::git_repo)
                .filter(|d| seen.insert(d.id.clone()))
                .collect();
            if !sources.is_empty() {
                config.sources = sources;
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_EXTENSIONS") {
            let exts: Vec<String> = split_list(&val)
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            if !exts.is_empty() {
                config.listing.book_extensions = exts;
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_MAX_PAGES") {
            if let Ok(v) = val.parse::<usize>() {
                config.listing.max_listing_pages = v.max(1);
            }
        }
        if let Some(url) = lookup("GITHUB_API_BASE_URL") {
            config.listing.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = lookup("GITHUB_WEB_BASE_URL") {
            config.listing.web_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(agent) = lookup("BOOK_SEARCH_USER_AGENT") {
            config.listing.user_agent = agent;
        }
        if let Some(val) = lookup("BOOK_SEARCH_MAX_TRACKED") {
            if let Ok(v) = val.parse::<usize>() {
                config.max_tracked_searches = v.max(1);
            }
        }
        if let Some(val) = lookup("BOOK_SEARCH_MAX_RUNNING") {
            if let Ok(v) = val.parse::<usize>() {
                config.max_running_searches = v.max(1);
            }
        }

        config
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}
