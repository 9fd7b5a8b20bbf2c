use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::MatchSummary;
use crate::search::{Aggregator, ProgressTracker};
use crate::sources::SourceRegistry;

/// Where a background search stands.
#[derive(Debug, Clone)]
pub enum JobStatus {
    Running,
    Done(Vec<MatchSummary>),
    Failed(String),
}

/// A background search kept around for polling.
#[derive(Debug, Clone)]
pub struct SearchJob {
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub progress: Arc<ProgressTracker>,
    pub status: JobStatus,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregator: Aggregator,
    pub searches: Arc<RwLock<HashMap<Uuid, SearchJob>>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent(config.listing.user_agent.clone())
            .build()?;
        let registry = SourceRegistry::with_default_clients(http_client, config.listing.clone());
        Ok(Self::with_aggregator(config, Aggregator::new(registry)))
    }

    /// State around an existing aggregator, e.g. one with custom clients.
    pub fn with_aggregator(config: Config, aggregator: Aggregator) -> Self {
        Self {
            config: Arc::new(config),
            aggregator,
            searches: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a new running search and return its id and tracker, or
    /// `None` when `max_running_searches` are already running.
    pub fn track_search(&self, query: &str) -> Option<(Uuid, Arc<ProgressTracker>)> {
        let mut searches = self.searches.write();
        let running = searches
            .values()
            .filter(|job| matches!(job.status, JobStatus::Running))
            .count();
        if running >= self.config.max_running_searches {
            return None;
        }

        let id = Uuid::new_v4();
        let progress = Arc::new(ProgressTracker::new());
        searches.insert(
            id,
            SearchJob {
                query: query.to_string(),
                started_at: Utc::now(),
                progress: progress.clone(),
                status: JobStatus::Running,
            },
        );
        evict_finished(&mut searches, self.config.max_tracked_searches);
        Some((id, progress))
    }

    pub fn finish_search(&self, id: Uuid, status: JobStatus) {
        if let Some(job) = self.searches.write().get_mut(&id) {
            job.status = status;
        }
    }

    pub fn search_job(&self, id: Uuid) -> Option<SearchJob> {
        self.searches.read().get(&id).cloned()
    }
}

/// Drop the oldest finished searches until at most `max` remain. Running
/// searches are never evicted.
fn evict_finished(searches: &mut HashMap<Uuid, SearchJob>, max: usize) {
    while searches.len() > max {
        let oldest = searches
            .iter()
            .filter(|(_, job)| !matches!(job.status, JobStatus::Running))
            .min_by_key(|(_, job)| job.started_at)
            .map(|(id, _)| *id);
        match oldest {
            Some(id) => {
                searches.remove(&id);
            }
            None => break,
        }
    }
}
