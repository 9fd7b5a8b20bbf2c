use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::error::{SearchError, SourceError, SourceErrorKind};
use crate::models::{Match, ScanOutcome, SourceDescriptor, SourceOutcome};
use crate::search::matcher::Matcher;
use crate::search::progress::ProgressTracker;
use crate::search::result_set::ResultSet;
use crate::sources::{SourceClient, SourceRegistry};

/// Trim the query, rejecting empty and whitespace-only input.
pub fn validate_query(query: &str) -> Result<&str, SearchError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::InvalidQuery);
    }
    Ok(query)
}

/// Drop descriptors whose id was already seen, keeping the first.
fn distinct_sources(descriptors: &[SourceDescriptor]) -> Vec<SourceDescriptor> {
    let mut seen = HashSet::new();
    descriptors
        .iter()
        .filter(|d| {
            let fresh = seen.insert(d.id.as_str());
            if !fresh {
                tracing::warn!("Ignoring duplicate source {}", d.id);
            }
            fresh
        })
        .cloned()
        .collect()
}

/// Fans one query out to every source and merges what comes back.
///
/// Scan tasks do the network and matching work in parallel; this type is the
/// only writer of the result set, draining finished tasks one at a time.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<SourceRegistry>,
}

/// Everything one scan task needs, cloned per task.
struct ScanJob {
    descriptor: SourceDescriptor,
    order: usize,
    client: Option<Arc<dyn SourceClient>>,
    query: Arc<str>,
    matcher: Matcher,
    config: SearchConfig,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
}

impl ScanJob {
    /// Pending until a permit is free, then Scanning until the client
    /// returns. Matches are scored here, off the merge path.
    async fn run(self) -> Result<Vec<Match>, SourceError> {
        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SourceError::Cancelled),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| SourceError::Cancelled)?
            }
        };

        let client = self
            .client
            .ok_or(SourceError::Unsupported(self.descriptor.kind))?;

        self.progress.mark_scanning(&self.descriptor.id);
        tracing::debug!("Scanning {}", self.descriptor.id);

        let candidates = client
            .scan(
                &self.descriptor,
                &self.query,
                self.config.timeout_per_source,
                &self.cancel,
            )
            .await?;

        Ok(candidates
            .into_iter()
            .enumerate()
            .filter_map(|(seq, c)| {
                self.matcher
                    .evaluate(c, &self.query, &self.descriptor.display_name)
                    .map(|m| m.found_at(self.order, seq))
            })
            .collect())
    }
}

impl Aggregator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Search all `descriptors` for `query`.
    pub async fn search(
        &self,
        query: &str,
        descriptors: &[SourceDescriptor],
        config: &SearchConfig,
    ) -> Result<ResultSet, SearchError> {
        let progress = Arc::new(ProgressTracker::new());
        self.search_with_progress(query, descriptors, config, progress)
            .await
    }

    /// Like [`Aggregator::search`], reporting into `progress` so another task
    /// can poll snapshots while the search runs. The tracker is reset first.
    ///
    /// Returns as soon as `config.max_total_matches` is reached; sources that
    /// had not finished by then are recorded as cancelled. Fails only on an
    /// empty query, or when every source failed or timed out.
    pub async fn search_with_progress(
        &self,
        query: &str,
        descriptors: &[SourceDescriptor],
        config: &SearchConfig,
        progress: Arc<ProgressTracker>,
    ) -> Result<ResultSet, SearchError> {
        let query: Arc<str> = Arc::from(validate_query(query)?);
        let distinct = distinct_sources(descriptors);
        let descriptors = distinct.as_slice();
        progress.begin(descriptors);

        tracing::info!(
            "Searching {} sources for {:?} (limit {}, concurrency {})",
            descriptors.len(),
            query,
            config.max_total_matches,
            config.effective_concurrency(descriptors.len())
        );

        let permits = Arc::new(Semaphore::new(
            config.effective_concurrency(descriptors.len()),
        ));
        let cancel = CancellationToken::new();
        let matcher = Matcher::new(config.acceptance_threshold);

        let mut tasks = JoinSet::new();
        let mut task_index = HashMap::new();
        for (index, descriptor) in descriptors.iter().enumerate() {
            let job = ScanJob {
                descriptor: descriptor.clone(),
                order: index,
                client: self.registry.client_for(descriptor.kind),
                query: query.clone(),
                matcher,
                config: config.clone(),
                permits: permits.clone(),
                cancel: cancel.clone(),
                progress: progress.clone(),
            };
            let handle = tasks.spawn(job.run());
            task_index.insert(handle.id(), index);
        }

        let mut results = ResultSet::new();
        let mut finished = vec![false; descriptors.len()];
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next_with_id().await {
            let (index, outcome) = match joined {
                Ok((id, Ok(matches))) => {
                    let mut accepted = 0;
                    for m in matches {
                        if results.insert(m) {
                            progress.record_match();
                            accepted += 1;
                        }
                    }
                    (task_index[&id], ScanOutcome::Completed { matches: accepted })
                }
                Ok((id, Err(err))) => {
                    let descriptor = &descriptors[task_index[&id]];
                    if !matches!(err, SourceError::Cancelled) {
                        tracing::warn!("Source {} failed: {err}", descriptor.id);
                    }
                    (task_index[&id], ScanOutcome::from(err))
                }
                Err(join_err) => {
                    tracing::error!("Scan task ended abnormally: {join_err}");
                    (
                        task_index[&join_err.id()],
                        ScanOutcome::Failed {
                            error: SourceErrorKind::Internal,
                        },
                    )
                }
            };

            let descriptor = &descriptors[index];
            finished[index] = true;
            if outcome.is_failure() {
                failures.push(SourceOutcome {
                    source_id: descriptor.id.clone(),
                    display_name: descriptor.display_name.clone(),
                    outcome,
                });
            }
            progress.mark_completed(&descriptor.id, outcome);

            if config.max_total_matches > 0 && results.len() >= config.max_total_matches {
                tracing::info!(
                    "Early stop for {:?}: {} matches after {} sources",
                    query,
                    results.len(),
                    finished.iter().filter(|f| **f).count()
                );
                cancel.cancel();
                for (descriptor, _) in descriptors
                    .iter()
                    .zip(&finished)
                    .filter(|(_, done)| !**done)
                {
                    progress.mark_completed(&descriptor.id, ScanOutcome::Cancelled);
                }
                // Remaining tasks see the token and wind down on their own.
                tasks.detach_all();
                return Ok(results);
            }
        }

        if !descriptors.is_empty() && failures.len() == descriptors.len() {
            tracing::warn!("All {} sources failed for {:?}", descriptors.len(), query);
            return Err(SearchError::AllSourcesFailed { failures });
        }

        tracing::info!(
            "Search for {:?} finished with {} matches",
            query,
            results.len()
        );
        Ok(results)
    }
}
