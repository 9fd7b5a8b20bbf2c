use parking_lot::Mutex;

use crate::models::{ProgressSnapshot, ScanOutcome, SourceDescriptor, SourceOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceState {
    Pending,
    Scanning,
    Done,
}

#[derive(Debug)]
struct TrackedSource {
    id: String,
    display_name: String,
    state: SourceState,
}

#[derive(Debug, Default)]
struct Inner {
    sources: Vec<TrackedSource>,
    /// Terminal outcomes in the order they were recorded.
    outcomes: Vec<SourceOutcome>,
    matches_found: usize,
}

impl Inner {
    fn find(&mut self, source_id: &str) -> Option<&mut TrackedSource> {
        self.sources.iter_mut().find(|s| s.id == source_id)
    }
}

/// Progress counters for one search operation.
///
/// Every mutation takes the same lock, so a snapshot never shows a source as
/// both scanning and completed, and never more completed sources than
/// registered ones.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    inner: Mutex<Inner>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset and register the sources of a new search, all pending.
    pub fn begin(&self, descriptors: &[SourceDescriptor]) {
        let mut inner = self.inner.lock();
        *inner = Inner {
            sources: descriptors
                .iter()
                .map(|d| TrackedSource {
                    id: d.id.clone(),
                    display_name: d.display_name.clone(),
                    state: SourceState::Pending,
                })
                .collect(),
            outcomes: Vec::new(),
            matches_found: 0,
        };
    }

    /// Pending -> Scanning. Ignored for unknown or finished sources.
    pub fn mark_scanning(&self, source_id: &str) {
        let mut inner = self.inner.lock();
        match inner.find(source_id) {
            Some(source) if source.state == SourceState::Pending => {
                source.state = SourceState::Scanning;
            }
            Some(_) => {}
            None => tracing::debug!("mark_scanning for unknown source {source_id}"),
        }
    }

    /// Record the terminal outcome of a source. Returns false if the source
    /// is unknown or already finished; the first outcome wins.
    pub fn mark_completed(&self, source_id: &str, outcome: ScanOutcome) -> bool {
        let mut inner = self.inner.lock();
        let Some(source) = inner.find(source_id) else {
            tracing::debug!("mark_completed for unknown source {source_id}");
            return false;
        };
        if source.state == SourceState::Done {
            return false;
        }
        source.state = SourceState::Done;
        let record = SourceOutcome {
            source_id: source.id.clone(),
            display_name: source.display_name.clone(),
            outcome,
        };
        inner.outcomes.push(record);
        true
    }

    /// Count one match accepted into the result set.
    pub fn record_match(&self) {
        self.inner.lock().matches_found += 1;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock();
        ProgressSnapshot {
            sources_total: inner.sources.len(),
            sources_completed: inner.outcomes.len(),
            matches_found: inner.matches_found,
            currently_scanning: inner
                .sources
                .iter()
                .filter(|s| s.state == SourceState::Scanning)
                .map(|s| s.display_name.clone())
                .collect(),
            outcomes: inner.outcomes.clone(),
        }
    }

    /// True once every registered source has a terminal outcome.
    pub fn is_finished(&self) -> bool {
        let inner = self.inner.lock();
        inner.outcomes.len() == inner.sources.len()
    }
}
