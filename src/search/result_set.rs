use std::collections::HashSet;

use crate::models::{Match, MatchSummary};
use crate::search::matcher::normalize;

/// Normalized `(stem, extension)` of a file name. Two matches with the same
/// key are the same book, whichever source they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    stem: String,
    extension: String,
}

impl DedupKey {
    pub fn for_name(raw_name: &str) -> Self {
        let (stem, extension) = match raw_name.trim().rsplit_once('.') {
            Some((stem, ext)) if !stem.trim().is_empty() => (stem, ext),
            _ => (raw_name, ""),
        };
        // `C++` and `C#` are different books from `C`.
        let stem = stem.replace('+', " plus ").replace('#', " sharp ");
        Self {
            stem: normalize(&stem),
            extension: extension.trim().to_lowercase(),
        }
    }
}

/// Deduplicated matches kept in rank order: score descending, then source
/// order, then position in the source's listing. Of two duplicates the one
/// inserted first is kept.
#[derive(Debug, Default)]
pub struct ResultSet {
    entries: Vec<Match>,
    keys: HashSet<DedupKey>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a match with the same dedup key is already present.
    /// Returns whether the match was kept.
    pub fn insert(&mut self, m: Match) -> bool {
        if !self.keys.insert(DedupKey::for_name(&m.candidate.raw_name)) {
            return false;
        }
        let at = self.entries.partition_point(|e| e.ranks_before(&m));
        self.entries.insert(at, m);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches in rank order.
    pub fn matches(&self) -> &[Match] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.entries.iter()
    }

    pub fn summaries(&self) -> Vec<MatchSummary> {
        self.entries.iter().map(MatchSummary::from).collect()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
