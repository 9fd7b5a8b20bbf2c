pub mod aggregator;
pub mod matcher;
pub mod progress;
pub mod result_set;

pub use aggregator::{validate_query, Aggregator};
pub use matcher::Matcher;
pub use progress::ProgressTracker;
pub use result_set::{DedupKey, ResultSet};
