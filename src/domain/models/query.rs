use std::time::Duration;

use super::HardFilters;

pub const DEFAULT_LIMIT: usize = 10;
pub const DEFAULT_PER_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Knobs for a single federated query.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    hard_filters: HardFilters,
    limit: usize,
    per_source_timeout: Duration,
    overall_timeout: Option<Duration>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            hard_filters: HardFilters::default(),
            limit: DEFAULT_LIMIT,
            per_source_timeout: DEFAULT_PER_SOURCE_TIMEOUT,
            overall_timeout: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hard_filters(mut self, filters: HardFilters) -> Self {
        self.hard_filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        // Ensure at least 1 source is requested
        self.limit = limit.max(1);
        self
    }

    pub fn with_per_source_timeout(mut self, timeout: Duration) -> Self {
        self.per_source_timeout = timeout;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    pub fn hard_filters(&self) -> &HardFilters {
        &self.hard_filters
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn per_source_timeout(&self) -> Duration {
        self.per_source_timeout
    }

    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout
    }
}
