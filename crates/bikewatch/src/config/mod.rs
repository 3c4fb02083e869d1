use std::time::Duration;

use crate::{error::BikewatchError, index::MIN_MEMORY_BUDGET};

/// Runtime knobs of a [`crate::BikeSearcher`].
///
/// Relevance (the edit distance limit, the default radius) is fixed and not
/// configured here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Upper bound on every geocoder call.
    pub geocode_timeout: Duration,
    /// Tantivy writer budget used while building the text index, in bytes.
    pub index_memory_budget: usize,
    /// Candidate count from which edit distances are computed in parallel.
    pub parallel_threshold: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            geocode_timeout: Duration::from_secs(5),
            index_memory_budget: 50_000_000,
            parallel_threshold: 2048,
        }
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Public lookups: give up on a slow geocoder quickly
    pub fn interactive() -> Self {
        let mut builder = Self::new();
        builder.config.geocode_timeout = Duration::from_secs(2);
        builder
    }

    /// Staff bulk search: tolerate slow geocoding, parallelize sooner
    pub fn bulk() -> Self {
        let mut builder = Self::new();
        builder.config.geocode_timeout = Duration::from_secs(10);
        builder.config.parallel_threshold = 512;
        builder
    }

    pub fn geocode_timeout(mut self, timeout: Duration) -> Self {
        self.config.geocode_timeout = timeout;
        self
    }

    /// Set the text index writer budget. Must be at least [`MIN_MEMORY_BUDGET`].
    pub fn index_memory_budget(mut self, bytes: usize) -> Result<Self, BikewatchError> {
        if bytes < MIN_MEMORY_BUDGET {
            return Err(BikewatchError::ConfigError(format!(
                "Index memory budget must be at least {MIN_MEMORY_BUDGET} bytes, got {bytes}"
            )));
        }
        self.config.index_memory_budget = bytes;
        Ok(self)
    }

    pub fn parallel_threshold(mut self, candidates: usize) -> Self {
        self.config.parallel_threshold = candidates;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }
}
