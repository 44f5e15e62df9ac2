//! # Traversal Configuration
//!
//! [`TraversalConfig`] is the immutable configuration a [`Traverser`](crate::Traverser)
//! is built with. Defaults come from [`crate::constants::defaults`]; every
//! constructor path ends in [`TraversalConfig::validate`], so an invalid combination
//! fails before the first page is fetched.
//!
//! [`TraversalConfigOverrides`] is the partial form: each field is optional and is
//! applied over a base config. It is what the file/environment [`loader`] produces.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use traverser_core::config::TraversalConfig;
//!
//! let config = TraversalConfig::new()
//!     .with_batch_size(100)
//!     .with_max_concurrent_batch_count(4)
//!     .with_sleep_between_batches(Duration::from_millis(500));
//! assert!(config.validate().is_ok());
//! ```

pub mod loader;

use crate::constants::defaults;
use crate::error::{TraversalError, TraversalResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use loader::load_traversal_config;

/// Batch traversal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Documents requested per page; must be greater than 0
    pub batch_size: usize,
    /// Batches dispatched but not yet settled at any one time; must be at least 1
    pub max_concurrent_batch_count: usize,
    /// Stop after this many documents; 0 means unlimited
    pub max_doc_count: usize,
    /// Pause the fetch loop after each dispatched batch
    pub sleep_between_batches: bool,
    /// Length of the pause; must be non-zero when sleeping is enabled
    #[serde(with = "duration_millis")]
    pub sleep_time_between_batches: Duration,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::BATCH_SIZE,
            max_concurrent_batch_count: defaults::MAX_CONCURRENT_BATCH_COUNT,
            max_doc_count: defaults::MAX_DOC_COUNT,
            sleep_between_batches: defaults::SLEEP_BETWEEN_BATCHES,
            sleep_time_between_batches: Duration::from_millis(
                defaults::SLEEP_TIME_BETWEEN_BATCHES_MS,
            ),
        }
    }
}

impl TraversalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a validated config from overrides applied over the defaults
    pub fn from_overrides(overrides: &TraversalConfigOverrides) -> TraversalResult<Self> {
        let config = overrides.apply_to(&Self::default());
        config.validate()?;
        Ok(config)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_concurrent_batch_count(mut self, count: usize) -> Self {
        self.max_concurrent_batch_count = count;
        self
    }

    pub fn with_max_doc_count(mut self, max_doc_count: usize) -> Self {
        self.max_doc_count = max_doc_count;
        self
    }

    /// Enable the inter-batch pause with the given duration
    pub fn with_sleep_between_batches(mut self, sleep_time: Duration) -> Self {
        self.sleep_between_batches = true;
        self.sleep_time_between_batches = sleep_time;
        self
    }

    pub fn without_sleep(mut self) -> Self {
        self.sleep_between_batches = false;
        self
    }

    /// The document ceiling, or `None` when unlimited
    pub fn doc_limit(&self) -> Option<usize> {
        (self.max_doc_count > 0).then_some(self.max_doc_count)
    }

    /// The pause to insert after each dispatch, if any
    pub fn inter_batch_sleep(&self) -> Option<Duration> {
        self.sleep_between_batches
            .then_some(self.sleep_time_between_batches)
    }

    pub fn validate(&self) -> TraversalResult<()> {
        if self.batch_size == 0 {
            return Err(TraversalError::configuration(
                "batch_size must be greater than 0",
            ));
        }

        if self.max_concurrent_batch_count == 0 {
            return Err(TraversalError::configuration(
                "max_concurrent_batch_count must be at least 1",
            ));
        }

        if self.sleep_between_batches && self.sleep_time_between_batches.is_zero() {
            return Err(TraversalError::configuration(
                "sleep_time_between_batches must be greater than 0 when sleep_between_batches is enabled",
            ));
        }

        Ok(())
    }
}

/// Partial configuration; unset fields keep the base config's value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfigOverrides {
    pub batch_size: Option<usize>,
    pub max_concurrent_batch_count: Option<usize>,
    pub max_doc_count: Option<usize>,
    pub sleep_between_batches: Option<bool>,
    pub sleep_time_between_batches_ms: Option<u64>,
}

impl TraversalConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn max_concurrent_batch_count(mut self, count: usize) -> Self {
        self.max_concurrent_batch_count = Some(count);
        self
    }

    pub fn max_doc_count(mut self, max_doc_count: usize) -> Self {
        self.max_doc_count = Some(max_doc_count);
        self
    }

    pub fn sleep_between_batches(mut self, enabled: bool) -> Self {
        self.sleep_between_batches = Some(enabled);
        self
    }

    pub fn sleep_time_between_batches(mut self, sleep_time: Duration) -> Self {
        self.sleep_time_between_batches_ms =
            Some(u64::try_from(sleep_time.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `base` without validating the result
    pub fn apply_to(&self, base: &TraversalConfig) -> TraversalConfig {
        TraversalConfig {
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            max_concurrent_batch_count: self
                .max_concurrent_batch_count
                .unwrap_or(base.max_concurrent_batch_count),
            max_doc_count: self.max_doc_count.unwrap_or(base.max_doc_count),
            sleep_between_batches: self
                .sleep_between_batches
                .unwrap_or(base.sleep_between_batches),
            sleep_time_between_batches: self
                .sleep_time_between_batches_ms
                .map(Duration::from_millis)
                .unwrap_or(base.sleep_time_between_batches),
        }
    }
}

impl From<TraversalConfig> for TraversalConfigOverrides {
    fn from(config: TraversalConfig) -> Self {
        Self {
            batch_size: Some(config.batch_size),
            max_concurrent_batch_count: Some(config.max_concurrent_batch_count),
            max_doc_count: Some(config.max_doc_count),
            sleep_between_batches: Some(config.sleep_between_batches),
            sleep_time_between_batches_ms: Some(
                u64::try_from(config.sleep_time_between_batches.as_millis()).unwrap_or(u64::MAX),
            ),
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
