//! # Traversal Constants
//!
//! Named defaults for [`TraversalConfig`](crate::config::TraversalConfig) and the
//! environment variable names understood by the configuration loader.

/// Configuration defaults applied when a field is not overridden
pub mod defaults {
    /// Documents requested per page
    pub const BATCH_SIZE: usize = 250;

    /// Batches allowed in flight at once; 1 means fully sequential
    pub const MAX_CONCURRENT_BATCH_COUNT: usize = 1;

    /// Document ceiling; 0 means unlimited
    pub const MAX_DOC_COUNT: usize = 0;

    pub const SLEEP_BETWEEN_BATCHES: bool = false;

    pub const SLEEP_TIME_BETWEEN_BATCHES_MS: u64 = 0;
}

/// Environment variables read by [`crate::config::loader`]
pub mod env {
    /// Prefix shared by every traversal setting
    pub const CONFIG_PREFIX: &str = "TRAVERSER";

    pub const BATCH_SIZE: &str = "TRAVERSER_BATCH_SIZE";
    pub const MAX_CONCURRENT_BATCH_COUNT: &str = "TRAVERSER_MAX_CONCURRENT_BATCH_COUNT";
    pub const MAX_DOC_COUNT: &str = "TRAVERSER_MAX_DOC_COUNT";
    pub const SLEEP_BETWEEN_BATCHES: &str = "TRAVERSER_SLEEP_BETWEEN_BATCHES";
    pub const SLEEP_TIME_BETWEEN_BATCHES_MS: &str = "TRAVERSER_SLEEP_TIME_BETWEEN_BATCHES_MS";

    /// Deployment environment used to pick a default log level
    pub const ENVIRONMENT: &str = "TRAVERSER_ENV";

    /// `json` switches console logging to JSON lines
    pub const LOG_FORMAT: &str = "TRAVERSER_LOG_FORMAT";
}
