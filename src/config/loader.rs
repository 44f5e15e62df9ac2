//! Configuration Loader
//!
//! Layers traversal settings the way deployments supply them: built-in defaults,
//! then an optional config file (format picked from its extension), then
//! `TRAVERSER_*` environment variables. The merged result is validated before it
//! is returned.

use super::{TraversalConfig, TraversalConfigOverrides};
use crate::constants::env;
use crate::error::TraversalResult;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Load configuration from an optional file plus the process environment
pub fn load_traversal_config(path: Option<&Path>) -> TraversalResult<TraversalConfig> {
    load_traversal_config_with_env(path, None)
}

/// Load configuration with an explicit environment map
///
/// Passing `Some(vars)` reads variables from the map instead of the process
/// environment, which keeps tests independent of global state.
pub fn load_traversal_config_with_env(
    path: Option<&Path>,
    vars: Option<HashMap<String, String>>,
) -> TraversalResult<TraversalConfig> {
    let overrides = load_overrides(path, vars)?;
    let config = TraversalConfig::from_overrides(&overrides)?;

    debug!(
        batch_size = config.batch_size,
        max_concurrent_batch_count = config.max_concurrent_batch_count,
        max_doc_count = config.max_doc_count,
        sleep_between_batches = config.sleep_between_batches,
        sleep_time_ms = config.sleep_time_between_batches.as_millis() as u64,
        source_file = path.map(|p| p.display().to_string()),
        "Traversal configuration loaded"
    );

    Ok(config)
}

/// Read the layered overrides without applying or validating them
pub fn load_overrides(
    path: Option<&Path>,
    vars: Option<HashMap<String, String>>,
) -> TraversalResult<TraversalConfigOverrides> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(env::CONFIG_PREFIX)
            .try_parsing(true)
            .source(vars),
    );

    let overrides = builder
        .build()?
        .try_deserialize::<TraversalConfigOverrides>()?;
    Ok(overrides)
}
