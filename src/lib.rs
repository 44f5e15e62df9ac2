#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # Traverser Core
//!
//! Bounded, throttled traversal of large document collections, and a migration
//! layer for mass field updates on top of it.
//!
//! ## Overview
//!
//! The traversal engine pages through any [`Traversable`] source in batches of a
//! configured size, hands each batch to an async handler, and bounds how many
//! handlers run at once. It can cap the number of documents visited and sleep
//! between batches to throttle throughput. Every batch is delivered exactly once,
//! dispatched in cursor order.
//!
//! The [`Migrator`] turns an update request (static data, one field/value pair,
//! or a per-document getter, each with an optional predicate) into one write
//! batch per page, committed atomically page by page.
//!
//! ## Module Organization
//!
//! - [`traversal`] - Traversable contract, batch fetcher, concurrency throttle, traverser
//! - [`migration`] - Update requests, write batches and the migrator
//! - [`memory`] - In-process ordered collection implementing both collaborator traits
//! - [`config`] - Validated traversal configuration and its file/environment loader
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use traverser_core::config::TraversalConfigOverrides;
//! use traverser_core::memory::MemoryCollection;
//! use traverser_core::migration::{create_migrator, UpdateRequest};
//!
//! # async fn example() -> traverser_core::TraversalResult<()> {
//! traverser_core::logging::init_structured_logging();
//!
//! let users = Arc::new(MemoryCollection::with_documents(
//!     (0..1000).map(|i| (format!("user-{i:04}"), json!({"active": i % 2 == 0}))),
//! ));
//! let migrator = create_migrator(
//!     users.clone(),
//!     users,
//!     &TraversalConfigOverrides::new().batch_size(100).max_concurrent_batch_count(4),
//! )?;
//!
//! let summary = migrator.update(UpdateRequest::field("plan", "free")).await?;
//! assert_eq!(summary.updated_doc_count, 1000);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod memory;
pub mod migration;
pub mod traversal;

pub use config::{TraversalConfig, TraversalConfigOverrides};
pub use error::{TraversalError, TraversalResult};
pub use memory::{MemoryCollection, MemoryDocument};
pub use migration::{create_migrator, Migrator, UpdateRequest, UpdateSummary};
pub use traversal::{create_traverser, Batch, Page, Traversable, TraversalSummary, Traverser};
