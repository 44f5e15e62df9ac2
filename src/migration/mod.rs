//! # Migration Layer
//!
//! Predicate-filtered mass updates built on the traversal engine.
//!
//! - [`document`]: the `Document` trait, field paths and update data
//! - [`write_batch`]: the atomic write-batch collaborator
//! - [`update`]: the three update shapes and their resolution into one mutation
//! - [`migrator`]: `Migrator::update` and friends

pub mod document;
pub mod migrator;
pub mod update;
pub mod write_batch;

pub use document::{Document, FieldPath, UpdateData};
pub use migrator::{create_migrator, Migrator, UpdateSummary};
pub use update::{
    getter_fn, predicate_fn, resolve_update_args, DocumentMutation, UpdateArg, UpdateDataGetter,
    UpdatePredicate, UpdateRequest,
};
pub use write_batch::{WriteBatch, WriteBatchProvider};
