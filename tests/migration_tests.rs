//! Migration Tests
//!
//! `Migrator::update` in its three shapes, predicate filtering, per-page commits
//! and failure behavior.

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use traverser_core::config::TraversalConfigOverrides;
use traverser_core::migration::{
    create_migrator, predicate_fn, FieldPath, Migrator, UpdateArg, UpdateRequest,
};
use traverser_core::{MemoryCollection, MemoryDocument, TraversalError, UpdateSummary};

fn migrator_over(
    collection: &MemoryCollection,
    overrides: TraversalConfigOverrides,
) -> Migrator<MemoryCollection, MemoryCollection> {
    create_migrator(
        Arc::new(collection.clone()),
        Arc::new(collection.clone()),
        &overrides,
    )
    .expect("valid config")
}

fn is_even(doc: &MemoryDocument) -> bool {
    doc.get("n").and_then(|n| n.as_u64()).is_some_and(|n| n % 2 == 0)
}

#[tokio::test]
async fn field_update_skips_documents_failing_predicate() {
    let collection = numbered_collection(3);
    let writer = Arc::new(CountingWriter::new(collection.clone()));
    let migrator = create_migrator(
        Arc::new(collection.clone()),
        writer.clone(),
        &TraversalConfigOverrides::new(),
    )
    .unwrap();

    let summary = migrator
        .update(
            UpdateRequest::field("status", "archived")
                .when(|doc: &MemoryDocument| doc.id != "doc-0001"),
        )
        .await
        .unwrap();

    assert_eq!(summary, UpdateSummary { batch_count: 1, updated_doc_count: 2 });
    assert_eq!(writer.commit_attempts(), 1);
    assert_eq!(collection.get("doc-0000").unwrap().get("status"), Some(&json!("archived")));
    assert_eq!(collection.get("doc-0001").unwrap().get("status"), Some(&json!("active")));
    assert_eq!(collection.get("doc-0002").unwrap().get("status"), Some(&json!("archived")));
}

#[tokio::test]
async fn data_update_counts_only_matching_documents() {
    let collection = numbered_collection(25);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new().batch_size(10));

    let summary = migrator
        .update(UpdateRequest::data(object(json!({"parity": "even"}))).when(is_even))
        .await
        .unwrap();

    assert_eq!(summary, UpdateSummary { batch_count: 3, updated_doc_count: 13 });
    let tagged = collection
        .documents()
        .into_iter()
        .filter(|doc| doc.get("parity").is_some())
        .count();
    assert_eq!(tagged, 13);
    assert_eq!(collection.commit_count(), 3);
}

#[tokio::test]
async fn computed_update_uses_each_document() {
    let collection = numbered_collection(6);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new().batch_size(4));

    let summary = migrator
        .update_computed(
            |doc: &MemoryDocument| {
                let n = doc.get("n").and_then(|n| n.as_u64()).unwrap_or_default();
                object(json!({"square": n * n, "meta.source": doc.id}))
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(summary, UpdateSummary { batch_count: 2, updated_doc_count: 6 });
    let doc = collection.get("doc-0005").unwrap();
    assert_eq!(doc.get("square"), Some(&json!(25)));
    assert_eq!(doc.get("meta.source"), Some(&json!("doc-0005")));
}

#[tokio::test]
async fn all_update_shapes_are_equivalent() {
    let predicate = predicate_fn(is_even);
    let overrides = || TraversalConfigOverrides::new().batch_size(4).max_concurrent_batch_count(2);

    let by_field = numbered_collection(17);
    let field_summary = migrator_over(&by_field, overrides())
        .update_field("status", "archived", Some(predicate.clone()))
        .await
        .unwrap();

    let by_data = numbered_collection(17);
    let data_summary = migrator_over(&by_data, overrides())
        .update_data(object(json!({"status": "archived"})), Some(predicate.clone()))
        .await
        .unwrap();

    let by_getter = numbered_collection(17);
    let getter_summary = migrator_over(&by_getter, overrides())
        .update_computed(|_| object(json!({"status": "archived"})), Some(predicate))
        .await
        .unwrap();

    assert_eq!(field_summary, UpdateSummary { batch_count: 5, updated_doc_count: 9 });
    assert_eq!(field_summary, data_summary);
    assert_eq!(field_summary, getter_summary);
    assert_eq!(by_field.documents(), by_data.documents());
    assert_eq!(by_field.documents(), by_getter.documents());
}

#[tokio::test]
async fn positional_arguments_resolve_to_each_shape() {
    let collection = numbered_collection(5);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new());

    let summary = migrator
        .update_args(vec![UpdateArg::value("status"), UpdateArg::value("archived")])
        .await
        .unwrap();
    assert_eq!(summary.updated_doc_count, 5);

    let summary = migrator
        .update_args(vec![
            UpdateArg::value(json!({"flag": true})),
            UpdateArg::predicate(is_even),
        ])
        .await
        .unwrap();
    assert_eq!(summary.updated_doc_count, 3);

    let summary = migrator
        .update_args(vec![
            UpdateArg::getter(|doc: &MemoryDocument| object(json!({"copy": doc.id}))),
            UpdateArg::predicate(|doc: &MemoryDocument| doc.id == "doc-0004"),
        ])
        .await
        .unwrap();
    assert_eq!(summary.updated_doc_count, 1);

    let summary = migrator
        .update_args(vec![
            UpdateArg::Path(FieldPath::from("meta.version")),
            UpdateArg::value(2),
            UpdateArg::predicate(is_even),
        ])
        .await
        .unwrap();
    assert_eq!(summary.updated_doc_count, 3);

    let doc = collection.get("doc-0004").unwrap();
    assert_eq!(doc.get("status"), Some(&json!("archived")));
    assert_eq!(doc.get("flag"), Some(&json!(true)));
    assert_eq!(doc.get("copy"), Some(&json!("doc-0004")));
    assert_eq!(doc.get("meta.version"), Some(&json!(2)));
}

#[tokio::test]
async fn invalid_requests_fail_before_traversal() {
    let collection = numbered_collection(3);
    let writer = Arc::new(CountingWriter::new(collection.clone()));
    let migrator = create_migrator(
        Arc::new(collection.clone()),
        writer.clone(),
        &TraversalConfigOverrides::new(),
    )
    .unwrap();

    let empty = migrator.update(UpdateRequest::data(Default::default())).await;
    assert!(matches!(empty, Err(TraversalError::Validation(_))));

    let malformed = migrator.update_args(vec![UpdateArg::value(42)]).await;
    assert!(matches!(malformed, Err(TraversalError::Validation(_))));

    assert_eq!(writer.commit_attempts(), 0);
}

#[tokio::test]
async fn batches_with_no_matches_do_not_commit() {
    let collection = numbered_collection(20);
    let writer = Arc::new(CountingWriter::new(collection.clone()));
    let migrator = create_migrator(
        Arc::new(collection.clone()),
        writer.clone(),
        &TraversalConfigOverrides::new().batch_size(5),
    )
    .unwrap();

    let summary = migrator
        .update(
            UpdateRequest::field("status", "archived")
                .when(|doc: &MemoryDocument| doc.id.as_str() < "doc-0007"),
        )
        .await
        .unwrap();

    assert_eq!(summary, UpdateSummary { batch_count: 4, updated_doc_count: 7 });
    assert_eq!(writer.commit_attempts(), 2);
}

#[tokio::test]
async fn fetch_failure_keeps_earlier_commits() {
    let collection = numbered_collection(30);
    let source = Arc::new(FlakyTraversable::new(collection.clone(), 1));
    let migrator = create_migrator(
        source,
        Arc::new(collection.clone()),
        &TraversalConfigOverrides::new().batch_size(10),
    )
    .unwrap();

    let result = migrator.update(UpdateRequest::field("status", "archived")).await;
    assert!(matches!(result, Err(TraversalError::Fetch { batch_index: 1, .. })));

    // The first page committed before the second fetch failed, and stays committed
    assert_eq!(collection.commit_count(), 1);
    let archived: Vec<String> = collection
        .documents()
        .into_iter()
        .filter(|doc| doc.get("status") == Some(&json!("archived")))
        .map(|doc| doc.id)
        .collect();
    assert_eq!(archived, (0..10).map(|i| format!("doc-{i:04}")).collect::<Vec<_>>());
}

#[tokio::test]
async fn commit_failure_surfaces_as_commit_error() {
    let collection = numbered_collection(30);
    let writer = Arc::new(CountingWriter::new(collection.clone()).failing_on_commit(1));
    let migrator = create_migrator(
        Arc::new(collection.clone()),
        writer.clone(),
        &TraversalConfigOverrides::new().batch_size(10),
    )
    .unwrap();

    let result = migrator.update(UpdateRequest::field("status", "archived")).await;
    assert!(matches!(result, Err(TraversalError::Commit { batch_index: 1, .. })));
    assert_eq!(writer.commit_attempts(), 2);
    assert_eq!(collection.commit_count(), 1);
    assert_eq!(collection.get("doc-0015").unwrap().get("status"), Some(&json!("active")));
}

#[tokio::test]
async fn missing_document_fails_the_whole_page() {
    let collection = numbered_collection(4);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new());

    // Deleted between the read and the commit
    let doomed = collection.clone();
    let result = migrator
        .update(UpdateRequest::field("status", "archived").when(move |doc: &MemoryDocument| {
            if doc.id == "doc-0003" {
                doomed.remove("doc-0003");
            }
            true
        }))
        .await;

    assert!(matches!(result, Err(TraversalError::Commit { batch_index: 0, .. })));
    assert_eq!(collection.get("doc-0000").unwrap().get("status"), Some(&json!("active")));
    assert_eq!(collection.commit_count(), 0);
}

#[tokio::test]
async fn empty_computed_update_is_a_stage_error() {
    let collection = numbered_collection(2);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new());

    let result = migrator
        .update(UpdateRequest::computed(|_: &MemoryDocument| Default::default()))
        .await;
    assert!(matches!(result, Err(TraversalError::Stage { batch_index: 0, .. })));
}

#[tokio::test]
async fn migrator_respects_document_ceiling() {
    let collection = numbered_collection(25);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new().batch_size(10))
        .with_config(&TraversalConfigOverrides::new().max_doc_count(12))
        .unwrap();
    assert_eq!(migrator.traverser().config().max_doc_count, 12);
    assert_eq!(migrator.traverser().config().batch_size, 10);

    let summary = migrator.update(UpdateRequest::field("status", "archived")).await.unwrap();
    assert_eq!(summary, UpdateSummary { batch_count: 2, updated_doc_count: 12 });
    assert_eq!(collection.get("doc-0012").unwrap().get("status"), Some(&json!("active")));
}

#[tokio::test]
async fn predicate_error_fails_update_with_its_batch() {
    let collection = numbered_collection(25);
    let migrator = migrator_over(&collection, TraversalConfigOverrides::new().batch_size(10));

    let result = migrator
        .update(
            UpdateRequest::field("status", "archived").try_when(|doc: &MemoryDocument| {
                if doc.id == "doc-0013" {
                    anyhow::bail!("owner lookup failed");
                }
                Ok(true)
            }),
        )
        .await;

    match result {
        Err(TraversalError::Handler { batch_index, reason }) => {
            assert_eq!(batch_index, 1);
            assert!(reason.contains("owner lookup failed"), "reason: {reason}");
        }
        other => panic!("expected handler error, got {other:?}"),
    }
    // Page 0 committed before page 1 failed; nothing of page 1 was written
    assert_eq!(collection.commit_count(), 1);
    assert_eq!(collection.get("doc-0009").unwrap().get("status"), Some(&json!("archived")));
    assert_eq!(collection.get("doc-0010").unwrap().get("status"), Some(&json!("active")));
}

#[tokio::test]
async fn getter_error_fails_update_with_its_batch() {
    let collection = numbered_collection(12);
    let writer = Arc::new(CountingWriter::new(collection.clone()));
    let migrator = create_migrator(
        Arc::new(collection.clone()),
        writer.clone(),
        &TraversalConfigOverrides::new().batch_size(5),
    )
    .unwrap();
    assert!(Arc::ptr_eq(migrator.writer(), &writer));

    let result = migrator
        .update(UpdateRequest::try_computed(|doc: &MemoryDocument| {
            match doc.get("n").and_then(|n| n.as_u64()) {
                Some(n) if n < 10 => Ok(object(json!({"rank": n}))),
                _ => Err(anyhow::anyhow!("no rank for {}", doc.id)),
            }
        }))
        .await;

    assert!(matches!(result, Err(TraversalError::Handler { batch_index: 2, .. })));
    assert_eq!(writer.commit_attempts(), 2);
    assert_eq!(collection.get("doc-0009").unwrap().get("rank"), Some(&json!(9)));
}
