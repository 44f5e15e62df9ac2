use proptest::prelude::*;
use traverser_core::TraversalConfig;

/// Collection sizes, including empty collections
pub fn doc_count_strategy() -> impl Strategy<Value = usize> {
    0usize..120
}

/// Valid traversal configs without sleeping
pub fn traversal_config_strategy() -> impl Strategy<Value = TraversalConfig> {
    (1usize..40, 1usize..5, prop_oneof![Just(0usize), 1usize..150]).prop_map(
        |(batch_size, concurrency, max_doc_count)| {
            TraversalConfig::new()
                .with_batch_size(batch_size)
                .with_max_concurrent_batch_count(concurrency)
                .with_max_doc_count(max_doc_count)
        },
    )
}
