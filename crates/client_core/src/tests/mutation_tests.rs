use super::*;
use crate::test_support::ScriptedCollection;

fn mutation(
    api: ScriptedCollection,
) -> (CreateRecordMutation, Arc<ScriptedCollection>, FeedCache) {
    let api = Arc::new(api);
    let cache = FeedCache::new();
    let mutation = CreateRecordMutation::new(
        Arc::clone(&api) as Arc<dyn CollectionApi>,
        cache.clone(),
    );
    (mutation, api, cache)
}

#[tokio::test]
async fn empty_url_is_a_missing_upload() {
    let (mutation, api, cache) = mutation(ScriptedCollection::default());
    let epoch = cache.epoch();

    for url in ["", "  "] {
        let result = mutation.execute(url, "Pier", "Sunrise").await;
        assert!(matches!(result, Err(OperationError::MissingUpload)));
    }
    assert_eq!(api.create_count().await, 0);
    assert_eq!(cache.epoch(), epoch);
}

#[tokio::test]
async fn success_invalidates_the_feed() {
    let (mutation, api, cache) = mutation(ScriptedCollection::default());
    let epoch = cache.epoch();

    let record = mutation
        .execute("https://cdn/pier.png", "Pier", "Sunrise")
        .await
        .expect("created");
    assert_eq!(record.url, "https://cdn/pier.png");
    assert_eq!(api.create_count().await, 1);
    assert!(cache.is_stale(epoch));
}

#[tokio::test]
async fn failure_leaves_the_feed_alone() {
    let (mutation, api, cache) = mutation(ScriptedCollection::failing_create("boom"));
    let epoch = cache.epoch();

    let result = mutation
        .execute("https://cdn/pier.png", "Pier", "Sunrise")
        .await;
    assert!(matches!(result, Err(OperationError::SubmissionFailed(_))));
    assert_eq!(api.create_count().await, 0);
    assert_eq!(cache.epoch(), epoch);
}
