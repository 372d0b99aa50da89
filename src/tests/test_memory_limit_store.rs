use std::sync::Arc;

use crate::{ConditionalIncrement, LimitStore, MemoryLimitStore};

#[tokio::test]
async fn absent_records_read_as_none() {
    let store = MemoryLimitStore::new();

    assert_eq!(store.get_counter("missing").await.unwrap(), None);
    assert_eq!(store.get_timestamp("missing").await.unwrap(), None);
}

#[tokio::test]
async fn set_timestamp_overwrites() {
    let store = MemoryLimitStore::new();

    store.set_timestamp("k", 100).await.unwrap();
    assert_eq!(store.get_timestamp("k").await.unwrap(), Some(100));

    store.set_timestamp("k", 50).await.unwrap();
    assert_eq!(store.get_timestamp("k").await.unwrap(), Some(50));
}

#[tokio::test]
async fn increment_creates_at_one_and_refreshes_expiry() {
    let store = MemoryLimitStore::new();

    assert_eq!(store.increment("k", 1_000).await.unwrap(), 1);
    assert_eq!(store.increment("k", 2_000).await.unwrap(), 2);

    let record = *store.counters().get("k").unwrap();
    assert_eq!(record.count, 2);
    assert_eq!(record.expires_at, 2_000);
    assert_eq!(store.get_counter("k").await.unwrap(), Some(2));
}

#[tokio::test]
async fn counters_and_timestamps_are_separate_namespaces() {
    let store = MemoryLimitStore::new();

    store.set_timestamp("k", 42).await.unwrap();
    assert_eq!(store.get_counter("k").await.unwrap(), None);

    store.increment("k", 1_000).await.unwrap();
    assert_eq!(store.get_timestamp("k").await.unwrap(), Some(42));
    assert_eq!(store.timestamps().len(), 1);
    assert_eq!(store.counter_count(), 1);
}

#[tokio::test]
async fn increment_if_below_on_absent_record_succeeds() {
    let store = MemoryLimitStore::new();

    assert_eq!(
        store.increment_if_below("k", 1_000, 1).await.unwrap(),
        ConditionalIncrement::Incremented(1)
    );
    assert_eq!(store.get_counter("k").await.unwrap(), Some(1));
}

#[tokio::test]
async fn increment_if_below_rejects_at_limit_without_touching_the_record() {
    let store = MemoryLimitStore::new();

    for expected in 1..=3 {
        assert_eq!(
            store.increment_if_below("k", 1_000, 3).await.unwrap(),
            ConditionalIncrement::Incremented(expected)
        );
    }

    assert_eq!(
        store.increment_if_below("k", 5_000, 3).await.unwrap(),
        ConditionalIncrement::Rejected
    );

    let record = *store.counters().get("k").unwrap();
    assert_eq!(record.count, 3);
    assert_eq!(record.expires_at, 1_000);
}

#[tokio::test]
async fn increment_if_below_rejects_records_already_past_limit() {
    let store = MemoryLimitStore::new();

    for _ in 0..5 {
        store.increment("k", 1_000).await.unwrap();
    }

    assert_eq!(
        store.increment_if_below("k", 1_000, 3).await.unwrap(),
        ConditionalIncrement::Rejected
    );
    assert_eq!(store.get_counter("k").await.unwrap(), Some(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_conditional_increments_never_exceed_limit() {
    let store = Arc::new(MemoryLimitStore::new());
    let limit = 25u64;

    let handles: Vec<_> = (0..200)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment_if_below("k", i64::MAX, limit).await })
        })
        .collect();

    let mut incremented = 0u64;
    for handle in handles {
        if let ConditionalIncrement::Incremented(_) = handle.await.unwrap().unwrap() {
            incremented += 1;
        }
    }

    assert_eq!(incremented, limit);
    assert_eq!(store.get_counter("k").await.unwrap(), Some(limit));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_increments_are_not_lost() {
    let store = Arc::new(MemoryLimitStore::new());

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.increment("k", i64::MAX).await })
        })
        .collect();

    let mut seen = Vec::with_capacity(100);
    for handle in handles {
        seen.push(handle.await.unwrap().unwrap());
    }
    seen.sort_unstable();

    assert_eq!(seen, (1..=100).collect::<Vec<u64>>());
    assert_eq!(store.get_counter("k").await.unwrap(), Some(100));
}
