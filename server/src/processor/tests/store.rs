//! Queue store ordering and atomicity tests.

use super::*;
use parking_lot::Mutex as PlMutex;

#[tokio::test]
async fn higher_priority_dequeues_first() {
    let store = MemoryStore::new();
    store.enqueue(extraction_payload(), 1, None).await.unwrap();
    store.enqueue(extraction_payload(), 9, None).await.unwrap();
    store.enqueue(extraction_payload(), 5, None).await.unwrap();

    let priorities: Vec<i32> = [
        store.dequeue(JobKind::Extraction).await.unwrap().unwrap(),
        store.dequeue(JobKind::Extraction).await.unwrap().unwrap(),
        store.dequeue(JobKind::Extraction).await.unwrap().unwrap(),
    ]
    .iter()
    .map(|e| e.priority)
    .collect();

    assert_eq!(priorities, vec![9, 5, 1]);
    assert!(store.dequeue(JobKind::Extraction).await.unwrap().is_none());
}

#[tokio::test]
async fn fifo_within_equal_priority() {
    let store = MemoryStore::new();
    let first = store.enqueue(extraction_payload(), 3, None).await.unwrap();
    let second = store.enqueue(extraction_payload(), 3, None).await.unwrap();
    let third = store.enqueue(extraction_payload(), 3, None).await.unwrap();

    let order: Vec<u64> = [
        store.dequeue(JobKind::Extraction).await.unwrap().unwrap(),
        store.dequeue(JobKind::Extraction).await.unwrap().unwrap(),
        store.dequeue(JobKind::Extraction).await.unwrap().unwrap(),
    ]
    .iter()
    .map(|e| e.id)
    .collect();

    assert_eq!(order, vec![first.id, second.id, third.id]);
}

#[tokio::test]
async fn kinds_are_independent_ordering_domains() {
    let store = MemoryStore::new();
    store.enqueue(sync_payload(), 100, None).await.unwrap();
    store.enqueue(extraction_payload(), 1, None).await.unwrap();

    // A giant priority in another kind never shadows this kind's head.
    let job = store
        .dequeue(JobKind::Extraction)
        .await
        .unwrap()
        .expect("extraction job present");
    assert_eq!(job.kind(), JobKind::Extraction);
    assert_eq!(store.queue_len(JobKind::StorageSync).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dequeues_never_return_the_same_job() {
    let store = Arc::new(MemoryStore::new());
    const JOBS: usize = 200;
    for _ in 0..JOBS {
        store.enqueue(extraction_payload(), 0, None).await.unwrap();
    }

    let seen = Arc::new(PlMutex::new(Vec::with_capacity(JOBS)));
    let mut workers = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let seen = Arc::clone(&seen);
        workers.push(tokio::spawn(async move {
            while let Some(job) = store.dequeue(JobKind::Extraction).await.unwrap() {
                seen.lock().push(job.id);
            }
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let mut ids = seen.lock().clone();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(total, JOBS, "every job dispatched exactly once");
    assert_eq!(ids.len(), JOBS, "no job dispatched twice");
}

#[tokio::test]
async fn requeue_lands_behind_newer_peers_in_same_band() {
    let store = MemoryStore::new();
    let retried = store.enqueue(extraction_payload(), 5, None).await.unwrap();
    let _ = store.dequeue(JobKind::Extraction).await.unwrap().unwrap();

    let newer = store.enqueue(extraction_payload(), 5, None).await.unwrap();
    store.requeue(retried.clone()).await.unwrap();

    let first = store.dequeue(JobKind::Extraction).await.unwrap().unwrap();
    let second = store.dequeue(JobKind::Extraction).await.unwrap().unwrap();
    assert_eq!(first.id, newer.id);
    assert_eq!(second.id, retried.id);
}

#[tokio::test]
async fn clear_empties_only_the_given_kind() {
    let store = MemoryStore::new();
    store.enqueue(extraction_payload(), 0, None).await.unwrap();
    store.enqueue(extraction_payload(), 0, None).await.unwrap();
    store.enqueue(sync_payload(), 0, None).await.unwrap();

    let removed = store.clear(JobKind::Extraction).await.unwrap();
    assert_eq!(removed, 2);
    assert_eq!(store.queue_len(JobKind::Extraction).await.unwrap(), 0);
    assert_eq!(store.queue_len(JobKind::StorageSync).await.unwrap(), 1);
}

#[tokio::test]
async fn depths_report_every_kind() {
    let store = MemoryStore::new();
    store.enqueue(extraction_payload(), 0, None).await.unwrap();
    let depths = store.depths().await.unwrap();
    assert_eq!(depths[&JobKind::Extraction], 1);
    assert_eq!(depths[&JobKind::StorageSync], 0);
    assert_eq!(depths[&JobKind::SearchIndexing], 0);
    assert!(store.ping().await.is_ok());
}
