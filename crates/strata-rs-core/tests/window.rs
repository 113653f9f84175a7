//! Message window integration tests.

use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_rs_core::{
    AgentStorage, MessageWindow, MessageWindowResolver, StorageError, StorageOptions,
};
use strata_rs_protocol::{Anchor, MessageWindowRequest, RecencyLimit};
use strata_rs_store::{InMemoryStore, StoreError};
use strata_rs_test_utils::{FaultyStore, RecordingStore, message_batch};

async fn seeded(count: usize) -> (AgentStorage, Arc<RecordingStore<InMemoryStore>>) {
    let store = Arc::new(RecordingStore::new(InMemoryStore::new()));
    let storage = AgentStorage::new(store.clone());
    let mut batch = message_batch("t1", count);
    batch[0].resource_id = Some("user-1".to_string());
    storage.save_messages(batch).await.expect("seed");
    store.reset();
    (storage, store)
}

fn sequences(window: &MessageWindow) -> Vec<u64> {
    window.messages.iter().map(|message| message.sequence).collect()
}

fn request(recency: RecencyLimit) -> MessageWindowRequest {
    MessageWindowRequest::new("t1").recency(recency)
}

#[tokio::test]
async fn recency_window_returns_latest_messages() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(request(RecencyLimit::Last(3)))
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![8, 9, 10]);
    assert_eq!(store.scan_count(), 1);
    assert_eq!(store.range_scan_count(), 0);
}

#[tokio::test]
async fn anchor_context_uses_one_range_scan() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(0)).anchor(Anchor::with_context("t1-m5", 1, 1)),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![4, 5, 6]);
    assert_eq!(store.range_scans(), vec![(4, 6)]);
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn anchor_inside_recency_window_needs_no_scan() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(3)).anchor(Anchor::with_context("t1-m9", 1, 1)),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![8, 9, 10]);
    assert_eq!(store.range_scan_count(), 0);
}

#[tokio::test]
async fn missing_anchor_is_reported_not_raised() {
    let (storage, store) = seeded(5).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(2)).anchor(Anchor::with_context("does-not-exist", 2, 2)),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![4, 5]);
    assert_eq!(window.missing_anchors, vec!["does-not-exist".to_string()]);
    assert_eq!(store.range_scan_count(), 0);
}

#[tokio::test]
async fn adjacent_anchor_ranges_merge_into_one_scan() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(0))
                .anchor(Anchor::with_context("t1-m1", 0, 1))
                .anchor(Anchor::with_context("t1-m4", 1, 0)),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![1, 2, 3, 4]);
    assert_eq!(store.range_scans(), vec![(1, 4)]);
}

#[tokio::test]
async fn overlapping_anchors_and_recency_never_duplicate() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(4))
                .anchor(Anchor::with_context("t1-m5", 2, 3))
                .anchor(Anchor::with_context("t1-m6", 1, 1))
                .anchor(Anchor::new("t1-m9")),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), (3..=10).collect::<Vec<u64>>());
    assert_eq!(store.range_scans(), vec![(3, 6)]);
    assert_eq!(store.get_by_key_count(), 3);
}

#[tokio::test]
async fn zero_context_anchor_is_taken_from_lookup() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(request(RecencyLimit::Disabled).anchor(Anchor::new("t1-m7")))
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![7]);
    assert_eq!(store.range_scan_count(), 0);
    assert_eq!(store.scan_count(), 0);
}

#[tokio::test]
async fn context_is_clipped_to_existing_messages() {
    let (storage, store) = seeded(3).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(0)).anchor(Anchor::with_context("t1-m2", 5, 5)),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![1, 2, 3]);
    assert_eq!(store.range_scans(), vec![(0, 7)]);
}

#[tokio::test]
async fn anchor_from_another_thread_is_missing() {
    let (storage, _store) = seeded(4).await;
    let mut other = message_batch("t2", 2);
    other[0].resource_id = Some("user-1".to_string());
    storage.save_messages(other).await.expect("other thread");

    let window = storage
        .get_message_window(
            request(RecencyLimit::Last(1)).anchor(Anchor::with_context("t2-m1", 1, 1)),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![4]);
    assert_eq!(window.missing_anchors, vec!["t2-m1".to_string()]);
}

#[tokio::test]
async fn configured_default_recency_applies() {
    let store = Arc::new(InMemoryStore::new());
    let options = StorageOptions {
        default_recency: RecencyLimit::Last(2),
        ..StorageOptions::default()
    };
    let storage = AgentStorage::with_options(store, options);
    let mut batch = message_batch("t1", 6);
    batch[0].resource_id = Some("user-1".to_string());
    storage.save_messages(batch).await.expect("seed");

    let window = storage
        .get_message_window(MessageWindowRequest::new("t1"))
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![5, 6]);
}

#[tokio::test]
async fn ownership_is_checked_when_resource_given() {
    let (storage, _store) = seeded(2).await;
    let err = storage
        .get_message_window(MessageWindowRequest::new("t1").owned_by("user-2"))
        .await
        .expect_err("mismatch");
    assert!(matches!(err, StorageError::ResourceMismatch { ref actual, .. } if actual == "user-1"));

    let err = storage
        .get_message_window(MessageWindowRequest::new("nope").owned_by("user-1"))
        .await
        .expect_err("missing");
    assert!(matches!(err, StorageError::ThreadNotFound(ref id) if id == "nope"));

    let window = storage
        .get_message_window(MessageWindowRequest::new("t1").owned_by("user-1"))
        .await
        .expect("owner");
    assert_eq!(sequences(&window), vec![1, 2]);
}

#[tokio::test]
async fn store_faults_propagate_unchanged() {
    let store = Arc::new(FaultyStore::new(InMemoryStore::new()));
    let storage = AgentStorage::new(store.clone());
    let mut batch = message_batch("t1", 5);
    batch[0].resource_id = Some("user-1".to_string());
    storage.save_messages(batch).await.expect("seed");

    store.fail_on("range_scan");
    let err = storage
        .get_message_window(
            request(RecencyLimit::Last(0)).anchor(Anchor::with_context("t1-m3", 1, 1)),
        )
        .await
        .expect_err("fault");
    assert!(
        matches!(err, StorageError::Store(StoreError::Fault(ref message)) if message.contains("range_scan"))
    );

    // Lookups fail before any scan is planned.
    store.heal();
    store.fail_on("get_by_key");
    let err = storage
        .get_message_window(request(RecencyLimit::Last(2)).anchor(Anchor::new("t1-m1")))
        .await
        .expect_err("fault");
    assert!(matches!(err, StorageError::Store(StoreError::Fault(_))));
}

#[tokio::test]
async fn repeated_anchor_is_read_once() {
    let (storage, store) = seeded(10).await;
    let window = storage
        .get_message_window(
            request(RecencyLimit::Disabled)
                .anchor(Anchor::new("t1-m5"))
                .anchor(Anchor::with_context("t1-m5", 1, 1))
                .anchor(Anchor::with_context("t1-m5", 1, 1))
                .anchor(Anchor::new("t1-m5")),
        )
        .await
        .expect("window");
    assert_eq!(sequences(&window), vec![4, 5, 6]);
    assert_eq!(store.range_scans(), vec![(4, 6)]);
    assert_eq!(store.get_by_key_count(), 4);
}

#[tokio::test]
async fn bare_anchor_listed_before_covering_range_joins_its_scan() {
    for reversed in [false, true] {
        let (storage, store) = seeded(10).await;
        let mut anchors = vec![Anchor::new("t1-m5"), Anchor::with_context("t1-m6", 2, 2)];
        if reversed {
            anchors.reverse();
        }
        let mut window_request = request(RecencyLimit::Disabled);
        window_request.anchors = anchors;
        let window = storage
            .get_message_window(window_request)
            .await
            .expect("window");
        assert_eq!(sequences(&window), vec![4, 5, 6, 7, 8]);
        assert_eq!(store.range_scans(), vec![(4, 8)]);
    }
}

const THREAD_LEN: u64 = 12;

/// Sequences a window must hold, and the range scans it should need.
fn expected_window(
    recency: RecencyLimit,
    anchors: &[(u64, u64, u64)],
) -> (BTreeSet<u64>, Vec<(u64, u64)>) {
    let count = recency.count() as u64;
    let recent: BTreeSet<u64> = (THREAD_LEN.saturating_sub(count) + 1..=THREAD_LEN).collect();

    let mut wanted = recent.clone();
    let mut to_fetch = BTreeSet::new();
    for &(sequence, before, after) in anchors {
        if sequence > THREAD_LEN {
            continue;
        }
        if before == 0 && after == 0 {
            wanted.insert(sequence);
            continue;
        }
        for candidate in sequence.saturating_sub(before)..=sequence + after {
            if (1..=THREAD_LEN).contains(&candidate) {
                wanted.insert(candidate);
            }
            if !recent.contains(&candidate) {
                to_fetch.insert(candidate);
            }
        }
    }

    let mut runs: Vec<(u64, u64)> = Vec::new();
    for sequence in to_fetch {
        match runs.last_mut() {
            Some((_, high)) if *high + 1 == sequence => *high = sequence,
            _ => runs.push((sequence, sequence)),
        }
    }
    (wanted, runs)
}

#[tokio::test]
async fn windows_match_brute_force_over_many_requests() {
    let (_storage, store) = seeded(THREAD_LEN as usize).await;
    let recencies = [
        RecencyLimit::Disabled,
        RecencyLimit::Last(1),
        RecencyLimit::Last(3),
        RecencyLimit::Last(12),
        RecencyLimit::Last(20),
    ];
    // 99 never exists in the thread.
    let positions = [1, 4, 6, 11, 99];
    let contexts = [(0, 0), (1, 0), (0, 2), (2, 2), (5, 5)];
    let mut specs = Vec::new();
    for &position in &positions {
        for &(before, after) in &contexts {
            specs.push((position, before, after));
        }
    }

    for recency in recencies {
        for (i, first) in specs.iter().enumerate() {
            for second in &specs[i..] {
                let picked = [*first, *second];
                let anchors: Vec<Anchor> = picked
                    .iter()
                    .map(|&(position, before, after)| {
                        Anchor::with_context(format!("t1-m{position}"), before, after)
                    })
                    .collect();

                store.reset();
                let resolved = MessageWindowResolver::new(store.as_ref())
                    .resolve("t1", recency, &anchors)
                    .await
                    .expect("resolve");

                let ids: Vec<&str> = resolved.documents.iter().map(|doc| doc.id.as_str()).collect();
                let unique: BTreeSet<&str> = ids.iter().copied().collect();
                assert_eq!(unique.len(), ids.len(), "duplicates for {recency:?} {picked:?}");

                let (wanted, runs) = expected_window(recency, &picked);
                let got: BTreeSet<u64> =
                    resolved.documents.iter().map(|doc| doc.thread_order).collect();
                assert_eq!(got, wanted, "rows for {recency:?} {picked:?}");

                let mut scans = store.range_scans();
                scans.sort_unstable();
                assert_eq!(scans, runs, "scans for {recency:?} {picked:?}");

                let missing = picked.iter().filter(|spec| spec.0 == 99).count();
                assert_eq!(resolved.missing_anchors.len(), missing);
            }
        }
    }
}
