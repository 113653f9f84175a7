//! Message window resolution.
//!
//! A window is the union of the thread's most recent messages and a context
//! range around each anchor message. The resolver reads every needed row at
//! most once and issues one range scan per maximal contiguous run of
//! sequences that the recency read did not already cover.

use futures_util::future::try_join_all;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use strata_rs_protocol::{Anchor, RecencyLimit};
use strata_rs_store::{IndexQuery, MessageDocument, Order, RowStore, StoreError, UniqueKey};

/// Rows gathered for one window request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWindow {
    /// Recency rows, then zero-context anchors, then range-scan rows.
    pub documents: Vec<MessageDocument>,
    /// Anchor ids that did not resolve to a message of the thread.
    pub missing_anchors: Vec<String>,
}

/// Resolves message windows against a row store.
///
/// Holds no state between calls; each `resolve` keeps its own bookkeeping.
pub struct MessageWindowResolver<'a> {
    store: &'a dyn RowStore,
}

impl<'a> MessageWindowResolver<'a> {
    pub fn new(store: &'a dyn RowStore) -> Self {
        Self { store }
    }

    /// Gather the recency window plus every anchor's context range.
    ///
    /// An anchor covers `[sequence - before, sequence + after]`, clipped to
    /// the messages that exist. Unknown anchors are logged and skipped. Only
    /// row store faults are returned as errors.
    pub async fn resolve(
        &self,
        thread_id: &str,
        recency: RecencyLimit,
        anchors: &[Anchor],
    ) -> Result<ResolvedWindow, StoreError> {
        let mut documents = self.recent(thread_id, recency.count()).await?;
        let mut handled: BTreeSet<u64> = documents.iter().map(|doc| doc.thread_order).collect();

        let keys: Vec<UniqueKey> = anchors
            .iter()
            .map(|anchor| UniqueKey::Message(anchor.id.clone()))
            .collect();
        let lookups = try_join_all(keys.iter().map(|key| self.store.get_by_key(key))).await?;

        let mut missing_anchors = Vec::new();
        let mut ranges: Vec<RangeInclusive<u64>> = Vec::new();
        let mut bare = Vec::new();
        for (anchor, found) in anchors.iter().zip(lookups) {
            let message = found
                .and_then(|stored| stored.into_message())
                .filter(|message| message.thread_id == thread_id);
            let Some(message) = message else {
                warn!(
                    "anchor message not found (thread_id={}, message_id={})",
                    thread_id, anchor.id
                );
                missing_anchors.push(anchor.id.clone());
                continue;
            };

            let sequence = message.thread_order;
            if anchor.before == 0 && anchor.after == 0 {
                bare.push(message);
                continue;
            }
            ranges.push(sequence.saturating_sub(anchor.before)..=sequence.saturating_add(anchor.after));
        }

        // Bare anchors inside any context range are read by that range's scan.
        for message in bare {
            let sequence = message.thread_order;
            let covered = ranges.iter().any(|range| range.contains(&sequence));
            if !covered && handled.insert(sequence) {
                documents.push(message);
            }
        }

        let runs = contiguous_runs(&ranges, &handled);
        debug!(
            "resolved message window plan (thread_id={}, handled={}, anchors={}, runs={})",
            thread_id,
            handled.len(),
            anchors.len(),
            runs.len()
        );
        let scanned = try_join_all(
            runs.iter()
                .map(|run| self.store.range_scan(thread_id, *run.start(), *run.end())),
        )
        .await?;
        documents.extend(scanned.into_iter().flatten());

        Ok(ResolvedWindow {
            documents,
            missing_anchors,
        })
    }

    async fn recent(&self, thread_id: &str, limit: usize) -> Result<Vec<MessageDocument>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .scan(
                IndexQuery::MessagesByThread {
                    thread_id: thread_id.to_string(),
                },
                Order::Desc,
                Some(limit),
            )
            .await?;
        Ok(rows.into_iter().filter_map(|row| row.into_message()).collect())
    }
}

/// Merge `ranges` and remove `handled` sequences, yielding the maximal
/// contiguous runs left to fetch, in ascending order.
pub fn contiguous_runs(
    ranges: &[RangeInclusive<u64>],
    handled: &BTreeSet<u64>,
) -> Vec<RangeInclusive<u64>> {
    let mut sorted: Vec<(u64, u64)> = ranges
        .iter()
        .filter(|range| !range.is_empty())
        .map(|range| (*range.start(), *range.end()))
        .collect();
    sorted.sort_unstable();

    let mut merged: Vec<(u64, u64)> = Vec::new();
    for (start, end) in sorted {
        match merged.last_mut() {
            Some((_, last_end)) if start <= last_end.saturating_add(1) => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    let mut runs = Vec::new();
    for (start, end) in merged {
        let mut next = Some(start);
        for &done in handled.range(start..=end) {
            if let Some(from) = next {
                if done > from {
                    runs.push(from..=done - 1);
                }
            }
            next = done.checked_add(1);
        }
        if let Some(from) = next {
            if from <= end {
                runs.push(from..=end);
            }
        }
    }
    runs
}
