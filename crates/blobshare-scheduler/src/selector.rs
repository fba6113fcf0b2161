//! Greedy, size-bounded batch selection.
//!
//! Pending items are ranked by priority (ties broken by creation time,
//! then id) and walked once; each item is admitted if it still fits in
//! the remaining capacity, otherwise deferred. Lower-priority items may
//! fill gaps a larger, higher-priority item could not.
//!
//! Admitted items are marked processed. Deferred items age by one round.
//! An item larger than the whole capacity can never be admitted; it is
//! deferred like the others and reported separately.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, warn};

use blobshare_state::{ItemId, SubmissionItem};

use crate::error::CapacityError;

/// Outcome of one selection pass.
#[derive(Debug, Clone, Default)]
pub struct BatchSelection {
    /// Admitted items, highest priority first.
    pub admitted: Vec<SubmissionItem>,
    /// Items left pending for the next cycle, highest priority first.
    pub deferred: Vec<SubmissionItem>,
    /// Deferred items that exceed the capacity on their own.
    pub oversized: Vec<CapacityError>,
}

impl BatchSelection {
    pub fn admitted_size_kb(&self) -> f64 {
        self.admitted.iter().map(|i| i.size_kb).sum()
    }

    pub fn admitted_ids(&self) -> Vec<ItemId> {
        self.admitted.iter().map(|i| i.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}

/// Priority order: score descending, then earlier creation, then id.
pub fn priority_order(a: &SubmissionItem, b: &SubmissionItem) -> Ordering {
    b.priority_score
        .partial_cmp(&a.priority_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Select the next batch from `pending` under `capacity_kb`.
pub fn select_batch(mut pending: Vec<SubmissionItem>, capacity_kb: f64) -> BatchSelection {
    pending.retain(SubmissionItem::is_pending);
    pending.sort_by(priority_order);

    let mut used_kb = 0.0;
    let mut chosen: HashSet<ItemId> = HashSet::new();
    for item in &pending {
        if used_kb + item.size_kb <= capacity_kb {
            used_kb += item.size_kb;
            chosen.insert(item.id.clone());
        }
    }

    let mut selection = BatchSelection::default();
    for mut item in pending {
        if chosen.contains(&item.id) {
            item.processed = true;
            selection.admitted.push(item);
        } else {
            if item.size_kb > capacity_kb {
                warn!(
                    item_id = %item.id,
                    size_kb = item.size_kb,
                    capacity_kb,
                    wait_rounds = item.wait_rounds,
                    "item exceeds batch capacity and cannot be admitted"
                );
                selection.oversized.push(CapacityError {
                    item_id: item.id.clone(),
                    size_kb: item.size_kb,
                    capacity_kb,
                });
            }
            item.wait_rounds += 1;
            selection.deferred.push(item);
        }
    }

    debug!(
        admitted = selection.admitted.len(),
        deferred = selection.deferred.len(),
        oversized = selection.oversized.len(),
        used_kb,
        capacity_kb,
        "batch selected"
    );
    selection
}
