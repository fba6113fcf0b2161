//! Priority scoring.
//!
//! Scores each pending item as a weighted sum of three normalized
//! features:
//!
//! - **bid**: min-max normalized over the pending set
//! - **wait**: min-max normalized over the pending set
//! - **size**: normalized against the utilization ceiling, not the
//!   observed range, so it reflects how much of a batch the item fills
//!
//! Range denominators are floored at 1, so a degenerate range (all values
//! equal) never produces NaN.

use blobshare_state::{SubmissionItem, WeightState};

/// Observed feature ranges over one pending set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRanges {
    pub min_bid: f64,
    pub max_bid: f64,
    pub min_wait: f64,
    pub max_wait: f64,
    pub max_utilization_kb: f64,
}

impl FeatureRanges {
    pub fn observe(pending: &[SubmissionItem], max_utilization_kb: f64) -> Self {
        let mut ranges = Self {
            min_bid: 0.0,
            max_bid: 0.0,
            min_wait: 0.0,
            max_wait: 0.0,
            max_utilization_kb,
        };
        let Some(first) = pending.first() else {
            return ranges;
        };
        ranges.min_bid = first.bid;
        ranges.max_bid = first.bid;
        ranges.min_wait = f64::from(first.wait_rounds);
        ranges.max_wait = f64::from(first.wait_rounds);
        for item in &pending[1..] {
            let wait = f64::from(item.wait_rounds);
            ranges.min_bid = ranges.min_bid.min(item.bid);
            ranges.max_bid = ranges.max_bid.max(item.bid);
            ranges.min_wait = ranges.min_wait.min(wait);
            ranges.max_wait = ranges.max_wait.max(wait);
        }
        ranges
    }
}

/// Score breakdown for a single item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub bid: f64,
    pub wait: f64,
    pub size: f64,
    pub total: f64,
}

/// Score one item against precomputed ranges and the current weights.
pub fn score_item(
    item: &SubmissionItem,
    ranges: &FeatureRanges,
    weights: &WeightState,
) -> ScoreBreakdown {
    let bid = (item.bid - ranges.min_bid) / (ranges.max_bid - ranges.min_bid).max(1.0);
    let wait = (f64::from(item.wait_rounds) - ranges.min_wait)
        / (ranges.max_wait - ranges.min_wait).max(1.0);
    let size = if ranges.max_utilization_kb > 0.0 {
        item.size_kb / ranges.max_utilization_kb
    } else {
        0.0
    };
    let total = weights.alpha * bid + weights.beta * wait + weights.gamma * size;
    ScoreBreakdown {
        bid,
        wait,
        size,
        total,
    }
}

/// Rescore every pending item in place. Processed items keep their
/// frozen score and do not contribute to the ranges.
///
/// Returns the number of items rescored.
pub fn rescore(items: &mut [SubmissionItem], weights: &WeightState) -> usize {
    let pending: Vec<SubmissionItem> = items.iter().filter(|i| i.is_pending()).cloned().collect();
    let ranges = FeatureRanges::observe(&pending, weights.max_utilization_kb);

    let mut count = 0;
    for item in items.iter_mut().filter(|i| i.is_pending()) {
        item.priority_score = score_item(item, &ranges, weights).total;
        count += 1;
    }
    count
}
