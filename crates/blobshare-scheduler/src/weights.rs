//! Adaptive weight controller.
//!
//! Each cycle observes the pending set, derives a raw signal for each of
//! the three weights, smooths it against the previous weight with its own
//! λ, and renormalizes so that `alpha + beta + gamma = 1`.
//!
//! - **alpha** (bid): mean bid relative to the highest bid
//! - **beta** (wait): median wait relative to the target wait
//! - **gamma** (utilization): mean size relative to the utilization ceiling

use tracing::debug;

use blobshare_state::{SubmissionItem, WeightState};

/// Per-cycle statistics over the pending set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CycleStats {
    pub avg_bid: f64,
    pub max_bid: f64,
    pub median_wait: f64,
    pub avg_size_kb: f64,
}

impl CycleStats {
    pub fn observe(pending: &[SubmissionItem]) -> Self {
        if pending.is_empty() {
            return Self::default();
        }
        let n = pending.len() as f64;
        let avg_bid = pending.iter().map(|i| i.bid).sum::<f64>() / n;
        let max_bid = pending.iter().map(|i| i.bid).fold(f64::MIN, f64::max);
        let avg_size_kb = pending.iter().map(|i| i.size_kb).sum::<f64>() / n;
        let waits: Vec<u32> = pending.iter().map(|i| i.wait_rounds).collect();
        Self {
            avg_bid,
            max_bid,
            median_wait: median(waits),
            avg_size_kb,
        }
    }
}

/// Median of the values; the mean of the two middle values for an even
/// count, 0 when empty.
pub fn median(mut values: Vec<u32>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        f64::from(values[mid])
    } else {
        (f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0
    }
}

/// Guarded ratio: 0 when the denominator is not positive.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > f64::EPSILON {
        numerator / denominator
    } else {
        0.0
    }
}

fn smooth(lambda: f64, current: f64, previous: f64) -> f64 {
    lambda * current + (1.0 - lambda) * previous
}

/// Scale the weights to sum to 1, falling back to `(1/3, 1/3, 1/3)`
/// when they are all zero or not finite.
fn normalize(alpha: f64, beta: f64, gamma: f64) -> (f64, f64, f64) {
    let total = alpha + beta + gamma;
    if !total.is_finite() || total <= 0.0 {
        let third = 1.0 / 3.0;
        return (third, third, third);
    }
    (alpha / total, beta / total, gamma / total)
}

/// Compute the next weight state from the pending set.
///
/// An empty pending set leaves the weights as they were (renormalized,
/// neutral if degenerate). The accumulator and the configuration fields
/// are carried over untouched.
pub fn recompute_weights(
    pending: &[SubmissionItem],
    previous: &WeightState,
    now: u64,
) -> WeightState {
    let mut next = previous.clone();
    next.last_updated = now;

    if pending.is_empty() {
        let (alpha, beta, gamma) = normalize(previous.alpha, previous.beta, previous.gamma);
        next.alpha = alpha;
        next.beta = beta;
        next.gamma = gamma;
        return next;
    }

    let stats = CycleStats::observe(pending);
    let alpha_cur = ratio(stats.avg_bid, stats.max_bid);
    let beta_cur = ratio(stats.median_wait, previous.target_wait_rounds);
    let gamma_cur = ratio(stats.avg_size_kb, previous.max_utilization_kb);

    let (alpha, beta, gamma) = normalize(
        smooth(previous.lambda_bid, alpha_cur, previous.alpha),
        smooth(previous.lambda_wait, beta_cur, previous.beta),
        smooth(previous.lambda_utilization, gamma_cur, previous.gamma),
    );
    next.alpha = alpha;
    next.beta = beta;
    next.gamma = gamma;

    debug!(
        pending = pending.len(),
        avg_bid = stats.avg_bid,
        median_wait = stats.median_wait,
        avg_size_kb = stats.avg_size_kb,
        alpha,
        beta,
        gamma,
        "weights recomputed"
    );
    next
}
