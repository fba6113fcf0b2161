//! Domain types for the blobshare state store.
//!
//! These types represent the persisted submissions, the adaptive weight
//! state, and the record of each completed flush. All types are
//! serializable to/from JSON for storage in redb tables.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use blobshare_core::{SchedulerConfig, size_kb};

/// Unique identifier for a submission item (UUIDv7, time-ordered).
pub type ItemId = String;

// ── Submission ─────────────────────────────────────────────────────

/// A producer's request to have `data` carried in a future batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionItem {
    pub id: ItemId,
    /// Rollup ID written into the packed batch.
    pub rollup_id: u32,
    /// Identity of the submitter.
    pub origin_address: String,
    /// Raw 65-byte signature over `data`.
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub data: String,
    /// Offered price.
    pub bid: f64,
    /// Accounting size, derived once at creation.
    pub size_kb: f64,
    /// Scheduling cycles spent pending without admission.
    pub wait_rounds: u32,
    /// Set once the item is admitted into a batch.
    pub processed: bool,
    pub priority_score: f64,
    /// Unix timestamp (milliseconds) of creation.
    pub created_at: u64,
}

impl SubmissionItem {
    /// Build a fresh pending item. The size is derived here and never
    /// recomputed afterwards.
    pub fn new(
        rollup_id: u32,
        origin_address: impl Into<String>,
        signature: Vec<u8>,
        data: impl Into<String>,
        bid: f64,
    ) -> Self {
        let origin_address = origin_address.into();
        let data = data.into();
        let size_kb = size_kb(&origin_address, &data);
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            rollup_id,
            origin_address,
            signature,
            data,
            bid,
            size_kb,
            wait_rounds: 0,
            processed: false,
            priority_score: 0.0,
            created_at: epoch_millis(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.processed
    }
}

// ── Weights ────────────────────────────────────────────────────────

/// Adaptive fairness weights plus the configuration they are derived
/// under. A single row, owned by the weight controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightState {
    /// Bid weight.
    pub alpha: f64,
    /// Wait weight.
    pub beta: f64,
    /// Utilization weight.
    pub gamma: f64,
    pub lambda_bid: f64,
    pub lambda_wait: f64,
    pub lambda_utilization: f64,
    pub max_utilization_kb: f64,
    pub target_wait_rounds: f64,
    /// Size accumulated since the last successful flush.
    pub current_accumulated_size_kb: f64,
    /// Unix timestamp (milliseconds) of the last recompute.
    pub last_updated: u64,
}

impl WeightState {
    /// Neutral weights `(1/3, 1/3, 1/3)` under the given configuration.
    pub fn neutral(config: &SchedulerConfig) -> Self {
        Self {
            alpha: 1.0 / 3.0,
            beta: 1.0 / 3.0,
            gamma: 1.0 / 3.0,
            lambda_bid: config.lambda_bid,
            lambda_wait: config.lambda_wait,
            lambda_utilization: config.lambda_utilization,
            max_utilization_kb: config.max_utilization_kb,
            target_wait_rounds: config.target_wait_rounds,
            current_accumulated_size_kb: 0.0,
            last_updated: 0,
        }
    }

    /// Re-apply configuration onto a persisted state, keeping the learned
    /// weights and the accumulator.
    pub fn with_config(mut self, config: &SchedulerConfig) -> Self {
        self.lambda_bid = config.lambda_bid;
        self.lambda_wait = config.lambda_wait;
        self.lambda_utilization = config.lambda_utilization;
        self.max_utilization_kb = config.max_utilization_kb;
        self.target_wait_rounds = config.target_wait_rounds;
        self
    }

    pub fn weight_sum(&self) -> f64 {
        self.alpha + self.beta + self.gamma
    }
}

// ── Flush log ──────────────────────────────────────────────────────

/// A batch that was packed and acknowledged by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlushRecord {
    /// Reference returned by the transport (e.g. a transaction hash).
    pub transport_ref: String,
    /// Admitted items in packed order.
    pub item_ids: Vec<ItemId>,
    pub total_size_kb: f64,
    pub payload_bytes: usize,
    /// Unix timestamp (milliseconds) of the acknowledgment.
    pub flushed_at: u64,
}

impl FlushRecord {
    /// Build the composite key for the flushes table.
    pub fn table_key(&self) -> String {
        format!("{:020}:{}", self.flushed_at, self.transport_ref)
    }
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Serialize byte vectors as `0x`-prefixed hex strings.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let body = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(body).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_starts_pending() {
        let item = SubmissionItem::new(1, "0xabc", vec![1; 65], "data", 0.05);
        assert!(item.is_pending());
        assert_eq!(item.wait_rounds, 0);
        assert_eq!(item.priority_score, 0.0);
        assert_eq!(item.size_kb, size_kb("0xabc", "data"));
    }

    #[test]
    fn ids_are_unique() {
        let a = SubmissionItem::new(1, "a", vec![1; 65], "x", 0.0);
        let b = SubmissionItem::new(1, "a", vec![1; 65], "x", 0.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn signature_serializes_as_hex() {
        let item = SubmissionItem::new(1, "a", vec![0xab; 65], "x", 0.0);
        let json = serde_json::to_value(&item).unwrap();
        let sig = json["signature"].as_str().unwrap();
        assert!(sig.starts_with("0xabab"));
        let back: SubmissionItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn neutral_weights_sum_to_one() {
        let weights = WeightState::neutral(&SchedulerConfig::default());
        assert!((weights.weight_sum() - 1.0).abs() < 1e-9);
        assert_eq!(weights.max_utilization_kb, 128.0);
    }

    #[test]
    fn flush_keys_sort_by_time() {
        let early = FlushRecord {
            transport_ref: "zz".into(),
            item_ids: vec![],
            total_size_kb: 0.0,
            payload_bytes: 0,
            flushed_at: 9,
        };
        let late = FlushRecord {
            flushed_at: 10,
            transport_ref: "aa".into(),
            ..early.clone()
        };
        assert!(early.table_key() < late.table_key());
    }
}
