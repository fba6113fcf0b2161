//! Admission pipeline from intake to transport hand-off.
//!
//! Each submission moves through typed stages:
//!
//! ```text
//! SubmissionRequest ──receive──▶ Received ──validate──▶ Validated ──persist──▶ SubmissionItem
//!                                                                                   │
//!                                            ┌──────────── scheduling cycle ◀───────┘
//!                                            ▼
//!                   recompute weights ▶ rescore ▶ threshold? ─no─▶ Pending
//!                                                    │yes
//!                                                    ▼
//!                              select ▶ pack ▶ reserve ▶ spawn flush task
//!                                                              │
//!                          transport (retry) ─ok─▶ ack ─▶ Flushed
//!                                            └err─▶ requeue ─▶ Pending
//! ```
//!
//! Intake and validation run concurrently across requests. The scheduling
//! cycle is serialized by the mutex that owns the [`WeightState`]; it is
//! released while the transport is called. Admitted items are reserved
//! (`processed = true`, plus an entry in the store's reserved index) before
//! the lock is released, so a concurrent cycle can never pick them up.
//!
//! The transport call, the acknowledgment and the requeue run in a spawned
//! task that owns the shared pipeline state. Dropping the `submit` future
//! only stops waiting for the result; the flush still completes or rolls
//! back. Reservations left behind by a process exit are requeued by
//! [`AdmissionPipeline::new`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use blobshare_codec::{BlobEntry, merge};
use blobshare_core::{
    MAX_DATA_LEN, MAX_ROLLUP_ID, SchedulerConfig, decode_signature_hex,
};
use blobshare_state::{FlushRecord, ItemId, StateStore, SubmissionItem, WeightState, epoch_millis};

use crate::capability::{Transport, Validator};
use crate::error::{CapacityError, SchedulerError, SchedulerResult};
use crate::retry::RetryPolicy;
use crate::scorer::rescore;
use crate::selector::select_batch;
use crate::weights::recompute_weights;

/// A raw submission as it arrives from a producer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    /// Producer identity.
    #[serde(alias = "address")]
    pub identity: Option<String>,
    pub rollup_id: Option<u32>,
    /// Hex signature, `0x`-prefixed or bare.
    pub signature: Option<String>,
    pub data: Option<String>,
    pub bid: Option<f64>,
}

/// A submission with every required field present and well-formed.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub identity: String,
    pub rollup_id: u32,
    pub signature: Vec<u8>,
    pub data: String,
    pub bid: f64,
}

/// A submission the validator has accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated(Received);

impl SubmissionRequest {
    /// Check presence and shape of every field.
    pub fn receive(self) -> SchedulerResult<Received> {
        let missing = |field: &str| SchedulerError::Validation(format!("missing required field: {field}"));

        let identity = self.identity.filter(|s| !s.is_empty()).ok_or_else(|| missing("identity"))?;
        let signature = self.signature.filter(|s| !s.is_empty()).ok_or_else(|| missing("signature"))?;
        let data = self.data.filter(|s| !s.is_empty()).ok_or_else(|| missing("data"))?;
        let bid = self.bid.ok_or_else(|| missing("bid"))?;
        let rollup_id = self.rollup_id.ok_or_else(|| missing("rollupId"))?;

        if !bid.is_finite() || bid < 0.0 {
            return Err(SchedulerError::Validation(format!(
                "bid must be a non-negative number, got {bid}"
            )));
        }
        if rollup_id > MAX_ROLLUP_ID {
            return Err(SchedulerError::Validation(format!(
                "rollupId {rollup_id} exceeds {MAX_ROLLUP_ID}"
            )));
        }
        if data.len() > MAX_DATA_LEN {
            return Err(SchedulerError::Validation(format!(
                "data length {} exceeds maximum {MAX_DATA_LEN} bytes",
                data.len()
            )));
        }
        let signature =
            decode_signature_hex(&signature).map_err(|e| SchedulerError::Validation(e.to_string()))?;

        Ok(Received {
            identity,
            rollup_id,
            signature,
            data,
            bid,
        })
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub item_id: ItemId,
    /// Whether this submission triggered a batch that reached the transport.
    pub flushed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_ref: Option<String>,
    /// Ids packed into the batch, in packed order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub admitted: Vec<ItemId>,
    /// Pending items that can never fit in a batch.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<CapacityError>,
    /// Set when a flush was attempted and the transport gave up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<String>,
}

impl SubmitOutcome {
    fn pending(item_id: ItemId, warnings: Vec<CapacityError>) -> Self {
        Self {
            accepted: true,
            item_id,
            flushed: false,
            transport_ref: None,
            admitted: Vec::new(),
            warnings,
            transport_error: None,
        }
    }
}

/// The admission orchestrator for one logical queue.
pub struct AdmissionPipeline {
    shared: Arc<Shared>,
}

/// State shared between request handlers and flush tasks.
struct Shared {
    store: StateStore,
    config: SchedulerConfig,
    validator: Arc<dyn Validator>,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    /// Serialization point for scheduling cycles. Owns the live weights.
    weights: Mutex<WeightState>,
}

/// A reserved batch handed to the flush task.
struct FlushJob {
    payload: Vec<u8>,
    /// Reserved items in packed order.
    admitted: Vec<SubmissionItem>,
    total_size_kb: f64,
    /// Accumulator value committed with the reservation.
    accumulated_at_flush: f64,
    /// Size of the submission whose cycle triggered the flush.
    trigger_size_kb: f64,
}

enum FlushResult {
    Acknowledged(String),
    Requeued(String),
}

impl AdmissionPipeline {
    /// Create a pipeline, resuming persisted weights if the store has any.
    ///
    /// Items still reserved from a flush that never finished are returned
    /// to the pending set.
    pub fn new(
        store: StateStore,
        config: SchedulerConfig,
        validator: Arc<dyn Validator>,
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
    ) -> SchedulerResult<Self> {
        let weights = match store.load_weights()? {
            Some(persisted) => persisted.with_config(&config),
            None => WeightState::neutral(&config),
        };

        let stranded = requeue(store.list_reserved()?);
        if !stranded.is_empty() {
            warn!(
                count = stranded.len(),
                "requeueing items from an unacknowledged flush"
            );
        }
        store.commit_cycle(&stranded, &weights)?;
        info!(
            alpha = weights.alpha,
            beta = weights.beta,
            gamma = weights.gamma,
            accumulated_kb = weights.current_accumulated_size_kb,
            "admission pipeline ready"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                store,
                config,
                validator,
                transport,
                retry,
                weights: Mutex::new(weights),
            }),
        })
    }

    pub fn store(&self) -> &StateStore {
        &self.shared.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Snapshot of the current weight state.
    pub async fn weights(&self) -> WeightState {
        self.shared.weights.lock().await.clone()
    }

    /// Run a submission through every stage.
    pub async fn submit(&self, request: SubmissionRequest) -> SchedulerResult<SubmitOutcome> {
        let received = request.receive()?;
        let validated = self.validate(received).await?;
        let item = self.persist(validated)?;
        self.run_cycle(item).await
    }

    /// Consult the validator. Both checks must succeed; any error or
    /// negative answer rejects the submission.
    pub async fn validate(&self, received: Received) -> SchedulerResult<Validated> {
        let validator = &self.shared.validator;
        let (signature, funds) = tokio::join!(
            validator.verify_signature(&received.identity, &received.data, &received.signature),
            validator.check_funds(&received.identity, received.bid),
        );

        let reject = |reason: String| {
            warn!(identity = %received.identity, %reason, "submission rejected");
            SchedulerError::Validation(reason)
        };
        match signature {
            Ok(true) => {}
            Ok(false) => return Err(reject("invalid signature".to_string())),
            Err(e) => return Err(reject(format!("signature check failed: {e}"))),
        }
        match funds {
            Ok(true) => {}
            Ok(false) => return Err(reject("insufficient funds for bid".to_string())),
            Err(e) => return Err(reject(format!("funds check failed: {e}"))),
        }
        Ok(Validated(received))
    }

    /// Store a validated submission as a fresh pending item.
    pub fn persist(&self, validated: Validated) -> SchedulerResult<SubmissionItem> {
        let Validated(r) = validated;
        let item = SubmissionItem::new(r.rollup_id, r.identity, r.signature, r.data, r.bid);
        self.shared.store.put_item(&item)?;
        debug!(item_id = %item.id, size_kb = item.size_kb, bid = item.bid, "submission stored");
        Ok(item)
    }

    /// One scheduling cycle triggered by `item`'s arrival.
    async fn run_cycle(&self, item: SubmissionItem) -> SchedulerResult<SubmitOutcome> {
        let shared = &self.shared;
        let mut weights = shared.weights.lock().await;

        let mut pending = shared.store.list_pending()?;
        let mut next = recompute_weights(&pending, &weights, epoch_millis());
        rescore(&mut pending, &next);

        let threshold = shared.config.flush_threshold_kb;
        if next.current_accumulated_size_kb + item.size_kb <= threshold {
            let warnings = shared.oversized(&pending);
            next.current_accumulated_size_kb += item.size_kb;
            shared.store.commit_cycle(&pending, &next)?;
            *weights = next;
            return Ok(SubmitOutcome::pending(item.id, warnings));
        }

        let selection = select_batch(pending, shared.config.capacity_kb);
        let warnings = selection.oversized.clone();
        if selection.is_empty() {
            warn!(
                deferred = selection.deferred.len(),
                "flush threshold crossed but no pending item fits the batch"
            );
            next.current_accumulated_size_kb += item.size_kb;
            shared.store.commit_cycle(&selection.deferred, &next)?;
            *weights = next;
            return Ok(SubmitOutcome::pending(item.id, warnings));
        }

        let entries: Vec<BlobEntry> = selection.admitted.iter().map(to_entry).collect();
        let payload = match merge(&entries) {
            Ok(payload) => payload,
            Err(e) => {
                let mut items = requeue(selection.admitted);
                items.extend(selection.deferred);
                next.current_accumulated_size_kb += item.size_kb;
                shared.store.commit_cycle(&items, &next)?;
                *weights = next;
                return Err(e.into());
            }
        };

        // Reserve the admitted items before releasing the lock.
        let admitted = selection.admitted_ids();
        let job = FlushJob {
            payload,
            admitted: selection.admitted.clone(),
            total_size_kb: selection.admitted_size_kb(),
            accumulated_at_flush: next.current_accumulated_size_kb,
            trigger_size_kb: item.size_kb,
        };
        let mut changed = selection.admitted;
        changed.extend(selection.deferred);
        shared.store.commit_reservation(&changed, &admitted, &next)?;
        *weights = next;
        drop(weights);

        info!(
            items = admitted.len(),
            total_size_kb = job.total_size_kb,
            payload_bytes = job.payload.len(),
            "flushing batch"
        );
        let task_shared = Arc::clone(shared);
        let flush = tokio::spawn(async move { task_shared.finish_flush(job).await });
        let result = flush
            .await
            .map_err(|e| SchedulerError::Flush(e.to_string()))?;

        Ok(match result {
            FlushResult::Acknowledged(transport_ref) => SubmitOutcome {
                accepted: true,
                item_id: item.id,
                flushed: true,
                transport_ref: Some(transport_ref),
                admitted,
                warnings,
                transport_error: None,
            },
            FlushResult::Requeued(e) => {
                let mut outcome = SubmitOutcome::pending(item.id, warnings);
                outcome.transport_error = Some(e);
                outcome
            }
        })
    }
}

impl Shared {
    /// Hand a reserved batch to the transport, then acknowledge or requeue.
    /// Store failures here are logged, not returned: the reserved index
    /// still holds the batch and the next startup requeues it.
    async fn finish_flush(&self, job: FlushJob) -> FlushResult {
        let transport = &self.transport;
        let payload = job.payload.as_slice();
        let result = self
            .retry
            .run("submit packed batch", || transport.submit_packed_batch(payload))
            .await;

        let mut weights = self.weights.lock().await;
        match result {
            Ok(transport_ref) => {
                // Keep increments made by cycles that ran during the hand-off.
                weights.current_accumulated_size_kb =
                    (weights.current_accumulated_size_kb - job.accumulated_at_flush).max(0.0);
                let record = FlushRecord {
                    transport_ref: transport_ref.clone(),
                    item_ids: job.admitted.iter().map(|i| i.id.clone()).collect(),
                    total_size_kb: job.total_size_kb,
                    payload_bytes: job.payload.len(),
                    flushed_at: epoch_millis(),
                };
                match self.store.complete_flush(&record, &weights) {
                    Ok(()) => info!(%transport_ref, items = record.item_ids.len(), "batch flushed"),
                    Err(e) => error!(
                        error = %e,
                        %transport_ref,
                        "batch acknowledged but the flush could not be recorded"
                    ),
                }
                FlushResult::Acknowledged(transport_ref)
            }
            Err(e) => {
                weights.current_accumulated_size_kb += job.trigger_size_kb;
                let restored = requeue(job.admitted);
                match self.store.commit_cycle(&restored, &weights) {
                    Ok(()) => error!(
                        error = %e,
                        requeued = restored.len(),
                        attempts = self.retry.max_attempts,
                        "transport failed, admitted items requeued"
                    ),
                    Err(store_err) => error!(
                        error = %e,
                        store_error = %store_err,
                        "transport failed and the requeue could not be stored; \
                         items stay reserved until restart"
                    ),
                }
                FlushResult::Requeued(e)
            }
        }
    }

    fn oversized(&self, pending: &[SubmissionItem]) -> Vec<CapacityError> {
        let capacity_kb = self.config.capacity_kb;
        pending
            .iter()
            .filter(|i| i.is_pending() && i.size_kb > capacity_kb)
            .map(|i| CapacityError {
                item_id: i.id.clone(),
                size_kb: i.size_kb,
                capacity_kb,
            })
            .collect()
    }
}

fn to_entry(item: &SubmissionItem) -> BlobEntry {
    BlobEntry {
        rollup_id: item.rollup_id,
        signature: item.signature.clone(),
        data: item.data.clone(),
    }
}

/// Return reserved items to the pending set. They count as scored and
/// not admitted for this cycle.
fn requeue(items: Vec<SubmissionItem>) -> Vec<SubmissionItem> {
    items
        .into_iter()
        .map(|mut item| {
            item.processed = false;
            item.wait_rounds += 1;
            item
        })
        .collect()
}
