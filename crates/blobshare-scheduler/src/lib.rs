//! blobshare-scheduler: adaptive admission of blob submissions.
//!
//! Pending submissions are ranked by a weighted score over three
//! normalized features: bid, time spent waiting, and how well the item
//! fills the utilization target. The weights themselves adapt each cycle
//! from observed bids, median wait and average size, so the scheduler
//! leans toward whichever dimension is currently under-served.
//!
//! Once the accumulated pending size crosses the flush threshold, the
//! highest-priority items that fit the batch capacity are packed with
//! `blobshare-codec` and handed to a [`Transport`]. See [`pipeline`] for
//! the stage diagram.

pub mod capability;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod scorer;
pub mod selector;
pub mod weights;

pub use capability::{BoxFuture, Transport, Validator};
pub use error::{CapacityError, SchedulerError, SchedulerResult};
pub use pipeline::{AdmissionPipeline, Received, SubmissionRequest, SubmitOutcome, Validated};
pub use retry::RetryPolicy;
pub use scorer::{FeatureRanges, ScoreBreakdown, rescore, score_item};
pub use selector::{BatchSelection, priority_order, select_batch};
pub use weights::{CycleStats, recompute_weights};
