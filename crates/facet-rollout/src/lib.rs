//! Facet Rollout: applying route manifests to a router
//!
//! The router is an external system reached through [`RouterEffects`]. This
//! crate owns the client side of a rollout:
//!
//! - **Engine**: commit, batched apply and activate, driven as a phase machine
//! - **Batching**: sequential fixed-size `applyRoutes` batches in manifest order
//! - **Retries**: fixed or exponential backoff for transient router failures
//! - **Reports**: a structured [`RolloutReport`] for every run, failed or not
//! - **Configuration**: [`RolloutConfig`] loaded from TOML
//!
//! Rollouts are not transactional across batches. A failed run leaves its
//! applied batches in place and reports the batch it stopped on.

pub mod batch;
pub mod cancel;
pub mod config;
pub mod effects;
pub mod engine;
pub mod errors;
pub mod phase;
pub mod report;
pub mod retry;

pub use batch::{partition, RolloutPlan, RouteBatch};
pub use cancel::CancellationFlag;
pub use config::{RolloutConfig, DEFAULT_BATCH_SIZE, MAX_BACKOFF_MS, MAX_BATCH_SIZE, MAX_RETRIES};
pub use effects::{AutoConfirm, ConfirmationEffects, RouterEffects, RouterStatus, TxReceipt};
pub use engine::RouteApplicationEngine;
pub use errors::{ConfigError, ErrorClass, PreconditionError, Result, RolloutError, RouterError};
pub use phase::RolloutPhase;
pub use report::{
    BatchReport, BatchStatus, FailureDetail, ReportRecorder, RolloutReport, RunStatus,
    SampleCheck, SampleStatus,
};
pub use retry::{BackoffStrategy, RetryPolicy, RetryResult, RetryableError};
