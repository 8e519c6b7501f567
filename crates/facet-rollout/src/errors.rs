//! Rollout error taxonomy
//!
//! | class                      | retried | examples                                     |
//! |----------------------------|---------|----------------------------------------------|
//! | configuration              | no      | bad manifest shape, out-of-range config      |
//! | validation                 | no      | recomputed root or proof disagrees           |
//! | precondition               | no      | no pending root, foreign root, frozen router |
//! | transient transaction      | yes     | timeout, contention, node hiccup             |
//! | post-verification warning  | no      | sampled route points elsewhere               |
//!
//! Validation and configuration failures happen before any state-changing
//! call is issued. Transaction failures are scoped to the failing batch.

use facet_manifest::{ConfigurationError, Hash32, ManifestError, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Failure reported by the router for a single call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// Temporary failure: congestion, nonce contention, dropped connection
    #[error("transient router failure: {message}")]
    Transient {
        /// Error message describing the failure
        message: String,
    },

    /// The router endpoint could not be reached
    #[error("router unavailable: {message}")]
    Unavailable {
        /// Error message describing the failure
        message: String,
    },

    /// The call did not return within the per-attempt timeout
    #[error("router call timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// The router executed and rejected the call
    #[error("router call reverted: {reason}")]
    Reverted {
        /// Revert reason
        reason: String,
    },
}

impl RouterError {
    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a revert
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    /// Whether resubmitting the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::Unavailable { .. } | Self::Timeout { .. }
        )
    }
}

/// Router state that forbids applying the manifest
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    /// Nothing has been committed
    #[error("router has no pending root; expected {expected}")]
    NoPendingRoot {
        /// Root the manifest commits to
        expected: Hash32,
    },

    /// A different root is pending
    #[error("pending root mismatch: router has {found}, manifest commits to {expected}")]
    PendingRootMismatch {
        /// Root the manifest commits to
        expected: Hash32,
        /// Root pending on the router
        found: Hash32,
    },

    /// The pending epoch is not the one this run committed
    #[error("pending epoch mismatch: router has {found}, expected {expected}")]
    PendingEpochMismatch {
        /// Epoch this run committed
        expected: u64,
        /// Epoch pending on the router
        found: u64,
    },

    /// Emergency halt is engaged
    #[error("router is frozen")]
    RouterFrozen,

    /// Commit would not advance the epoch
    #[error("epoch {requested} is not newer than active epoch {active}")]
    StaleEpoch {
        /// Epoch requested for the commit
        requested: u64,
        /// Currently active epoch
        active: u64,
    },
}

/// Invalid rollout configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Batch size is zero or above the cap
    #[error("batch_size {value} outside 1..={max}")]
    BatchSizeOutOfRange {
        /// Requested batch size
        value: usize,
        /// Maximum allowed batch size
        max: usize,
    },

    /// A retry setting is above its cap
    #[error("{field} {value} exceeds the maximum of {max}")]
    LimitExceeded {
        /// Offending field
        field: &'static str,
        /// Configured value
        value: u64,
        /// Largest accepted value
        max: u64,
    },

    /// A timeout was configured as zero
    #[error("{field} must be greater than zero")]
    ZeroTimeout {
        /// Offending field
        field: &'static str,
    },

    /// Configuration text could not be parsed
    #[error("failed to parse rollout config: {message}")]
    Parse {
        /// Parser message
        message: String,
    },

    /// Configuration file could not be read
    #[error("failed to read rollout config: {message}")]
    Io {
        /// I/O message
        message: String,
    },
}

/// Classification used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Inputs or configuration are wrong
    Configuration,
    /// Recomputed commitments disagree
    Validation,
    /// Router state forbids the rollout
    Precondition,
    /// Retry budget exhausted on transient failures
    TransientTransaction,
    /// Router rejected a call outright
    Transaction,
    /// Sampled routes disagree after application
    PostVerification,
    /// Operator declined or interrupted the run
    Aborted,
    /// Wall-clock ceiling reached
    DeadlineExceeded,
    /// Engine state machine misuse
    Internal,
}

/// Any failure of a rollout run
#[derive(Debug, Clone, thiserror::Error)]
pub enum RolloutError {
    /// Manifest is structurally wrong
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Manifest commitments do not recompute
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Manifest could not be read or decoded
    #[error("manifest unreadable: {message}")]
    Manifest {
        /// Error message
        message: String,
    },

    /// Rollout configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Router state forbids the rollout
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// A batch could not be applied
    #[error("batch {batch} failed after {attempts} attempt(s): {source}")]
    BatchFailed {
        /// Zero-based batch index
        batch: usize,
        /// Attempts made
        attempts: u32,
        /// Last router error
        source: RouterError,
    },

    /// A non-batch router call failed
    #[error("router call {call} failed: {source}")]
    Router {
        /// Router method name
        call: &'static str,
        /// Router error
        source: RouterError,
    },

    /// Operator confirmation was refused
    #[error("rollout declined at confirmation")]
    ConfirmationDeclined,

    /// Cancellation flag was raised between batches
    #[error("rollout cancelled after {applied_batches} applied batch(es)")]
    Cancelled {
        /// Batches applied before the cancellation was observed
        applied_batches: usize,
    },

    /// Wall-clock ceiling reached
    #[error("rollout exceeded its {limit:?} wall-clock limit")]
    DeadlineExceeded {
        /// Configured limit
        limit: Duration,
    },

    /// Sampled routes disagree with the manifest
    #[error("post-application check found {mismatches} mismatching sampled route(s)")]
    PostVerification {
        /// Number of sampled routes that disagree
        mismatches: usize,
    },

    /// Engine state machine was driven out of order
    #[error("illegal rollout transition from {from} to {to}")]
    IllegalTransition {
        /// Current phase name
        from: &'static str,
        /// Requested phase name
        to: &'static str,
    },
}

impl RolloutError {
    /// Report classification
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Configuration(_) | Self::Manifest { .. } | Self::Config(_) => {
                ErrorClass::Configuration
            }
            Self::Validation(_) => ErrorClass::Validation,
            Self::Precondition(_) => ErrorClass::Precondition,
            Self::BatchFailed { source, .. } | Self::Router { source, .. } => {
                if source.is_transient() {
                    ErrorClass::TransientTransaction
                } else {
                    ErrorClass::Transaction
                }
            }
            Self::ConfirmationDeclined | Self::Cancelled { .. } => ErrorClass::Aborted,
            Self::DeadlineExceeded { .. } => ErrorClass::DeadlineExceeded,
            Self::PostVerification { .. } => ErrorClass::PostVerification,
            Self::IllegalTransition { .. } => ErrorClass::Internal,
        }
    }

    /// Whether any state-changing call can have happened before this error
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Configuration | ErrorClass::Validation
        )
    }
}

impl From<ManifestError> for RolloutError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Configuration(err) => Self::Configuration(err),
            ManifestError::Validation(err) => Self::Validation(err),
            other => Self::Manifest {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for rollout operations
pub type Result<T> = std::result::Result<T, RolloutError>;
