//! Rollout phase state machine
//!
//! `NoPending -> Committed -> RoutesApplying -> Activated`. A failed run keeps
//! the last phase it reached; the report status carries the failure.

use crate::errors::RolloutError;
use facet_manifest::Hash32;
use serde::{Deserialize, Serialize};

/// Phase of a rollout run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RolloutPhase {
    /// Nothing committed by or for this run yet
    #[default]
    NoPending,
    /// Root is pending on the router
    Committed {
        /// Pending root
        root: Hash32,
        /// Pending epoch, when known
        epoch: Option<u64>,
    },
    /// Batches are being submitted
    RoutesApplying {
        /// Pending root
        root: Hash32,
        /// Pending epoch, when known
        epoch: Option<u64>,
        /// Batches confirmed so far
        applied_batches: usize,
    },
    /// Root promoted to active
    Activated {
        /// Active root
        root: Hash32,
        /// Active epoch, when known
        epoch: Option<u64>,
    },
}

impl RolloutPhase {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoPending => "no_pending",
            Self::Committed { .. } => "committed",
            Self::RoutesApplying { .. } => "routes_applying",
            Self::Activated { .. } => "activated",
        }
    }

    /// Root this phase refers to
    pub fn root(&self) -> Option<Hash32> {
        match self {
            Self::NoPending => None,
            Self::Committed { root, .. }
            | Self::RoutesApplying { root, .. }
            | Self::Activated { root, .. } => Some(*root),
        }
    }

    /// Batches confirmed so far
    pub fn applied_batches(&self) -> usize {
        match self {
            Self::RoutesApplying {
                applied_batches, ..
            } => *applied_batches,
            _ => 0,
        }
    }

    /// Record a pending root
    pub fn commit(self, root: Hash32, epoch: Option<u64>) -> Result<Self, RolloutError> {
        match self {
            Self::NoPending => Ok(Self::Committed { root, epoch }),
            other => Err(other.illegal("committed")),
        }
    }

    /// Start submitting batches
    pub fn begin_applying(self) -> Result<Self, RolloutError> {
        match self {
            Self::Committed { root, epoch } => Ok(Self::RoutesApplying {
                root,
                epoch,
                applied_batches: 0,
            }),
            other => Err(other.illegal("routes_applying")),
        }
    }

    /// Count one more confirmed batch
    pub fn batch_applied(self) -> Result<Self, RolloutError> {
        match self {
            Self::RoutesApplying {
                root,
                epoch,
                applied_batches,
            } => Ok(Self::RoutesApplying {
                root,
                epoch,
                applied_batches: applied_batches + 1,
            }),
            other => Err(other.illegal("routes_applying")),
        }
    }

    /// Promote the pending root
    pub fn activate(self) -> Result<Self, RolloutError> {
        match self {
            Self::RoutesApplying { root, epoch, .. } => Ok(Self::Activated { root, epoch }),
            other => Err(other.illegal("activated")),
        }
    }

    fn illegal(&self, to: &'static str) -> RolloutError {
        RolloutError::IllegalTransition {
            from: self.name(),
            to,
        }
    }
}
