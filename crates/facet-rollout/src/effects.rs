//! Router and operator effects consumed by the engine
//!
//! The on-chain router is an external system. The engine only sees it through
//! [`RouterEffects`], whose methods mirror the router's public interface one to
//! one. Production handlers wrap a chain client; tests use the in-memory
//! router from `facet-testkit`.
//!
//! The router reports "nothing pending" as a zero root, exactly as the
//! contract's getters do.

use crate::batch::RolloutPlan;
use crate::errors::RouterError;
use async_trait::async_trait;
use facet_manifest::{Address, Hash32, Selector};
use serde::{Deserialize, Serialize};

/// Confirmation of a state-changing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: Hash32,
    /// Gas consumed
    pub gas_used: u64,
}

/// Operations exposed by the external router
#[async_trait]
pub trait RouterEffects: Send + Sync {
    /// Record a pending root for `epoch`
    async fn commit_root(&self, root: Hash32, epoch: u64) -> Result<TxReceipt, RouterError>;

    /// Pending root, zero when none
    async fn pending_root(&self) -> Result<Hash32, RouterError>;

    /// Epoch of the pending root
    async fn pending_epoch(&self) -> Result<u64, RouterError>;

    /// Active root, zero before the first activation
    async fn active_root(&self) -> Result<Hash32, RouterError>;

    /// Epoch of the active root
    async fn active_epoch(&self) -> Result<u64, RouterError>;

    /// Install a batch of routes, each verified against the pending root.
    ///
    /// The slices are parallel. The whole batch reverts if any proof fails.
    async fn apply_routes(
        &self,
        selectors: &[Selector],
        facets: &[Address],
        codehashes: &[Hash32],
        proofs: &[Vec<Hash32>],
        is_right: &[Vec<bool>],
    ) -> Result<TxReceipt, RouterError>;

    /// Promote the pending root to active
    async fn activate_committed_root(&self) -> Result<TxReceipt, RouterError>;

    /// Emergency-halt flag
    async fn frozen(&self) -> Result<bool, RouterError>;

    /// Facet currently serving `selector`, zero when unrouted
    async fn routes(&self, selector: Selector) -> Result<Address, RouterError>;
}

/// Operator sign-off before the first state-changing call
#[async_trait]
pub trait ConfirmationEffects: Send + Sync {
    /// Return `true` to proceed with `plan`
    async fn confirm(&self, plan: &RolloutPlan) -> bool;
}

/// Confirms every plan; for unattended runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl ConfirmationEffects for AutoConfirm {
    async fn confirm(&self, _plan: &RolloutPlan) -> bool {
        true
    }
}

/// Snapshot of router state read before acting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterStatus {
    /// Pending root, zero when none
    pub pending_root: Hash32,
    /// Pending epoch
    pub pending_epoch: u64,
    /// Active root
    pub active_root: Hash32,
    /// Active epoch
    pub active_epoch: u64,
    /// Emergency-halt flag
    pub frozen: bool,
}

impl RouterStatus {
    /// Read every status getter
    pub async fn read(router: &(impl RouterEffects + ?Sized)) -> Result<Self, RouterError> {
        Ok(Self {
            pending_root: router.pending_root().await?,
            pending_epoch: router.pending_epoch().await?,
            active_root: router.active_root().await?,
            active_epoch: router.active_epoch().await?,
            frozen: router.frozen().await?,
        })
    }

    /// Whether a root is pending
    pub fn has_pending(&self) -> bool {
        !self.pending_root.is_zero()
    }
}
