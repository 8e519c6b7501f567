//! In-memory router for rollout tests
//!
//! Models the router contract closely enough that the engine cannot tell the
//! difference: pending and active roots with epochs, the frozen flag,
//! codehash checks against a deployed-code registry, and per-route proof
//! verification against the pending root. A batch either applies completely
//! or reverts without touching state.
//!
//! Leaf and node hashes are recomputed here byte by byte, the way the contract
//! does, rather than through the manifest crate's proof code.
//!
//! Faults can be scheduled per method, either for the next calls or for a
//! specific call number, and every call is counted.

use async_trait::async_trait;
use facet_manifest::{keccak256, Address, Hash32, Selector, MAX_PROOF_DEPTH};
use facet_rollout::{RouterEffects, RouterError, TxReceipt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Gas charged per `commitRoot`
pub const COMMIT_GAS: u64 = 45_000;
/// Base gas charged per `applyRoutes`
pub const APPLY_BASE_GAS: u64 = 30_000;
/// Gas charged per route in `applyRoutes`
pub const APPLY_ROUTE_GAS: u64 = 25_000;
/// Gas charged per `activateCommittedRoot`
pub const ACTIVATE_GAS: u64 = 35_000;

/// Router methods that can be faulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RouterMethod {
    /// `commitRoot`
    CommitRoot,
    /// `applyRoutes`
    ApplyRoutes,
    /// `activateCommittedRoot`
    ActivateCommittedRoot,
    /// `routes(selector)`
    Routes,
}

/// Injected failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fail with a transient error before executing
    Transient,
    /// Fail as unreachable before executing
    Unavailable,
    /// Revert with `reason`
    Revert(String),
    /// Delay the call, then execute it normally
    Stall(Duration),
    /// Acknowledge the call without executing it
    Dropped,
}

/// Calls received, per method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `commitRoot` calls
    pub commit_root: u32,
    /// `applyRoutes` calls
    pub apply_routes: u32,
    /// `activateCommittedRoot` calls
    pub activate: u32,
    /// `routes` lookups
    pub routes: u32,
    /// Root, epoch and frozen getters
    pub status_reads: u32,
}

impl CallCounts {
    /// Calls that could change router state
    pub fn state_changing(&self) -> u32 {
        self.commit_root + self.apply_routes + self.activate
    }
}

#[derive(Debug, Default)]
struct RouterState {
    pending_root: Hash32,
    pending_epoch: u64,
    active_root: Hash32,
    active_epoch: u64,
    frozen: bool,
    routes: HashMap<Selector, Address>,
    deployed: HashMap<Address, Hash32>,
    overrides: HashMap<Selector, Address>,
    queued: HashMap<RouterMethod, VecDeque<Fault>>,
    scheduled: BTreeMap<(RouterMethod, u32), Fault>,
    calls: CallCounts,
    applied_batches: Vec<Vec<Selector>>,
    transactions: u64,
}

impl RouterState {
    /// Count the call and take the fault scheduled for it
    fn enter(&mut self, method: RouterMethod) -> Option<Fault> {
        let counter = match method {
            RouterMethod::CommitRoot => &mut self.calls.commit_root,
            RouterMethod::ApplyRoutes => &mut self.calls.apply_routes,
            RouterMethod::ActivateCommittedRoot => &mut self.calls.activate,
            RouterMethod::Routes => &mut self.calls.routes,
        };
        let index = *counter;
        *counter += 1;

        if let Some(fault) = self.scheduled.remove(&(method, index)) {
            return Some(fault);
        }
        self.queued.get_mut(&method).and_then(VecDeque::pop_front)
    }

    fn receipt(&mut self, gas_used: u64) -> TxReceipt {
        self.transactions += 1;
        TxReceipt {
            tx_hash: Hash32::new(keccak256(&self.transactions.to_be_bytes())),
            gas_used,
        }
    }
}

/// Router double backed by in-process state
#[derive(Debug, Clone, Default)]
pub struct InMemoryRouter {
    state: Arc<Mutex<RouterState>>,
}

impl InMemoryRouter {
    /// Empty router: nothing pending, nothing active, epoch 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Register code at `facet`
    pub fn deploy(&self, facet: Address, codehash: Hash32) {
        self.state.lock().deployed.insert(facet, codehash);
    }

    /// Engage or release the emergency halt
    pub fn set_frozen(&self, frozen: bool) {
        self.state.lock().frozen = frozen;
    }

    /// Make `root` pending under `epoch` without a `commitRoot` call
    pub fn set_pending(&self, root: Hash32, epoch: u64) {
        let mut state = self.state.lock();
        state.pending_root = root;
        state.pending_epoch = epoch;
    }

    /// Make `root` active under `epoch`
    pub fn set_active(&self, root: Hash32, epoch: u64) {
        let mut state = self.state.lock();
        state.active_root = root;
        state.active_epoch = epoch;
    }

    /// Report `facet` for `selector` regardless of what was applied
    pub fn override_route(&self, selector: Selector, facet: Address) {
        self.state.lock().overrides.insert(selector, facet);
    }

    /// Fail the next `count` calls to `method` with `fault`
    pub fn fail_next(&self, method: RouterMethod, count: usize, fault: Fault) {
        let mut state = self.state.lock();
        let queue = state.queued.entry(method).or_default();
        queue.extend(std::iter::repeat(fault).take(count));
    }

    /// Fail call number `call` (0-based) to `method` with `fault`
    pub fn fail_call(&self, method: RouterMethod, call: u32, fault: Fault) {
        self.state.lock().scheduled.insert((method, call), fault);
    }

    /// Calls received so far
    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }

    /// Selectors of each successfully applied batch, in order
    pub fn applied_batches(&self) -> Vec<Vec<Selector>> {
        self.state.lock().applied_batches.clone()
    }

    /// Installed route for `selector`, ignoring overrides
    pub fn installed_route(&self, selector: Selector) -> Option<Address> {
        self.state.lock().routes.get(&selector).copied()
    }

    /// Number of installed routes
    pub fn route_count(&self) -> usize {
        self.state.lock().routes.len()
    }

    /// Resolve the scheduled fault; `Ok(false)` means acknowledge without executing
    async fn enter(&self, method: RouterMethod) -> Result<bool, RouterError> {
        let fault = self.state.lock().enter(method);
        match fault {
            None => Ok(true),
            Some(Fault::Dropped) => Ok(false),
            Some(Fault::Transient) => {
                Err(RouterError::transient("replacement transaction underpriced"))
            }
            Some(Fault::Unavailable) => Err(RouterError::unavailable("connection refused")),
            Some(Fault::Revert(reason)) => Err(RouterError::reverted(reason)),
            Some(Fault::Stall(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(true)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&RouterState) -> T) -> T {
        let mut state = self.state.lock();
        state.calls.status_reads += 1;
        f(&state)
    }
}

#[async_trait]
impl RouterEffects for InMemoryRouter {
    async fn commit_root(&self, root: Hash32, epoch: u64) -> Result<TxReceipt, RouterError> {
        if !self.enter(RouterMethod::CommitRoot).await? {
            return Ok(self.state.lock().receipt(COMMIT_GAS));
        }
        let mut state = self.state.lock();
        if state.frozen {
            return Err(RouterError::reverted("router frozen"));
        }
        if epoch <= state.active_epoch {
            return Err(RouterError::reverted(format!(
                "stale epoch {epoch}, active {}",
                state.active_epoch
            )));
        }
        if root.is_zero() {
            return Err(RouterError::reverted("empty root"));
        }
        state.pending_root = root;
        state.pending_epoch = epoch;
        tracing::debug!(%root, epoch, "Root committed");
        Ok(state.receipt(COMMIT_GAS))
    }

    async fn pending_root(&self) -> Result<Hash32, RouterError> {
        Ok(self.read(|s| s.pending_root))
    }

    async fn pending_epoch(&self) -> Result<u64, RouterError> {
        Ok(self.read(|s| s.pending_epoch))
    }

    async fn active_root(&self) -> Result<Hash32, RouterError> {
        Ok(self.read(|s| s.active_root))
    }

    async fn active_epoch(&self) -> Result<u64, RouterError> {
        Ok(self.read(|s| s.active_epoch))
    }

    async fn apply_routes(
        &self,
        selectors: &[Selector],
        facets: &[Address],
        codehashes: &[Hash32],
        proofs: &[Vec<Hash32>],
        is_right: &[Vec<bool>],
    ) -> Result<TxReceipt, RouterError> {
        let execute = self.enter(RouterMethod::ApplyRoutes).await?;
        let mut state = self.state.lock();
        let n = selectors.len();
        if !execute {
            return Ok(state.receipt(APPLY_BASE_GAS + APPLY_ROUTE_GAS * n as u64));
        }
        if state.frozen {
            return Err(RouterError::reverted("router frozen"));
        }
        if state.pending_root.is_zero() {
            return Err(RouterError::reverted("no pending root"));
        }
        if facets.len() != n || codehashes.len() != n || proofs.len() != n || is_right.len() != n {
            return Err(RouterError::reverted("length mismatch"));
        }

        let root = state.pending_root;
        for i in 0..n {
            let facet = facets[i];
            match state.deployed.get(&facet) {
                Some(deployed) if *deployed == codehashes[i] => {}
                Some(_) => {
                    return Err(RouterError::reverted(format!("codehash mismatch for {facet}")))
                }
                None => return Err(RouterError::reverted(format!("no code at {facet}"))),
            }
            let leaf = leaf_hash(&selectors[i], &facet, &codehashes[i]);
            if replay(leaf, &proofs[i], &is_right[i]) != Some(root) {
                let selector = selectors[i];
                return Err(RouterError::reverted(format!("invalid proof for {selector}")));
            }
        }

        for (selector, facet) in selectors.iter().zip(facets) {
            state.routes.insert(*selector, *facet);
        }
        state.applied_batches.push(selectors.to_vec());
        Ok(state.receipt(APPLY_BASE_GAS + APPLY_ROUTE_GAS * n as u64))
    }

    async fn activate_committed_root(&self) -> Result<TxReceipt, RouterError> {
        if !self.enter(RouterMethod::ActivateCommittedRoot).await? {
            return Ok(self.state.lock().receipt(ACTIVATE_GAS));
        }
        let mut state = self.state.lock();
        if state.frozen {
            return Err(RouterError::reverted("router frozen"));
        }
        if state.pending_root.is_zero() {
            return Err(RouterError::reverted("no pending root"));
        }
        state.active_root = state.pending_root;
        state.active_epoch = state.pending_epoch;
        state.pending_root = Hash32::ZERO;
        state.pending_epoch = 0;
        Ok(state.receipt(ACTIVATE_GAS))
    }

    async fn frozen(&self) -> Result<bool, RouterError> {
        Ok(self.read(|s| s.frozen))
    }

    async fn routes(&self, selector: Selector) -> Result<Address, RouterError> {
        if !self.enter(RouterMethod::Routes).await? {
            return Ok(Address::ZERO);
        }
        let state = self.state.lock();
        let installed = state.routes.get(&selector);
        let facet = state.overrides.get(&selector).or(installed);
        Ok(facet.copied().unwrap_or(Address::ZERO))
    }
}

/// Leaf hash over `0x00 ‖ selector ‖ facet ‖ codehash`, as the contract packs it
fn leaf_hash(selector: &Selector, facet: &Address, codehash: &Hash32) -> Hash32 {
    let mut preimage = [0u8; 57];
    preimage[1..5].copy_from_slice(selector.as_bytes());
    preimage[5..25].copy_from_slice(facet.as_bytes());
    preimage[25..].copy_from_slice(codehash.as_bytes());
    Hash32::new(keccak256(&preimage))
}

/// Fold a sibling path into a root. A set bit means the running hash is the
/// right operand: `keccak(0x01 ‖ sibling ‖ running)`.
fn replay(leaf: Hash32, path: &[Hash32], bits: &[bool]) -> Option<Hash32> {
    if path.len() != bits.len() || path.len() > MAX_PROOF_DEPTH {
        return None;
    }
    let mut running = leaf;
    for (sibling, is_right) in path.iter().zip(bits) {
        let mut preimage = [0u8; 65];
        preimage[0] = 0x01;
        if *is_right {
            preimage[1..33].copy_from_slice(sibling.as_bytes());
            preimage[33..].copy_from_slice(running.as_bytes());
        } else {
            preimage[1..33].copy_from_slice(running.as_bytes());
            preimage[33..].copy_from_slice(sibling.as_bytes());
        }
        running = Hash32::new(keccak256(&preimage));
    }
    Some(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_manifest::{encode_leaf, Manifest, Route};

    fn route(i: u8) -> Route {
        let selector = Selector::new([i; 4]);
        Route::new(selector, Address::new([i; 20]), Hash32::new([i; 32]))
    }

    fn manifest() -> Manifest {
        let routes = (1..=3u8).map(route).collect();
        Manifest::build(routes, true).unwrap()
    }

    fn router_for(manifest: &Manifest) -> InMemoryRouter {
        let router = InMemoryRouter::new();
        for route in &manifest.routes {
            router.deploy(route.facet, route.codehash);
        }
        router
    }

    async fn apply_all(
        router: &InMemoryRouter,
        manifest: &Manifest,
    ) -> Result<TxReceipt, RouterError> {
        let proofs = manifest.proofs.as_ref().unwrap();
        let selectors: Vec<_> = manifest.routes.iter().map(|r| r.selector).collect();
        let facets: Vec<_> = manifest.routes.iter().map(|r| r.facet).collect();
        let codehashes: Vec<_> = manifest.routes.iter().map(|r| r.codehash).collect();
        let paths: Vec<_> = selectors.iter().map(|s| proofs[s].proof.clone()).collect();
        let bits: Vec<_> = selectors
            .iter()
            .map(|s| proofs[s].is_right.clone())
            .collect();
        router
            .apply_routes(&selectors, &facets, &codehashes, &paths, &bits)
            .await
    }

    #[tokio::test]
    async fn test_commit_apply_activate() {
        let manifest = manifest();
        let router = router_for(&manifest);
        router.commit_root(manifest.merkle_root, 1).await.unwrap();
        let receipt = apply_all(&router, &manifest).await.unwrap();
        assert_eq!(receipt.gas_used, APPLY_BASE_GAS + 3 * APPLY_ROUTE_GAS);
        router.activate_committed_root().await.unwrap();

        assert_eq!(router.active_root().await.unwrap(), manifest.merkle_root);
        assert_eq!(router.active_epoch().await.unwrap(), 1);
        assert!(router.pending_root().await.unwrap().is_zero());
        assert_eq!(
            router.routes(Selector::new([2; 4])).await.unwrap(),
            Address::new([2; 20])
        );
        assert_eq!(router.calls().state_changing(), 3);
    }

    #[tokio::test]
    async fn test_batch_reverts_atomically_on_bad_proof() {
        let manifest = manifest();
        let router = router_for(&manifest);
        router.set_pending(Hash32::new([0xee; 32]), 1);
        assert!(matches!(
            apply_all(&router, &manifest).await,
            Err(RouterError::Reverted { .. })
        ));
        assert_eq!(router.route_count(), 0);
    }

    #[test]
    fn test_leaf_hash_matches_manifest_codec() {
        let selector = Selector::new([1; 4]);
        let facet = Address::new([1; 20]);
        let codehash = Hash32::new([2; 32]);
        assert_eq!(
            leaf_hash(&selector, &facet, &codehash),
            encode_leaf(&selector, &facet, &codehash)
        );
    }

    #[tokio::test]
    async fn test_set_bit_puts_running_hash_on_the_right() {
        let selector = Selector::new([7; 4]);
        let facet = Address::new([7; 20]);
        let codehash = Hash32::new([7; 32]);
        let sibling = Hash32::new([0x33; 32]);
        let leaf = leaf_hash(&selector, &facet, &codehash);

        let mut preimage = vec![0x01];
        preimage.extend_from_slice(sibling.as_bytes());
        preimage.extend_from_slice(leaf.as_bytes());
        let root = Hash32::new(keccak256(&preimage));

        let router = InMemoryRouter::new();
        router.deploy(facet, codehash);
        router.set_pending(root, 1);
        let paths = [vec![sibling]];

        let rejected = router
            .apply_routes(&[selector], &[facet], &[codehash], &paths, &[vec![false]])
            .await;
        assert_eq!(
            rejected,
            Err(RouterError::reverted(format!("invalid proof for {selector}")))
        );
        assert_eq!(router.route_count(), 0);

        let accepted = router
            .apply_routes(&[selector], &[facet], &[codehash], &paths, &[vec![true]])
            .await;
        assert!(accepted.is_ok());
        assert_eq!(router.installed_route(selector), Some(facet));
    }

    #[tokio::test]
    async fn test_proof_over_depth_cap_reverts() {
        let selector = Selector::new([5; 4]);
        let facet = Address::new([5; 20]);
        let router = InMemoryRouter::new();
        router.deploy(facet, Hash32::ZERO);
        router.set_pending(Hash32::new([1; 32]), 1);
        let paths = [vec![Hash32::ZERO; MAX_PROOF_DEPTH + 1]];
        let bits = [vec![false; MAX_PROOF_DEPTH + 1]];

        let outcome = router
            .apply_routes(&[selector], &[facet], &[Hash32::ZERO], &paths, &bits)
            .await;
        assert!(matches!(outcome, Err(RouterError::Reverted { .. })));
    }

    #[tokio::test]
    async fn test_codehash_must_match_deployment() {
        let manifest = manifest();
        let router = router_for(&manifest);
        router.deploy(Address::new([3; 20]), Hash32::new([0x99; 32]));
        router.commit_root(manifest.merkle_root, 1).await.unwrap();
        assert!(apply_all(&router, &manifest).await.is_err());
        assert_eq!(router.route_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_epoch_and_frozen_rejected() {
        let router = InMemoryRouter::new();
        router.set_active(Hash32::new([1; 32]), 5);
        assert!(router.commit_root(Hash32::new([2; 32]), 5).await.is_err());
        router.set_frozen(true);
        assert!(router.commit_root(Hash32::new([2; 32]), 6).await.is_err());
    }

    #[tokio::test]
    async fn test_scheduled_faults() {
        let router = InMemoryRouter::new();
        let root = Hash32::new([1; 32]);
        router.fail_call(RouterMethod::CommitRoot, 1, Fault::Transient);
        router.fail_next(RouterMethod::CommitRoot, 1, Fault::Revert("nope".into()));

        assert_eq!(
            router.commit_root(root, 1).await,
            Err(RouterError::reverted("nope"))
        );
        let err = router.commit_root(root, 1).await.unwrap_err();
        assert!(err.is_transient());
        assert!(router.commit_root(root, 1).await.is_ok());
        assert_eq!(router.calls().commit_root, 3);
    }

    #[tokio::test]
    async fn test_dropped_commit_is_acknowledged_but_not_recorded() {
        let router = InMemoryRouter::new();
        router.fail_next(RouterMethod::CommitRoot, 1, Fault::Dropped);

        let receipt = router.commit_root(Hash32::new([1; 32]), 1).await.unwrap();
        assert_eq!(receipt.gas_used, COMMIT_GAS);
        assert!(router.pending_root().await.unwrap().is_zero());
        assert_eq!(router.pending_epoch().await.unwrap(), 0);
        assert_eq!(router.calls().commit_root, 1);
    }

    #[tokio::test]
    async fn test_override_wins_over_installed_route() {
        let router = InMemoryRouter::new();
        router.override_route(Selector::new([1; 4]), Address::new([9; 20]));
        assert_eq!(
            router.routes(Selector::new([1; 4])).await.unwrap(),
            Address::new([9; 20])
        );
        assert_eq!(router.installed_route(Selector::new([1; 4])), None);
    }
}
