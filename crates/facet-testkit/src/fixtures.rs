//! Manifests, deployments and operator doubles for rollout tests

use async_trait::async_trait;
use facet_manifest::{Address, Hash32, Manifest, Route, Selector};
use facet_rollout::{ConfirmationEffects, RolloutPlan};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::router::InMemoryRouter;

/// Facet address derived from a small id
pub fn facet(id: u8) -> Address {
    Address::new([id; 20])
}

/// Codehash of the facet with the given id
pub fn codehash(id: u8) -> Hash32 {
    Hash32::new([id.wrapping_add(0x80); 32])
}

/// Route from a function signature to a facet id
pub fn route(signature: &str, facet_id: u8) -> Route {
    Route::new(
        Selector::from_signature(signature),
        facet(facet_id),
        codehash(facet_id),
    )
}

/// `count` routes spread round-robin over `facets` facets
pub fn sample_routes(count: usize, facets: u8) -> Vec<Route> {
    let facets = facets.max(1);
    (0..count)
        .map(|i| {
            let facet_id = u8::try_from(i % usize::from(facets)).unwrap_or(0) + 1;
            route(&format!("call{i}(uint256)"), facet_id)
        })
        .collect()
}

/// Manifest over `routes` with proofs attached
pub fn manifest_with_proofs(routes: Vec<Route>) -> Manifest {
    match Manifest::build(routes, true) {
        Ok(manifest) => manifest,
        Err(err) => panic!("fixture routes must be unique: {err}"),
    }
}

/// Four routes over two facets
pub fn diamond_manifest() -> Manifest {
    manifest_with_proofs(vec![
        route("transfer(address,uint256)", 1),
        route("balanceOf(address)", 1),
        route("owner()", 2),
        route("transferOwnership(address)", 2),
    ])
}

/// Register every facet of `manifest` with its codehash
pub fn deploy_manifest(router: &InMemoryRouter, manifest: &Manifest) {
    for route in &manifest.routes {
        router.deploy(route.facet, route.codehash);
    }
}

/// Operator double answering with a fixed decision
#[derive(Debug, Default)]
pub struct ScriptedConfirmation {
    approve: bool,
    asked: AtomicU32,
}

impl ScriptedConfirmation {
    /// Always approve
    pub fn approve() -> Self {
        Self {
            approve: true,
            asked: AtomicU32::new(0),
        }
    }

    /// Always decline
    pub fn decline() -> Self {
        Self::default()
    }

    /// Times the operator was asked
    pub fn asked(&self) -> u32 {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfirmationEffects for ScriptedConfirmation {
    async fn confirm(&self, plan: &RolloutPlan) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            routes = plan.total_routes,
            batches = plan.batches.len(),
            approve = self.approve,
            "Scripted confirmation"
        );
        self.approve
    }
}
