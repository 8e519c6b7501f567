//! Partitioning validated routes into `applyRoutes` batches
//!
//! Batches preserve manifest order: batch `k` holds routes
//! `k * size .. (k + 1) * size`. Each batch carries the exact parallel arrays
//! submitted to the router so a failed batch can be replayed by hand.

use crate::config::MAX_BATCH_SIZE;
use facet_manifest::{Address, Hash32, Selector, ValidatedManifest, ValidatedRoute};
use serde::{Deserialize, Serialize};

/// Arguments of one `applyRoutes` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBatch {
    /// Zero-based position in the plan
    pub index: usize,
    /// Selectors to route
    pub selectors: Vec<Selector>,
    /// Facet for each selector
    pub facets: Vec<Address>,
    /// Expected codehash for each facet
    pub codehashes: Vec<Hash32>,
    /// Sibling path for each route
    pub proofs: Vec<Vec<Hash32>>,
    /// Position bits for each route
    pub is_right: Vec<Vec<bool>>,
}

impl RouteBatch {
    /// Assemble the call arguments for `routes`
    pub fn from_routes(index: usize, routes: &[ValidatedRoute]) -> Self {
        let mut batch = Self {
            index,
            selectors: Vec::with_capacity(routes.len()),
            facets: Vec::with_capacity(routes.len()),
            codehashes: Vec::with_capacity(routes.len()),
            proofs: Vec::with_capacity(routes.len()),
            is_right: Vec::with_capacity(routes.len()),
        };
        for validated in routes {
            batch.selectors.push(validated.route.selector);
            batch.facets.push(validated.route.facet);
            batch.codehashes.push(validated.route.codehash);
            batch.proofs.push(validated.proof.proof.clone());
            batch.is_right.push(validated.proof.is_right.clone());
        }
        batch
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// Split routes into batches of at most `batch_size` (clamped to `1..=MAX_BATCH_SIZE`)
pub fn partition(routes: &[ValidatedRoute], batch_size: usize) -> Vec<RouteBatch> {
    let size = batch_size.clamp(1, MAX_BATCH_SIZE);
    routes
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| RouteBatch::from_routes(index, chunk))
        .collect()
}

/// Everything a run is about to submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutPlan {
    /// Root the routes are verified against
    pub root: Hash32,
    /// Epoch to commit, when the run commits
    pub epoch: Option<u64>,
    /// Total routes
    pub total_routes: usize,
    /// Batches in submission order
    pub batches: Vec<RouteBatch>,
    /// Whether state-changing calls will be skipped
    pub dry_run: bool,
}

impl RolloutPlan {
    /// Plan the submission of `manifest`
    pub fn new(
        manifest: &ValidatedManifest,
        epoch: Option<u64>,
        batch_size: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            root: manifest.root(),
            epoch,
            total_routes: manifest.len(),
            batches: partition(manifest.routes(), batch_size),
            dry_run,
        }
    }

    /// Sizes of the batches in order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(RouteBatch::len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_manifest::{Manifest, ManifestValidator, Route};

    fn route(i: u8) -> Route {
        Route::new(Selector::new([i; 4]), Address::new([1; 20]), Hash32::ZERO)
    }

    fn validated(n: u8) -> ValidatedManifest {
        let routes = (0..n).map(route).collect();
        let manifest = Manifest::build(routes, true).unwrap();
        ManifestValidator::strict().validate(&manifest).unwrap()
    }

    #[test]
    fn test_partition_sizes() {
        let manifest = validated(5);
        let plan = RolloutPlan::new(&manifest, Some(1), 2, false);
        assert_eq!(plan.batch_sizes(), vec![2, 2, 1]);
        assert_eq!(plan.total_routes, 5);
        assert_eq!(
            plan.batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_partition_preserves_manifest_order() {
        let manifest = validated(7);
        let batches = partition(manifest.routes(), 3);
        let flattened: Vec<Selector> = batches.iter().flat_map(|b| b.selectors.clone()).collect();
        let expected: Vec<Selector> = manifest.routes().iter().map(|r| r.route.selector).collect();
        assert_eq!(flattened, expected);
    }

    #[test]
    fn test_batch_arrays_are_parallel() {
        let manifest = validated(4);
        let batch = &partition(manifest.routes(), 10)[0];
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.facets.len(), 4);
        assert_eq!(batch.codehashes.len(), 4);
        assert_eq!(batch.proofs.len(), 4);
        assert_eq!(batch.is_right.len(), 4);
        for (proof, bits) in batch.proofs.iter().zip(&batch.is_right) {
            assert_eq!(proof.len(), bits.len());
        }
    }

    #[test]
    fn test_batch_size_is_clamped() {
        let manifest = validated(3);
        assert_eq!(partition(manifest.routes(), 0).len(), 3);
        assert_eq!(partition(&[], 10).len(), 0);
    }
}
