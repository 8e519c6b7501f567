//! Route manifest artifact
//!
//! A manifest lists the desired selector → facet routes, the Merkle root
//! committing to them, and optionally one inclusion proof per selector. It is
//! generated offline, persisted as JSON and treated as immutable once its root
//! has been committed on-chain.
//!
//! ```json
//! {
//!   "routes": [{ "selector": "0x...", "facet": "0x...", "codehash": "0x..." }],
//!   "merkleRoot": "0x...",
//!   "proofs": { "0x<selector>": { "proof": ["0x..."], "isRight": [false] } }
//! }
//! ```

use crate::errors::{ConfigurationError, Result};
use crate::leaf::encode_leaf;
use crate::proof::MerkleProof;
use crate::tree::MerkleTree;
use crate::types::{Address, Hash32, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One selector → facet route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Function selector being routed
    pub selector: Selector,
    /// Facet that will serve the selector
    pub facet: Address,
    /// Expected hash of the facet's deployed code
    pub codehash: Hash32,
}

impl Route {
    /// Create a route
    pub fn new(selector: Selector, facet: Address, codehash: Hash32) -> Self {
        Self {
            selector,
            facet,
            codehash,
        }
    }

    /// Leaf hash committing to this route
    pub fn leaf(&self) -> Hash32 {
        encode_leaf(&self.selector, &self.facet, &self.codehash)
    }
}

/// Proofs keyed by selector
pub type ProofMap = BTreeMap<Selector, MerkleProof>;

/// Persisted route manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Routes in application order
    pub routes: Vec<Route>,
    /// Root committing to every route
    pub merkle_root: Hash32,
    /// Optional per-selector proofs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proofs: Option<ProofMap>,
}

impl Manifest {
    /// Build a manifest from routes, computing the root and optionally every proof.
    ///
    /// Routes keep the order given; only the tree's leaf level is sorted.
    pub fn build(
        routes: Vec<Route>,
        attach_proofs: bool,
    ) -> std::result::Result<Self, ConfigurationError> {
        ensure_unique_selectors(&routes)?;

        let tree = MerkleTree::build(routes.iter().map(Route::leaf));
        let proofs = if attach_proofs {
            let mut map = ProofMap::new();
            for route in &routes {
                let proof = tree.proof_for(&route.leaf()).ok_or_else(|| {
                    ConfigurationError::malformed(format!(
                        "no leaf for selector {} in freshly built tree",
                        route.selector
                    ))
                })?;
                map.insert(route.selector, proof);
            }
            Some(map)
        } else {
            None
        };

        tracing::debug!(
            routes = routes.len(),
            root = %tree.root(),
            with_proofs = attach_proofs,
            "Built route manifest"
        );

        Ok(Self {
            routes,
            merkle_root: tree.root(),
            proofs,
        })
    }

    /// Whether the manifest routes nothing
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Whether per-route proofs are attached
    pub fn has_proofs(&self) -> bool {
        self.proofs.is_some()
    }

    /// Proof carried for `selector`, if any
    pub fn proof(&self, selector: &Selector) -> Option<&MerkleProof> {
        self.proofs.as_ref().and_then(|proofs| proofs.get(selector))
    }

    /// Distinct facet addresses referenced by the routes
    pub fn facets(&self) -> Vec<Address> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .map(|route| route.facet)
            .filter(|facet| seen.insert(*facet))
            .collect()
    }

    /// Parse a manifest from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the manifest as pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a manifest file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Write the manifest to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json_pretty()?)?;
        Ok(())
    }
}

/// Reject a route list that routes any selector twice
pub fn ensure_unique_selectors(routes: &[Route]) -> std::result::Result<(), ConfigurationError> {
    let mut seen = HashSet::with_capacity(routes.len());
    for route in routes {
        if !seen.insert(route.selector) {
            return Err(ConfigurationError::DuplicateSelector {
                selector: route.selector,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(selector: u8, facet: u8) -> Route {
        Route::new(
            Selector::new([selector; 4]),
            Address::new([facet; 20]),
            Hash32::new([facet.wrapping_add(100); 32]),
        )
    }

    #[test]
    fn test_build_attaches_proofs_for_every_route() {
        let routes = vec![route(1, 10), route(2, 10), route(3, 20)];
        let manifest = Manifest::build(routes, true).unwrap();
        let proofs = manifest.proofs.as_ref().unwrap();
        assert_eq!(proofs.len(), 3);
        for r in &manifest.routes {
            assert!(proofs[&r.selector].verify(&r.leaf(), &manifest.merkle_root));
        }
        assert_eq!(manifest.facets().len(), 2);
    }

    #[test]
    fn test_build_rejects_duplicate_selector() {
        let err = Manifest::build(vec![route(1, 10), route(1, 20)], false).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateSelector {
                selector: Selector::new([1; 4])
            }
        );
    }

    #[test]
    fn test_json_shape() {
        let manifest = Manifest::build(vec![route(1, 10), route(2, 20)], true).unwrap();
        let text = manifest.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(value["merkleRoot"].as_str().unwrap().starts_with("0x"));
        assert_eq!(value["routes"][0]["selector"], "0x01010101");
        assert!(value["proofs"]["0x02020202"]["isRight"].is_array());

        let bare = Manifest::build(vec![route(1, 10)], false).unwrap();
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("proofs").is_none());
    }

    #[test]
    fn test_from_json_rejects_short_fields() {
        let json = r#"{
            "routes": [{"selector": "0x0101", "facet": "0x00", "codehash": "0x00"}],
            "merkleRoot": "0x00"
        }"#;
        assert!(Manifest::from_json(json).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let routes = vec![route(1, 10), route(2, 20), route(3, 30)];
        let manifest = Manifest::build(routes, true).unwrap();
        manifest.save(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), manifest);
    }
}
