//! Facet Manifest: committed selector routing tables
//!
//! This crate holds everything that can be computed offline about a route
//! rollout, with no knowledge of the router it will be applied to:
//!
//! - **Address prediction**: CREATE2 salts and addresses for facet deployments
//! - **Leaf codec**: canonical `0x00`-prefixed leaf hashes for routes
//! - **Merkle tree**: sorted-leaf, ordered-pair tree with duplicate-last padding
//! - **Proofs**: sibling paths with position bits, and their replay
//! - **Manifest**: the JSON artifact and its independent validator
//!
//! All hashing is Keccak-256 so that every root and proof can be replayed
//! bit-for-bit by the on-chain verifier.
//!
//! ```
//! use facet_manifest::{Address, Hash32, Manifest, ManifestValidator, Route, Selector};
//!
//! let routes = vec![
//!     Route::new(Selector::from_signature("owner()"), Address::new([1; 20]), Hash32::ZERO),
//!     Route::new(Selector::from_signature("facets()"), Address::new([3; 20]), Hash32::ZERO),
//! ];
//! let manifest = Manifest::build(routes, true)?;
//! let validated = ManifestValidator::strict().validate(&manifest)?;
//! assert_eq!(validated.root(), manifest.merkle_root);
//! # Ok::<(), facet_manifest::ManifestError>(())
//! ```

pub mod address;
pub mod errors;
pub mod hash;
pub mod leaf;
pub mod manifest;
pub mod proof;
pub mod tree;
pub mod types;
pub mod validator;

pub use address::{
    compute_salt, compute_salt_with_domain, init_code_hash, predict_address, AddressPredictor,
    FacetDeployment, DEFAULT_SALT_DOMAIN,
};
pub use errors::{ConfigurationError, ManifestError, Result, ValidationError};
pub use hash::keccak256;
pub use leaf::{encode_leaf, hash_node, LEAF_DOMAIN, NODE_DOMAIN};
pub use manifest::{Manifest, ProofMap, Route};
pub use proof::{generate_proof, verify_proof, MerkleProof, ProofShapeError, MAX_PROOF_DEPTH};
pub use tree::{MerkleTree, EMPTY_ROOT};
pub use types::{Address, Hash32, ParseBytesError, Selector};
pub use validator::{
    validate_manifest, ManifestValidator, ProofSource, ValidatedManifest, ValidatedRoute,
    ValidationWarning,
};
