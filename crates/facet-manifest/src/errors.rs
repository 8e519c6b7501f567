//! Error types for manifest construction and validation
//!
//! Two fatal families are kept apart so callers can tell a badly formed input
//! (`ConfigurationError`) from a cryptographic disagreement
//! (`ValidationError`). Neither is ever retried.

use crate::types::{Address, Hash32, Selector};

/// Fatal configuration problem: the inputs are wrong, retrying cannot help
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A deployed address differs from the one predicted for it
    #[error("predicted address {predicted} for '{name}' but found {actual}")]
    AddressMismatch {
        /// Deployment name
        name: String,
        /// Address derived from factory, salt and init code hash
        predicted: Address,
        /// Address observed after deployment
        actual: Address,
    },

    /// The same selector is routed twice
    #[error("duplicate selector {selector} in manifest")]
    DuplicateSelector {
        /// Offending selector
        selector: Selector,
    },

    /// Proof map does not cover exactly the routed selectors
    #[error("manifest has {routes} routes but {proofs} proof entries")]
    ProofCountMismatch {
        /// Number of routes
        routes: usize,
        /// Number of proof entries
        proofs: usize,
    },

    /// Proof supplied for a selector that is not routed
    #[error("proof supplied for unrouted selector {selector}")]
    UnknownProofSelector {
        /// Offending selector
        selector: Selector,
    },

    /// Sibling list and position bits differ in length
    #[error("proof for {selector} has {proof_len} siblings but {is_right_len} position bits")]
    ProofShapeMismatch {
        /// Selector the proof belongs to
        selector: Selector,
        /// Number of sibling hashes
        proof_len: usize,
        /// Number of position bits
        is_right_len: usize,
    },

    /// Proof is longer than any supported tree is deep
    #[error("proof for {selector} has depth {depth}, maximum is {max}")]
    ProofTooDeep {
        /// Selector the proof belongs to
        selector: Selector,
        /// Supplied depth
        depth: usize,
        /// Maximum supported depth
        max: usize,
    },

    /// Anything else structurally wrong with a manifest
    #[error("malformed manifest: {message}")]
    MalformedManifest {
        /// Description of the problem
        message: String,
    },
}

impl ConfigurationError {
    /// Create a malformed manifest error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            message: message.into(),
        }
    }
}

/// Fatal cryptographic disagreement between a manifest and its recomputation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Root recomputed from the raw routes differs from the committed root
    #[error("merkle root mismatch: manifest commits to {expected}, routes hash to {computed}")]
    RootMismatch {
        /// Root carried by the manifest
        expected: Hash32,
        /// Root recomputed from the routes
        computed: Hash32,
    },

    /// A carried proof does not replay to the root
    #[error("proof for selector {selector} does not reproduce root {root}")]
    ProofMismatch {
        /// Selector whose proof failed
        selector: Selector,
        /// Root the proof was replayed against
        root: Hash32,
    },
}

/// Any failure while building, loading or validating a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Inputs are structurally wrong
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Cryptographic recomputation disagrees
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Reading or writing the artifact failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message describing the I/O failure
        message: String,
    },
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ManifestError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;
