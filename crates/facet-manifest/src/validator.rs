//! Independent self-check of a manifest before anything touches the chain
//!
//! The validator never trusts derived data carried by the artifact. Leaves are
//! recomputed from the raw route tuples, the tree is rebuilt, and the root is
//! compared with the committed one. A root mismatch stops validation at once:
//! no proof is looked at and no [`ValidatedManifest`] is produced.
//!
//! Carried proofs are replayed one by one against the recomputed root. A
//! manifest without proofs is accepted with a [`ValidationWarning::ProofsAbsent`]
//! warning (proofs may be attached later); proofs are then cut from the rebuilt
//! tree. [`ManifestValidator::strict`] turns the warning into an error.

use crate::errors::{ConfigurationError, ManifestError, ValidationError};
use crate::manifest::{ensure_unique_selectors, Manifest, Route};
use crate::proof::{MerkleProof, ProofShapeError};
use crate::tree::MerkleTree;
use crate::types::{Hash32, Selector};
use std::fmt;

/// Route with its recomputed leaf and a proof that replays to the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRoute {
    /// The route as listed in the manifest
    pub route: Route,
    /// Recomputed leaf hash
    pub leaf: Hash32,
    /// Proof verified against the root
    pub proof: MerkleProof,
}

/// Where the proofs of a validated manifest came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofSource {
    /// Carried by the manifest and independently replayed
    Manifest,
    /// Cut from the rebuilt tree because the manifest carried none
    Generated,
}

/// Non-fatal findings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// The manifest carried no proofs
    ProofsAbsent,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProofsAbsent => write!(
                f,
                "manifest carries no proofs; root verified, proofs generated locally"
            ),
        }
    }
}

/// A manifest whose root and proofs have been recomputed and matched
///
/// Only obtainable from [`ManifestValidator::validate`].
#[derive(Debug, Clone)]
pub struct ValidatedManifest {
    root: Hash32,
    tree: MerkleTree,
    routes: Vec<ValidatedRoute>,
    proof_source: ProofSource,
    warnings: Vec<ValidationWarning>,
}

impl ValidatedManifest {
    /// Verified Merkle root
    pub fn root(&self) -> Hash32 {
        self.root
    }

    /// Rebuilt tree
    pub fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    /// Routes in manifest order
    pub fn routes(&self) -> &[ValidatedRoute] {
        &self.routes
    }

    /// Number of routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are present
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Origin of the proofs
    pub fn proof_source(&self) -> ProofSource {
        self.proof_source
    }

    /// Non-fatal findings
    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }
}

/// Recomputes and checks manifests
#[derive(Debug, Clone, Default)]
pub struct ManifestValidator {
    require_proofs: bool,
}

impl ManifestValidator {
    /// Validator that accepts manifests without proofs (with a warning)
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that rejects manifests without proofs
    pub fn strict() -> Self {
        Self {
            require_proofs: true,
        }
    }

    /// Validate `manifest`, failing on the first discrepancy
    pub fn validate(&self, manifest: &Manifest) -> Result<ValidatedManifest, ManifestError> {
        check_structure(manifest)?;
        if self.require_proofs && manifest.proofs.is_none() && !manifest.is_empty() {
            return Err(ConfigurationError::malformed("proofs are required but absent").into());
        }

        let leaves: Vec<Hash32> = manifest.routes.iter().map(Route::leaf).collect();
        let tree = MerkleTree::build(leaves.iter().copied());
        let computed = tree.root();
        if computed != manifest.merkle_root {
            tracing::error!(
                expected = %manifest.merkle_root,
                computed = %computed,
                "Manifest root does not match recomputed root"
            );
            return Err(ValidationError::RootMismatch {
                expected: manifest.merkle_root,
                computed,
            }
            .into());
        }

        let mut warnings = Vec::new();
        let proof_source = match manifest.proofs {
            Some(_) => ProofSource::Manifest,
            None => {
                if !manifest.is_empty() {
                    tracing::warn!(
                        root = %computed,
                        "Manifest carries no proofs; generating them from the rebuilt tree"
                    );
                    warnings.push(ValidationWarning::ProofsAbsent);
                }
                ProofSource::Generated
            }
        };

        let mut routes = Vec::with_capacity(manifest.routes.len());
        for (route, leaf) in manifest.routes.iter().zip(leaves) {
            let proof = match manifest.proof(&route.selector) {
                Some(carried) => {
                    if !carried.verify(&leaf, &computed) {
                        tracing::error!(
                            selector = %route.selector,
                            root = %computed,
                            "Carried proof does not replay to the root"
                        );
                        return Err(ValidationError::ProofMismatch {
                            selector: route.selector,
                            root: computed,
                        }
                        .into());
                    }
                    carried.clone()
                }
                None => tree.proof_for(&leaf).ok_or_else(|| {
                    ConfigurationError::malformed(format!(
                        "leaf for selector {} missing from rebuilt tree",
                        route.selector
                    ))
                })?,
            };
            routes.push(ValidatedRoute {
                route: *route,
                leaf,
                proof,
            });
        }

        tracing::info!(
            root = %computed,
            routes = routes.len(),
            proof_source = ?proof_source,
            "Manifest validated"
        );

        Ok(ValidatedManifest {
            root: computed,
            tree,
            routes,
            proof_source,
            warnings,
        })
    }
}

/// Validate with the default (lenient on absent proofs) validator
pub fn validate_manifest(manifest: &Manifest) -> Result<ValidatedManifest, ManifestError> {
    ManifestValidator::new().validate(manifest)
}

fn check_structure(manifest: &Manifest) -> Result<(), ConfigurationError> {
    ensure_unique_selectors(&manifest.routes)?;

    let Some(proofs) = &manifest.proofs else {
        return Ok(());
    };

    if proofs.len() != manifest.routes.len() {
        return Err(ConfigurationError::ProofCountMismatch {
            routes: manifest.routes.len(),
            proofs: proofs.len(),
        });
    }

    let routed: std::collections::HashSet<Selector> =
        manifest.routes.iter().map(|route| route.selector).collect();
    for (selector, proof) in proofs {
        if !routed.contains(selector) {
            return Err(ConfigurationError::UnknownProofSelector {
                selector: *selector,
            });
        }
        proof.check_shape().map_err(|err| match err {
            ProofShapeError::LengthMismatch {
                proof_len,
                is_right_len,
            } => ConfigurationError::ProofShapeMismatch {
                selector: *selector,
                proof_len,
                is_right_len,
            },
            ProofShapeError::TooDeep { depth, max } => ConfigurationError::ProofTooDeep {
                selector: *selector,
                depth,
                max,
            },
        })?;
    }

    Ok(())
}
