//! Per-leaf inclusion proofs
//!
//! A proof is the list of sibling hashes from a leaf up to the root together
//! with one position bit per level.
//!
//! `is_right[k]` is `true` when the running hash occupies the RIGHT operand at
//! level `k`, i.e. its index at that level is odd. Replay then computes
//! `hash_node(sibling, current)`; otherwise `hash_node(current, sibling)`.
//! When the running hash is the unpaired last node of an odd level its index
//! is even, the bit is `false` and the sibling is the node itself.

use crate::leaf::hash_node;
use crate::types::Hash32;
use serde::{Deserialize, Serialize};

/// Deepest proof accepted (trees of up to 2^32 leaves)
pub const MAX_PROOF_DEPTH: usize = 32;

/// Sibling path plus position bits for one leaf
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// Sibling hashes from the leaf level upwards
    pub proof: Vec<Hash32>,
    /// Whether the running hash is the right operand at each level
    pub is_right: Vec<bool>,
}

/// Structural problems that make a proof unreplayable
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProofShapeError {
    /// Sibling list and position bits differ in length
    #[error("proof has {proof_len} siblings but {is_right_len} position bits")]
    LengthMismatch {
        /// Number of siblings
        proof_len: usize,
        /// Number of position bits
        is_right_len: usize,
    },

    /// Proof is deeper than [`MAX_PROOF_DEPTH`]
    #[error("proof depth {depth} exceeds maximum {max}")]
    TooDeep {
        /// Supplied depth
        depth: usize,
        /// Maximum depth
        max: usize,
    },
}

impl MerkleProof {
    /// Create a proof from its two lists
    pub fn new(proof: Vec<Hash32>, is_right: Vec<bool>) -> Self {
        Self { proof, is_right }
    }

    /// Number of levels the proof climbs
    pub fn depth(&self) -> usize {
        self.proof.len()
    }

    /// Check structural invariants before replay
    pub fn check_shape(&self) -> Result<(), ProofShapeError> {
        if self.proof.len() != self.is_right.len() {
            return Err(ProofShapeError::LengthMismatch {
                proof_len: self.proof.len(),
                is_right_len: self.is_right.len(),
            });
        }
        if self.proof.len() > MAX_PROOF_DEPTH {
            return Err(ProofShapeError::TooDeep {
                depth: self.proof.len(),
                max: MAX_PROOF_DEPTH,
            });
        }
        Ok(())
    }

    /// Replay `leaf` through the proof and return the root it leads to
    pub fn compute_root(&self, leaf: &Hash32) -> Result<Hash32, ProofShapeError> {
        self.check_shape()?;
        let root = self
            .proof
            .iter()
            .zip(&self.is_right)
            .fold(*leaf, |current, (sibling, is_right)| {
                if *is_right {
                    hash_node(sibling, &current)
                } else {
                    hash_node(&current, sibling)
                }
            });
        Ok(root)
    }

    /// Whether replaying `leaf` reproduces `root` exactly
    pub fn verify(&self, leaf: &Hash32, root: &Hash32) -> bool {
        matches!(self.compute_root(leaf), Ok(computed) if computed == *root)
    }
}

/// Cut the proof for sorted leaf `leaf_index` from retained tree levels.
///
/// Returns `None` for an empty tree or an out-of-range index.
pub fn generate_proof(levels: &[Vec<Hash32>], leaf_index: usize) -> Option<MerkleProof> {
    let leaf_count = levels.first()?.len();
    if leaf_index >= leaf_count {
        return None;
    }

    let depth = levels.len() - 1;
    let mut proof = Vec::with_capacity(depth);
    let mut is_right = Vec::with_capacity(depth);
    let mut index = leaf_index;

    for level in &levels[..depth] {
        let right = index % 2 == 1;
        let sibling = if right {
            index - 1
        } else if index + 1 < level.len() {
            index + 1
        } else {
            // unpaired last node is hashed with itself
            index
        };
        proof.push(level[sibling]);
        is_right.push(right);
        index /= 2;
    }

    Some(MerkleProof { proof, is_right })
}

/// Replay `proof` from `leaf` and compare with `root`
pub fn verify_proof(leaf: &Hash32, proof: &MerkleProof, root: &Hash32) -> bool {
    proof.verify(leaf, root)
}
