//! Ordered-pair Merkle tree over route leaves
//!
//! Construction rules, all of which the on-chain replay depends on:
//!
//! - Leaves are sorted ascending by byte value, so the root does not depend on
//!   the order routes were listed in. Only the leaf level is sorted; above it
//!   nodes keep their positions.
//! - Adjacent pairs are combined with [`hash_node`]`(left, right)`.
//! - When a level has an odd number of nodes the last one is paired with
//!   itself: `hash_node(x, x)`. It is not promoted unchanged.
//! - No leaves gives [`EMPTY_ROOT`]. A single leaf is its own root, with no
//!   extra hashing and an empty proof.
//!
//! Every level is retained so proofs can be cut without rehashing.

use crate::leaf::hash_node;
use crate::proof::{generate_proof, MerkleProof};
use crate::types::Hash32;

/// Root of a tree with no leaves
pub const EMPTY_ROOT: Hash32 = Hash32::ZERO;

/// Merkle tree with all levels retained
///
/// `levels[0]` holds the sorted leaves and the last level holds only the root.
/// An empty tree has no levels.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build a tree from leaves in any order
    pub fn build(leaves: impl IntoIterator<Item = Hash32>) -> Self {
        let mut sorted: Vec<Hash32> = leaves.into_iter().collect();
        sorted.sort_unstable();
        Self::from_sorted(sorted)
    }

    fn from_sorted(leaves: Vec<Hash32>) -> Self {
        if leaves.is_empty() {
            return Self::default();
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let parent = parent_level(level);
            levels.push(parent);
        }

        Self { levels }
    }

    /// Root hash, [`EMPTY_ROOT`] for an empty tree
    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(EMPTY_ROOT)
    }

    /// Leaves in sorted order
    pub fn leaves(&self) -> &[Hash32] {
        self.levels.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every level from the leaves up to the root
    pub fn levels(&self) -> &[Vec<Hash32>] {
        &self.levels
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves().len()
    }

    /// Whether the tree has no leaves
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of hashing levels above the leaves (proof length)
    pub fn depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Position of `leaf` in sorted order
    pub fn index_of(&self, leaf: &Hash32) -> Option<usize> {
        self.leaves().binary_search(leaf).ok()
    }

    /// Proof for the leaf at sorted position `index`
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        generate_proof(&self.levels, index)
    }

    /// Proof for a leaf located by value
    pub fn proof_for(&self, leaf: &Hash32) -> Option<MerkleProof> {
        self.index_of(leaf).and_then(|index| self.proof(index))
    }
}

fn parent_level(level: &[Hash32]) -> Vec<Hash32> {
    level
        .chunks(2)
        // a trailing single-element chunk pairs with itself
        .map(|pair| hash_node(&pair[0], &pair[pair.len() - 1]))
        .collect()
}
