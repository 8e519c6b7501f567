//! Canonical leaf and node encoding
//!
//! A leaf commits to one route as `keccak256(0x00 ‖ selector ‖ facet ‖
//! codehash)` over exactly 57 bytes. Internal nodes are `keccak256(0x01 ‖ left
//! ‖ right)`. The distinct domain bytes keep a 64-byte node preimage from ever
//! being reinterpreted as a leaf, and the node hash is order sensitive: left
//! and right are never sorted.
//!
//! The on-chain verifier encodes the same bytes in the same order; any change
//! here invalidates every proof already distributed.

use crate::hash::keccak256;
use crate::types::{Address, Hash32, Selector};

/// Domain byte prefixed to leaf preimages
pub const LEAF_DOMAIN: u8 = 0x00;

/// Domain byte prefixed to internal node preimages
pub const NODE_DOMAIN: u8 = 0x01;

/// Length of a leaf preimage: domain + selector + facet + codehash
pub const LEAF_PREIMAGE_LEN: usize = 1 + Selector::LEN + Address::LEN + Hash32::LEN;

const NODE_PREIMAGE_LEN: usize = 1 + 2 * Hash32::LEN;

/// Raw bytes hashed for a leaf
pub fn leaf_preimage(
    selector: &Selector,
    facet: &Address,
    codehash: &Hash32,
) -> [u8; LEAF_PREIMAGE_LEN] {
    let mut buf = [0u8; LEAF_PREIMAGE_LEN];
    buf[0] = LEAF_DOMAIN;
    buf[1..5].copy_from_slice(selector.as_bytes());
    buf[5..25].copy_from_slice(facet.as_bytes());
    buf[25..].copy_from_slice(codehash.as_bytes());
    buf
}

/// Leaf hash committing to one route
pub fn encode_leaf(selector: &Selector, facet: &Address, codehash: &Hash32) -> Hash32 {
    Hash32(keccak256(&leaf_preimage(selector, facet, codehash)))
}

/// Internal node hash; `left` and `right` are not interchangeable
pub fn hash_node(left: &Hash32, right: &Hash32) -> Hash32 {
    let mut buf = [0u8; NODE_PREIMAGE_LEN];
    buf[0] = NODE_DOMAIN;
    buf[1..33].copy_from_slice(left.as_bytes());
    buf[33..].copy_from_slice(right.as_bytes());
    Hash32(keccak256(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> Hash32 {
        s.parse().unwrap()
    }

    #[test]
    fn test_preimage_layout() {
        let preimage = leaf_preimage(
            &Selector::new([0xa9, 0x05, 0x9c, 0xbb]),
            &Address::new([0x11; 20]),
            &Hash32::new([0x22; 32]),
        );
        assert_eq!(preimage.len(), 57);
        assert_eq!(preimage[0], 0x00);
        assert_eq!(&preimage[1..5], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert!(preimage[5..25].iter().all(|b| *b == 0x11));
        assert!(preimage[25..].iter().all(|b| *b == 0x22));
    }

    #[test]
    fn test_leaf_golden_vectors() {
        assert_eq!(
            encode_leaf(
                &Selector::from_signature("transfer(address,uint256)"),
                &Address::new([0x11; 20]),
                &Hash32::new([0x22; 32]),
            ),
            hash("0x0c047c8b70c4f4d8ea2d6c486a295b8666962dbb273d52e21cd14dfdcc073c3c")
        );
        assert_eq!(
            encode_leaf(&Selector::ZERO, &Address::ZERO, &Hash32::ZERO),
            hash("0xadaf372fcd93e6510620653a95d8b22c5e3c1ac0536d7b2362a5bbb3c7b49df1")
        );
    }

    #[test]
    fn test_node_golden_vector() {
        assert_eq!(
            hash_node(&Hash32::new([1; 32]), &Hash32::new([2; 32])),
            hash("0x5fea46c6ed18832adf4be39bd33e5eeb7cb62ff55182560b78bf99b1220e0ffa")
        );
    }

    #[test]
    fn test_node_hash_is_not_commutative() {
        let a = Hash32::new([1; 32]);
        let b = Hash32::new([2; 32]);
        assert_ne!(hash_node(&a, &b), hash_node(&b, &a));
    }

    #[test]
    fn test_leaf_and_node_domains_differ() {
        // A leaf never equals the raw keccak of its fields without the prefix
        let selector = Selector::new([1, 2, 3, 4]);
        let facet = Address::new([5; 20]);
        let codehash = Hash32::new([6; 32]);
        let preimage = leaf_preimage(&selector, &facet, &codehash);
        assert_ne!(
            encode_leaf(&selector, &facet, &codehash).0,
            keccak256(&preimage[1..])
        );
    }
}
