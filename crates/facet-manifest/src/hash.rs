//! Keccak-256 hashing shared by the address predictor, leaf codec and tree
//!
//! Every commitment in this crate has to be reproduced bit-for-bit by the
//! on-chain verifier, which hashes with Keccak-256 (the pre-standard padding,
//! not NIST SHA3-256). The algorithm is selected once through [`ALGORITHM`];
//! all call sites go through [`keccak256`] or [`hasher`].
//!
//! # Usage
//!
//! ```
//! use facet_manifest::hash::{hasher, keccak256};
//!
//! let digest = keccak256(b"");
//! assert_eq!(
//!     hex::encode(digest),
//!     "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
//! );
//!
//! let mut h = hasher();
//! h.update(b"hello ");
//! h.update(b"world");
//! assert_eq!(h.finalize(), keccak256(b"hello world"));
//! ```

use sha3::{Digest, Keccak256};
use std::fmt;

/// Synchronous 32-byte hash algorithm
pub trait HashAlgorithm: Send + Sync + fmt::Debug {
    /// Hash arbitrary bytes to a 32-byte digest
    fn hash(&self, data: &[u8]) -> [u8; 32];

    /// Create an incremental hasher for multi-part input
    fn hasher(&self) -> Box<dyn Hasher>;
}

/// Incremental hashing of multi-part data
pub trait Hasher: Send {
    /// Feed more data
    fn update(&mut self, data: &[u8]);

    /// Consume the hasher and return the digest
    fn finalize(self: Box<Self>) -> [u8; 32];
}

/// Keccak-256 as used by the EVM
#[derive(Debug, Clone, Copy)]
pub struct Keccak256Algorithm;

impl HashAlgorithm for Keccak256Algorithm {
    fn hash(&self, data: &[u8]) -> [u8; 32] {
        let result = Keccak256::digest(data);
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }

    fn hasher(&self) -> Box<dyn Hasher> {
        Box::new(Keccak256Hasher(Keccak256::new()))
    }
}

struct Keccak256Hasher(Keccak256);

impl Hasher for Keccak256Hasher {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize(self: Box<Self>) -> [u8; 32] {
        let result = self.0.finalize();
        let mut output = [0u8; 32];
        output.copy_from_slice(&result);
        output
    }
}

/// The hash algorithm used for every commitment in the workspace.
pub const ALGORITHM: Keccak256Algorithm = Keccak256Algorithm;

/// Hash `data` with the workspace algorithm
#[inline]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    ALGORITHM.hash(data)
}

/// Incremental hasher using the workspace algorithm
#[inline]
pub fn hasher() -> Box<dyn Hasher> {
    ALGORITHM.hasher()
}

/// Hash the concatenation of several parts without an intermediate buffer
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = hasher();
    for part in parts {
        h.update(part);
    }
    h.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_concat_matches_single_shot() {
        let joined = keccak256(b"facet.deploy.salt.v1mainnet");
        let parts = keccak256_concat(&[&b"facet.deploy.salt.v1"[..], b"main", b"net"]);
        assert_eq!(joined, parts);
    }
}
