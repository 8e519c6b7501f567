//! Fixed-width byte primitives used by routes, leaves and proofs
//!
//! Every hash and address field in a manifest is fixed-width. These newtypes
//! keep the widths in the type system, render as `0x`-prefixed lowercase hex,
//! and refuse to parse anything of the wrong width.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing fixed-width hex values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseBytesError {
    /// Hex string has the wrong number of digits
    #[error("{kind}: expected {expected} hex digits, got {actual}")]
    WrongHexLength {
        /// Name of the target type
        kind: &'static str,
        /// Required number of hex digits
        expected: usize,
        /// Number of hex digits supplied
        actual: usize,
    },

    /// Byte slice has the wrong length
    #[error("{kind}: expected {expected} bytes, got {actual}")]
    WrongSliceLength {
        /// Name of the target type
        kind: &'static str,
        /// Required number of bytes
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
    },

    /// Input contains characters outside `[0-9a-fA-F]`
    #[error("{kind}: invalid hex: {message}")]
    InvalidHex {
        /// Name of the target type
        kind: &'static str,
        /// Decoder message
        message: String,
    },
}

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            /// All-zero value
            pub const ZERO: Self = Self([0u8; $len]);

            /// Wrap raw bytes
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Copy out of a slice that must be exactly `LEN` bytes long
            pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseBytesError> {
                if bytes.len() != $len {
                    return Err(ParseBytesError::WrongSliceLength {
                        kind: stringify!($name),
                        expected: $len,
                        actual: bytes.len(),
                    });
                }
                let mut out = [0u8; $len];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            /// Whether every byte is zero
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|byte| *byte == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ParseBytesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                if digits.len() != $len * 2 {
                    return Err(ParseBytesError::WrongHexLength {
                        kind: stringify!($name),
                        expected: $len * 2,
                        actual: digits.len(),
                    });
                }
                let mut out = [0u8; $len];
                if let Err(e) = hex::decode_to_slice(digits, &mut out) {
                    return Err(ParseBytesError::InvalidHex {
                        kind: stringify!($name),
                        message: e.to_string(),
                    });
                }
                Ok(Self(out))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; $len] {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_bytes!(
    /// 4-byte function selector
    Selector,
    4
);

fixed_bytes!(
    /// 20-byte account address
    Address,
    20
);

fixed_bytes!(
    /// 32-byte Keccak-256 digest
    Hash32,
    32
);

impl Selector {
    /// Derive the selector of a canonical function signature such as
    /// `transfer(address,uint256)`: the first four bytes of its Keccak-256.
    pub fn from_signature(signature: &str) -> Self {
        let digest = crate::hash::keccak256(signature.as_bytes());
        Self([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl Address {
    /// Take the low 20 bytes of a 32-byte digest
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&digest[12..]);
        Self(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_from_signature() {
        assert_eq!(
            Selector::from_signature("transfer(address,uint256)").to_string(),
            "0xa9059cbb"
        );
        assert_eq!(
            Selector::from_signature("owner()").to_string(),
            "0x8da5cb5b"
        );
        assert_eq!(
            Selector::from_signature("facets()").to_string(),
            "0x7a0ed627"
        );
    }

    #[test]
    fn test_parse_accepts_either_case_and_optional_prefix() {
        let lower = Address::from_str("0x4e59b44847b379578588920ca78fbf26c0b4956c").unwrap();
        let upper = Address::from_str("4E59B44847B379578588920CA78FBF26C0B4956C").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(
            upper.to_string(),
            "0x4e59b44847b379578588920ca78fbf26c0b4956c"
        );
    }

    #[test]
    fn test_parse_rejects_wrong_width() {
        let err = "0xa9059c".parse::<Selector>().unwrap_err();
        assert_eq!(
            err,
            ParseBytesError::WrongHexLength {
                kind: "Selector",
                expected: 8,
                actual: 6,
            }
        );
        assert!(matches!(
            "0xzz059cbb".parse::<Selector>(),
            Err(ParseBytesError::InvalidHex { .. })
        ));
        assert!(Hash32::from_slice(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_serde_uses_prefixed_hex() {
        let hash = Hash32::new([0xab; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(32)));
        let back: Hash32 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_address_from_digest_takes_low_bytes() {
        let mut digest = [0u8; 32];
        digest[12..].copy_from_slice(&[0x42; 20]);
        digest[0] = 0xff;
        assert_eq!(Address::from_digest(&digest), Address::new([0x42; 20]));
    }
}
