//! Deterministic deployment addresses (CREATE2)
//!
//! A facet deployed through a CREATE2 factory lands at
//! `keccak256(0xff ‖ factory ‖ salt ‖ keccak256(init_code))[12..]`, so its
//! address is known before the deployment transaction is sent. Salts are
//! derived from the facet name, its version and a deployment context
//! (typically the network name) under a domain tag.
//!
//! A predicted address that disagrees with the deployed one means a wrong
//! factory, salt or init code was used. That is reported as a
//! [`ConfigurationError::AddressMismatch`] and is never retried.

use crate::errors::ConfigurationError;
use crate::hash::{keccak256, keccak256_concat};
use crate::types::{Address, Hash32};
use serde::{Deserialize, Serialize};

/// Domain tag prefixed to every salt preimage
pub const DEFAULT_SALT_DOMAIN: &[u8] = b"facet.deploy.salt.v1";

/// Leading byte of the CREATE2 address preimage
pub const CREATE2_PREFIX: u8 = 0xff;

/// Salt for `name`/`version` in `context` under the default domain tag.
///
/// The preimage is the packed concatenation `domain ‖ name ‖ version ‖
/// context` with no separators.
pub fn compute_salt(name: &str, version: &str, context: &str) -> Hash32 {
    compute_salt_with_domain(DEFAULT_SALT_DOMAIN, name, version, context)
}

/// Salt under an explicit domain tag
pub fn compute_salt_with_domain(domain: &[u8], name: &str, version: &str, context: &str) -> Hash32 {
    Hash32(keccak256_concat(&[
        domain,
        name.as_bytes(),
        version.as_bytes(),
        context.as_bytes(),
    ]))
}

/// Hash of the creation bytecode, as CREATE2 consumes it
pub fn init_code_hash(init_code: &[u8]) -> Hash32 {
    Hash32(keccak256(init_code))
}

/// Address a CREATE2 factory will deploy `init_code_hash` to under `salt`
pub fn predict_address(factory: &Address, salt: &Hash32, init_code_hash: &Hash32) -> Address {
    let digest = keccak256_concat(&[
        &[CREATE2_PREFIX],
        factory.as_bytes(),
        salt.as_bytes(),
        init_code_hash.as_bytes(),
    ]);
    Address::from_digest(&digest)
}

/// Planned deployment of one facet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetDeployment {
    /// Facet name the salt was derived from
    pub name: String,
    /// Facet version the salt was derived from
    pub version: String,
    /// Derived salt
    pub salt: Hash32,
    /// Hash of the creation bytecode
    pub init_code_hash: Hash32,
    /// Address the factory will deploy to
    pub predicted: Address,
}

impl FacetDeployment {
    /// Check an observed deployment address against the prediction
    pub fn verify(&self, actual: Address) -> Result<Address, ConfigurationError> {
        if actual == self.predicted {
            Ok(actual)
        } else {
            tracing::error!(
                facet = %self.name,
                predicted = %self.predicted,
                actual = %actual,
                "Deployed address does not match prediction"
            );
            Err(ConfigurationError::AddressMismatch {
                name: self.name.clone(),
                predicted: self.predicted,
                actual,
            })
        }
    }
}

/// Predicts facet addresses for one factory and deployment context
#[derive(Debug, Clone)]
pub struct AddressPredictor {
    factory: Address,
    context: String,
    domain: Vec<u8>,
}

impl AddressPredictor {
    /// Predictor for `factory` in `context` using the default domain tag
    pub fn new(factory: Address, context: impl Into<String>) -> Self {
        Self {
            factory,
            context: context.into(),
            domain: DEFAULT_SALT_DOMAIN.to_vec(),
        }
    }

    /// Replace the salt domain tag
    pub fn with_domain_tag(mut self, domain: impl Into<Vec<u8>>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Factory address
    pub fn factory(&self) -> &Address {
        &self.factory
    }

    /// Deployment context
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Salt for `name` at `version`
    pub fn compute_salt(&self, name: &str, version: &str) -> Hash32 {
        compute_salt_with_domain(&self.domain, name, version, &self.context)
    }

    /// Predicted address for `name` at `version` with the given creation code
    pub fn predict(&self, name: &str, version: &str, init_code: &[u8]) -> Address {
        self.plan(name, version, init_code).predicted
    }

    /// Full deployment plan from creation bytecode
    pub fn plan(&self, name: &str, version: &str, init_code: &[u8]) -> FacetDeployment {
        self.plan_with_hash(name, version, init_code_hash(init_code))
    }

    /// Full deployment plan from an already computed init code hash
    pub fn plan_with_hash(
        &self,
        name: &str,
        version: &str,
        init_code_hash: Hash32,
    ) -> FacetDeployment {
        let salt = self.compute_salt(name, version);
        let predicted = predict_address(&self.factory, &salt, &init_code_hash);
        tracing::debug!(
            facet = name,
            version,
            salt = %salt,
            predicted = %predicted,
            "Predicted facet deployment address"
        );
        FacetDeployment {
            name: name.to_string(),
            version: version.to_string(),
            salt,
            init_code_hash,
            predicted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn hash(s: &str) -> Hash32 {
        s.parse().unwrap()
    }

    // Vectors from EIP-1014
    #[test]
    fn test_create2_reference_vectors() {
        let zero_salt = Hash32::ZERO;
        assert_eq!(
            predict_address(&Address::ZERO, &zero_salt, &init_code_hash(&[0x00])),
            address("0x4d1a2e2bb4f88f0250f26ffff098b0b30b26bf38")
        );
        assert_eq!(
            predict_address(
                &address("0xdeadbeef00000000000000000000000000000000"),
                &zero_salt,
                &init_code_hash(&[0x00]),
            ),
            address("0xb928f69bb1d91cd65274e3c79d8986362984fda3")
        );
        assert_eq!(
            predict_address(
                &address("0x00000000000000000000000000000000deadbeef"),
                &hash("0x00000000000000000000000000000000000000000000000000000000cafebabe"),
                &init_code_hash(&[0xde, 0xad, 0xbe, 0xef]),
            ),
            address("0x60f3f640a8508fc6a86d45df051962668e1e8ac7")
        );
        assert_eq!(
            predict_address(&Address::ZERO, &zero_salt, &init_code_hash(&[])),
            address("0xe33c0c7f7df4809055c3eba6c09cfe4baf1bd9e0")
        );
    }

    #[test]
    fn test_salt_golden_vector() {
        assert_eq!(
            compute_salt("DiamondCutFacet", "1.0.0", "mainnet"),
            hash("0x83fdeed4299f9d2de3a47e01c91fc097bee67cae57a7fccaff2a1ef767252964")
        );
    }

    #[test]
    fn test_salt_depends_on_every_input() {
        let base = compute_salt("DiamondCutFacet", "1.0.0", "mainnet");
        assert_ne!(base, compute_salt("DiamondCutFacet", "1.0.1", "mainnet"));
        assert_ne!(base, compute_salt("DiamondLoupeFacet", "1.0.0", "mainnet"));
        assert_ne!(base, compute_salt("DiamondCutFacet", "1.0.0", "sepolia"));
        assert_ne!(
            base,
            compute_salt_with_domain(b"other.domain", "DiamondCutFacet", "1.0.0", "mainnet")
        );
    }

    #[test]
    fn test_predictor_plan_golden_vector() {
        let predictor = AddressPredictor::new(
            address("0x4e59b44847b379578588920ca78fbf26c0b4956c"),
            "mainnet",
        );
        let plan = predictor.plan("DiamondCutFacet", "1.0.0", &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(
            plan.init_code_hash,
            hash("0x1c3374235d773b2189aed115aa13143020fcdbbe86e38f358cf3e4771b2f0244")
        );
        assert_eq!(
            plan.predicted,
            address("0xb6804826284178070c4f2c7bf81063e5e29cc351")
        );
        assert_eq!(plan.verify(plan.predicted), Ok(plan.predicted));
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let predictor = AddressPredictor::new(Address::new([0x11; 20]), "testnet");
        let plan = predictor.plan("LoupeFacet", "2.0.0", b"code");
        let err = plan.verify(Address::new([0x22; 20])).unwrap_err();
        assert!(matches!(err, ConfigurationError::AddressMismatch { .. }));
    }
}
