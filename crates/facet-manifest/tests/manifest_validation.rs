//! Validator strictness: any single-bit corruption of the committed data is
//! rejected before a validated manifest can be produced.

use assert_matches::assert_matches;
use facet_manifest::{
    Address, ConfigurationError, Hash32, Manifest, ManifestError, ManifestValidator, Route,
    Selector, ValidationError,
};

fn diamond_routes() -> Vec<Route> {
    let cut = Address::new([0x10; 20]);
    let loupe = Address::new([0x20; 20]);
    let cut_code = Hash32::new([0x11; 32]);
    let loupe_code = Hash32::new([0x21; 32]);
    vec![
        Route::new(
            Selector::from_signature("diamondCut((address,uint8,bytes4[])[],address,bytes)"),
            cut,
            cut_code,
        ),
        Route::new(Selector::from_signature("facets()"), loupe, loupe_code),
        Route::new(
            Selector::from_signature("facetAddresses()"),
            loupe,
            loupe_code,
        ),
        Route::new(
            Selector::from_signature("facetAddress(bytes4)"),
            loupe,
            loupe_code,
        ),
        Route::new(
            Selector::from_signature("facetFunctionSelectors(address)"),
            loupe,
            loupe_code,
        ),
    ]
}

#[test]
fn flipping_any_root_bit_is_rejected() {
    let manifest = Manifest::build(diamond_routes(), true).expect("unique selectors");
    for byte in 0..32 {
        for bit in 0..8 {
            let mut corrupted = manifest.clone();
            corrupted.merkle_root.0[byte] ^= 1 << bit;
            let err = ManifestValidator::new()
                .validate(&corrupted)
                .expect_err("corrupted root must be rejected");
            assert_matches!(
                err,
                ManifestError::Validation(ValidationError::RootMismatch { expected, computed })
                    if expected == corrupted.merkle_root && computed == manifest.merkle_root
            );
        }
    }
}

#[test]
fn corrupting_any_proof_entry_is_rejected() {
    let manifest = Manifest::build(diamond_routes(), true).expect("unique selectors");
    for route in &manifest.routes {
        let depth = manifest.proof(&route.selector).expect("proof").depth();
        for level in 0..depth {
            let mut corrupted = manifest.clone();
            let proof = corrupted
                .proofs
                .as_mut()
                .and_then(|proofs| proofs.get_mut(&route.selector))
                .expect("proof");
            proof.proof[level].0[31] ^= 0x01;

            let err = ManifestValidator::new()
                .validate(&corrupted)
                .expect_err("corrupted proof must be rejected");
            assert_matches!(
                err,
                ManifestError::Validation(ValidationError::ProofMismatch { selector, .. })
                    if selector == route.selector
            );
        }
    }
}

#[test]
fn corrupting_a_route_field_changes_the_recomputed_root() {
    let manifest = Manifest::build(diamond_routes(), true).expect("unique selectors");
    let mut corrupted = manifest.clone();
    corrupted.routes[2].facet.0[0] ^= 0x80;
    assert_matches!(
        ManifestValidator::new().validate(&corrupted),
        Err(ManifestError::Validation(ValidationError::RootMismatch { .. }))
    );
}

#[test]
fn duplicated_route_is_a_configuration_error() {
    let mut manifest = Manifest::build(diamond_routes(), false).expect("unique selectors");
    let first = manifest.routes[0];
    manifest.routes.push(first);
    assert_matches!(
        ManifestValidator::new().validate(&manifest),
        Err(ManifestError::Configuration(ConfigurationError::DuplicateSelector { .. }))
    );
}

#[test]
fn validation_survives_a_json_round_trip() {
    let manifest = Manifest::build(diamond_routes(), true).expect("unique selectors");
    let json = manifest.to_json_pretty().expect("serializes");
    let reloaded = Manifest::from_json(&json).expect("parses");
    let validated = ManifestValidator::strict()
        .validate(&reloaded)
        .expect("still valid");
    assert_eq!(validated.root(), manifest.merkle_root);
    assert_eq!(validated.len(), 5);
}
