//! Facet testing infrastructure
//!
//! An in-memory router with fault injection, manifest fixtures and an
//! operator double. Add as a dev-dependency and drive the engine against
//! [`InMemoryRouter`]:
//!
//! ```rust,no_run
//! use facet_testkit::*;
//!
//! let router = InMemoryRouter::new();
//! let manifest = diamond_manifest();
//! deploy_manifest(&router, &manifest);
//! router.fail_call(RouterMethod::ApplyRoutes, 0, Fault::Transient);
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod router;

pub use fixtures::*;
pub use router::{
    CallCounts, Fault, InMemoryRouter, RouterMethod, ACTIVATE_GAS, APPLY_BASE_GAS,
    APPLY_ROUTE_GAS, COMMIT_GAS,
};

/// Install a fmt subscriber honouring `RUST_LOG`; later calls are no-ops
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
