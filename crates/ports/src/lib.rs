#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Gantry Ports
//!
//! Backend interface traits (ports) for the Gantry plan runner. Drivers
//! implement them; the engine and handlers depend only on the traits.
//!
//! - [`PlanRepo`] -- versioned plan persistence with compare-and-swap saves
//! - [`KvBackend`] -- opaque versioned records in a key-value store
//! - [`ResourceClient`] -- create/update/delete of cluster objects
//! - [`ImageRegistry`] -- push/pull of container images by address
//!
//! All traits are `async_trait` and object-safe, suitable for use as
//! `Arc<dyn Trait>` behind dependency injection.

pub mod cluster;
pub mod error;
pub mod kv;
pub mod plan;
pub mod registry;

pub use cluster::{ResourceClient, ResourceObject};
pub use error::PortsError;
pub use kv::{KvBackend, Record};
pub use plan::PlanRepo;
pub use registry::ImageRegistry;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn traits_are_object_safe() {
        fn _assert_plan_repo(_: &dyn PlanRepo) {}
        fn _assert_kv_backend(_: &dyn KvBackend) {}
        fn _assert_resource_client(_: &dyn ResourceClient) {}
        fn _assert_image_registry(_: &dyn ImageRegistry) {}
    }

    #[test]
    fn traits_work_as_arc_dyn() {
        fn _takes_repo(_: Arc<dyn PlanRepo>) {}
        fn _takes_backend(_: Arc<dyn KvBackend>) {}
        fn _takes_client(_: Arc<dyn ResourceClient>) {}
        fn _takes_registry(_: Arc<dyn ImageRegistry>) {}
    }
}
