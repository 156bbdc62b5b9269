//! Container image registry port.

use async_trait::async_trait;

use crate::error::PortsError;

/// Push/pull of images against a registry reachable at an address.
#[async_trait]
pub trait ImageRegistry: Send + Sync {
    /// Push `image` (e.g. `gravitational/debian-tall:0.0.1`) to the registry at `address`.
    async fn push(&self, image: &str, address: &str) -> Result<(), PortsError>;

    /// Pull `image` from the registry at `address`.
    async fn pull(&self, image: &str, address: &str) -> Result<(), PortsError>;
}
