//! Build backends.
//!
//! A backend is whatever can tag and push per-architecture images and
//! turn a set of platform images into a published manifest list. The
//! pipeline only sees the `ImageBackend` trait; `select_backend` picks a
//! concrete implementation by probing.

mod buildx;
mod factory;
mod registry;

use async_trait::async_trait;
use mantle_core::error::Result;

use crate::manifest::{ManifestEntry, ManifestMetadata};

pub use buildx::BuildxBackend;
pub use factory::{select_backend, BackendKind};
pub use registry::RegistryBackend;

/// Capability a build backend offers to the manifest pipeline.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Short identifier (`buildx`, `registry`).
    fn name(&self) -> &str;

    /// Check the backend can be used on this host.
    async fn check_available(&self) -> Result<()>;

    /// Point `target` at the local image `source`.
    async fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Push `reference` and return the digest the registry assigned.
    async fn push(&self, reference: &str) -> Result<String>;

    /// Publish a manifest list named `manifest_name` built from `entries`.
    async fn create_and_push_manifest(
        &self,
        manifest_name: &str,
        entries: &[ManifestEntry],
        metadata: &ManifestMetadata,
    ) -> Result<()>;
}
