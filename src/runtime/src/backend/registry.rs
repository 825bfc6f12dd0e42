//! Registry-native backend: writes the image index straight to the registry.

use std::sync::Arc;

use async_trait::async_trait;
use mantle_core::error::{MantleError, Result};

use super::ImageBackend;
use crate::manifest::{ManifestEntry, ManifestMetadata};
use crate::oci::{ImageReference, ManifestRegistry};

const BACKEND_NAME: &str = "registry";

/// Publishes manifest lists through `ManifestRegistry::push_index`.
///
/// Has no local image store, so `tag` and `push` are unsupported.
pub struct RegistryBackend {
    registry: Arc<dyn ManifestRegistry>,
}

impl RegistryBackend {
    pub fn new(registry: Arc<dyn ManifestRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ImageBackend for RegistryBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        Err(MantleError::Unsupported(format!(
            "registry backend cannot tag local image {} as {}",
            source, target
        )))
    }

    async fn push(&self, reference: &str) -> Result<String> {
        Err(MantleError::Unsupported(format!(
            "registry backend cannot push local image {}",
            reference
        )))
    }

    async fn create_and_push_manifest(
        &self,
        manifest_name: &str,
        entries: &[ManifestEntry],
        metadata: &ManifestMetadata,
    ) -> Result<()> {
        let reference = ImageReference::parse(manifest_name)?;
        let digest = self.registry.push_index(&reference, entries, metadata).await?;

        tracing::info!(
            manifest = %manifest_name,
            digest = %digest,
            platforms = entries.len(),
            "Pushed image index"
        );
        Ok(())
    }
}
