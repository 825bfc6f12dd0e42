//! Per-tag manifest list publication.
//!
//! Each tag is an independent unit of work: a failed tag is recorded and
//! the loop moves on. There is no rollback of tags already pushed.

use std::sync::Arc;

use mantle_core::error::{MantleError, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::assemble::ManifestEntry;
use super::metadata::ManifestMetadata;
use crate::backend::ImageBackend;
use crate::oci::reference::{manifest_reference, repository_path};
use crate::oci::ImageReference;

/// Where manifest lists are published: `registry[/namespace]/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTarget {
    pub registry: String,
    pub namespace: String,
    pub name: String,
}

impl ManifestTarget {
    pub fn new(
        registry: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// `registry[/namespace]/name:tag`
    pub fn manifest_name(&self, tag: &str) -> String {
        manifest_reference(&self.registry, &self.namespace, &self.name, tag)
    }

    pub fn reference(&self, tag: &str) -> ImageReference {
        ImageReference::tagged(&self.registry, &self.namespace, &self.name, tag)
    }

    /// `registry[/namespace]/name`
    pub fn repository(&self) -> String {
        repository_path(&self.registry, &self.namespace, &self.name)
    }
}

/// Which tags were published and which failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub success_tags: Vec<String>,
    pub failed_tags: Vec<String>,
    /// Nothing was pushed; `success_tags` lists what would have been
    pub dry_run: bool,
}

impl PublishOutcome {
    pub fn total(&self) -> usize {
        self.success_tags.len() + self.failed_tags.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed_tags.is_empty()
    }

    /// `PublishFailed` if any tag failed.
    pub fn into_result(self) -> Result<Self> {
        if self.failed_tags.is_empty() {
            Ok(self)
        } else {
            Err(MantleError::PublishFailed {
                failed: self.failed_tags.len(),
                total: self.total(),
                failed_tags: self.failed_tags,
            })
        }
    }
}

/// Pushes one manifest list per tag through a backend.
pub struct Publisher {
    backend: Arc<dyn ImageBackend>,
    dry_run: bool,
}

impl Publisher {
    pub fn new(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend,
            dry_run: false,
        }
    }

    /// Report what would be pushed without calling the backend.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Publish `entries` under every tag, in order.
    ///
    /// Cancellation is checked between tags: once `cancel` fires, tags not
    /// yet started are reported as failed. A push already in flight is
    /// awaited and its real result recorded.
    pub async fn publish(
        &self,
        target: &ManifestTarget,
        entries: &[ManifestEntry],
        tags: &[String],
        metadata: &ManifestMetadata,
        cancel: &CancellationToken,
    ) -> PublishOutcome {
        let mut outcome = PublishOutcome {
            dry_run: self.dry_run,
            ..Default::default()
        };

        for tag in tags {
            let manifest_name = target.manifest_name(tag);

            if self.dry_run {
                tracing::info!(
                    manifest = %manifest_name,
                    platforms = entries.len(),
                    "[dry-run] Would create and push manifest list"
                );
                for entry in entries {
                    tracing::info!(
                        platform = %entry.platform,
                        image = %entry.image_ref,
                        "[dry-run]   entry"
                    );
                }
                outcome.success_tags.push(tag.clone());
                continue;
            }

            if cancel.is_cancelled() {
                tracing::warn!(manifest = %manifest_name, "Cancelled before push");
                outcome.failed_tags.push(tag.clone());
                continue;
            }

            tracing::info!(
                manifest = %manifest_name,
                backend = %self.backend.name(),
                "Creating and pushing manifest list"
            );

            // A started push runs to completion so the outcome reflects the registry.
            let pushed = self
                .backend
                .create_and_push_manifest(&manifest_name, entries, metadata)
                .await;

            match pushed {
                Ok(()) => {
                    tracing::info!(manifest = %manifest_name, "Manifest list pushed");
                    outcome.success_tags.push(tag.clone());
                }
                Err(e) => {
                    let err = MantleError::PushError {
                        tag: tag.clone(),
                        message: e.to_string(),
                    };
                    tracing::error!(manifest = %manifest_name, error = %err, "Manifest push failed");
                    outcome.failed_tags.push(tag.clone());
                }
            }
        }

        outcome
    }
}
