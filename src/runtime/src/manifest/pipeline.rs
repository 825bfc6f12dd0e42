//! End-to-end manifest assembly.
//!
//! Stages run in a fixed order:
//!
//! ```text
//! discover → validate → filter → assemble
//!     → [health check] → [verify] → [idempotency] → publish (per tag)
//! ```
//!
//! Everything before the first registry call is fatal. A failed health
//! check or idempotency lookup is logged and skipped; a failed verification
//! aborts the run; push failures are collected per tag.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mantle_core::error::{MantleError, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::assemble::{assemble, ManifestEntry};
use super::digest::{digest_pattern, discover};
use super::filter::filter_architectures;
use super::idempotency;
use super::metadata::ManifestMetadata;
use super::publish::{ManifestTarget, PublishOutcome, Publisher};
use super::validate::validate;
use super::verify::{verify, DEFAULT_VERIFY_CONCURRENCY};
use crate::backend::ImageBackend;
use crate::oci::{ImageReference, ManifestRegistry};

/// Tag used when none is given.
pub const DEFAULT_TAG: &str = "latest";

/// Inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Image name, as used in digest file names and the target repository
    pub name: String,
    pub registry: String,
    /// Optional path between registry and name
    pub namespace: String,
    pub tags: Vec<String>,
    pub digest_dir: PathBuf,
    /// Zero disables the freshness check
    pub max_age: Duration,
    pub required_architectures: Vec<String>,
    pub best_effort: bool,
    pub verify_registry: bool,
    pub verify_concurrency: usize,
    pub health_check: bool,
    /// Publish even if an identical manifest list is already live
    pub force: bool,
    pub dry_run: bool,
    pub metadata: ManifestMetadata,
}

impl PipelineOptions {
    pub fn new(name: impl Into<String>, registry: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: registry.into(),
            namespace: String::new(),
            tags: vec![DEFAULT_TAG.to_string()],
            digest_dir: PathBuf::from("."),
            max_age: Duration::ZERO,
            required_architectures: Vec::new(),
            best_effort: false,
            verify_registry: true,
            verify_concurrency: DEFAULT_VERIFY_CONCURRENCY,
            health_check: false,
            force: false,
            dry_run: false,
            metadata: ManifestMetadata::default(),
        }
    }

    /// Reject options no run could succeed with.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MantleError::ConfigError("Image name is required".to_string()));
        }
        if self.registry.trim().is_empty() {
            return Err(MantleError::ConfigError("Registry is required".to_string()));
        }
        if self.tags.is_empty() {
            return Err(MantleError::ConfigError("At least one tag is required".to_string()));
        }
        if let Some(bad) = self.tags.iter().find(|t| t.trim().is_empty() || t.contains(['/', '@', ':'])) {
            return Err(MantleError::ConfigError(format!("Invalid tag '{}'", bad)));
        }
        Ok(())
    }

    pub fn target(&self) -> ManifestTarget {
        ManifestTarget::new(&self.registry, &self.namespace, &self.name)
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// `registry[/namespace]/name`
    pub repository: String,
    pub entries: Vec<ManifestEntry>,
    pub outcome: PublishOutcome,
    /// An identical manifest list was already published; nothing was pushed
    pub skipped: bool,
}

/// Runs the stages for one set of options.
pub struct ManifestPipeline {
    options: PipelineOptions,
}

impl ManifestPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Discover, validate, filter and assemble; no registry access.
    pub fn prepare(&self) -> Result<Vec<ManifestEntry>> {
        let opts = &self.options;
        opts.validate()?;

        let records = discover(&opts.digest_dir, &opts.name)?;
        if records.is_empty() {
            return Err(MantleError::DiscoveryError {
                directory: opts.digest_dir.display().to_string(),
                pattern: digest_pattern(&opts.name),
                message: "no digest files found".to_string(),
            });
        }
        tracing::info!(count = records.len(), "Discovered digest files");

        validate(&records, opts.max_age)?;
        let records =
            filter_architectures(records, &opts.required_architectures, opts.best_effort)?;

        let first_tag = opts.tags.first().map(String::as_str).unwrap_or(DEFAULT_TAG);
        let entries = assemble(&records, &opts.registry, &opts.namespace, first_tag);

        let platforms: Vec<&str> = entries.iter().map(|e| e.platform.as_str()).collect();
        tracing::info!(platforms = %platforms.join(", "), "Assembled manifest entries");
        Ok(entries)
    }

    /// Run every stage. Partial publish failure is reported in the outcome,
    /// not as an error; use `PublishOutcome::into_result` to surface it.
    pub async fn run(
        &self,
        registry: Arc<dyn ManifestRegistry>,
        backend: Arc<dyn ImageBackend>,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport> {
        let entries = self.prepare()?;
        self.run_prepared(entries, registry, backend, cancel).await
    }

    /// Registry stages and publication for entries from `prepare`.
    pub async fn run_prepared(
        &self,
        entries: Vec<ManifestEntry>,
        registry: Arc<dyn ManifestRegistry>,
        backend: Arc<dyn ImageBackend>,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport> {
        let opts = &self.options;
        let target = opts.target();

        ensure_running(cancel)?;

        if opts.health_check {
            let reference = target.reference(&opts.tags[0]);
            let checked = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled("health check")),
                result = registry.health_check(&reference) => result,
            };
            if let Err(e) = checked {
                tracing::warn!(error = %e, "Registry health check failed, proceeding");
            }
        }

        if opts.verify_registry {
            verify(
                registry.clone(),
                &entries,
                &opts.tags[0],
                opts.verify_concurrency,
                cancel,
            )
            .await?;
        }

        if !opts.force {
            let targets: Vec<ImageReference> =
                opts.tags.iter().map(|t| target.reference(t)).collect();
            let exists = tokio::select! {
                _ = cancel.cancelled() => return Err(cancelled("idempotency check")),
                result = idempotency::exists(registry.as_ref(), &entries, &targets) => result,
            };
            match exists {
                Ok(true) => {
                    tracing::info!(
                        repository = %target.repository(),
                        tags = %opts.tags.join(", "),
                        "Identical manifest list already published, skipping"
                    );
                    return Ok(PipelineReport {
                        repository: target.repository(),
                        entries,
                        outcome: PublishOutcome {
                            dry_run: opts.dry_run,
                            ..Default::default()
                        },
                        skipped: true,
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Could not check for an existing manifest list, proceeding");
                }
            }
        }

        ensure_running(cancel)?;

        let outcome = Publisher::new(backend)
            .dry_run(opts.dry_run)
            .publish(&target, &entries, &opts.tags, &opts.metadata, cancel)
            .await;

        tracing::info!(
            succeeded = outcome.success_tags.len(),
            failed = outcome.failed_tags.len(),
            dry_run = outcome.dry_run,
            "Manifest publication finished"
        );

        Ok(PipelineReport {
            repository: target.repository(),
            entries,
            outcome,
            skipped: false,
        })
    }
}

fn ensure_running(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(cancelled("manifest pipeline"))
    } else {
        Ok(())
    }
}

fn cancelled(stage: &str) -> MantleError {
    MantleError::Cancelled(format!("{} interrupted", stage))
}
