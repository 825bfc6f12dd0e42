//! Confirm every source digest is present in the registry.

use std::sync::Arc;

use mantle_core::error::{MantleError, RegistryErrorKind, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::assemble::ManifestEntry;
use crate::oci::{ImageReference, ManifestRegistry};

/// Concurrency used when none is configured.
pub const DEFAULT_VERIFY_CONCURRENCY: usize = 5;

/// Upper bound on concurrent registry lookups.
pub const MAX_VERIFY_CONCURRENCY: usize = 20;

/// Resolve the requested worker count: 0 means default, above the cap is clamped.
pub fn effective_concurrency(requested: usize) -> usize {
    match requested {
        0 => DEFAULT_VERIFY_CONCURRENCY,
        n if n > MAX_VERIFY_CONCURRENCY => {
            tracing::warn!(
                requested = n,
                max = MAX_VERIFY_CONCURRENCY,
                "Verify concurrency too high, clamping"
            );
            MAX_VERIFY_CONCURRENCY
        }
        n => n,
    }
}

/// Check each entry's digest-qualified reference resolves in the registry.
///
/// Stops at the first failure: remaining workers are cancelled and drained
/// before the error is returned. `tag` is only used for logging.
pub async fn verify(
    registry: Arc<dyn ManifestRegistry>,
    entries: &[ManifestEntry],
    tag: &str,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let limit = effective_concurrency(max_concurrent);
    tracing::info!(
        entries = entries.len(),
        concurrency = limit,
        tag = %tag,
        "Verifying digests in registry"
    );

    let semaphore = Arc::new(Semaphore::new(limit));
    let workers = cancel.child_token();
    let mut join_set = JoinSet::new();

    for entry in entries.iter().cloned() {
        let registry = registry.clone();
        let semaphore = semaphore.clone();
        let token = workers.clone();

        join_set.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(cancelled(&entry)),
                permit = semaphore.acquire_owned() => permit.map_err(|e| {
                    MantleError::Other(format!("verify semaphore closed: {}", e))
                })?,
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => Err(cancelled(&entry)),
                result = verify_entry(registry.as_ref(), &entry) => result,
            }
        });
    }

    let mut first_error: Option<MantleError> = None;
    while let Some(joined) = join_set.join_next().await {
        let outcome = joined.unwrap_or_else(|e| {
            Err(MantleError::Other(format!("verify task failed: {}", e)))
        });

        if let Err(e) = outcome {
            if first_error.is_none() {
                workers.cancel();
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            tracing::info!(entries = entries.len(), "All digests verified");
            Ok(())
        }
    }
}

async fn verify_entry(registry: &dyn ManifestRegistry, entry: &ManifestEntry) -> Result<()> {
    let reference = ImageReference::parse(&entry.image_ref)?;

    match registry.manifest_digest(&reference).await {
        Ok(Some(found)) => {
            if found != entry.digest {
                tracing::warn!(
                    reference = %entry.image_ref,
                    expected = %entry.digest,
                    found = %found,
                    "Registry returned a different digest"
                );
            }
            tracing::debug!(platform = %entry.platform, digest = %entry.digest, "Digest present");
            Ok(())
        }
        Ok(None) => Err(MantleError::RegistryError {
            kind: RegistryErrorKind::Verify,
            reference: entry.image_ref.clone(),
            message: format!("digest {} not found in registry", entry.digest),
        }),
        Err(MantleError::RegistryError { message, .. }) => Err(MantleError::RegistryError {
            kind: RegistryErrorKind::Verify,
            reference: entry.image_ref.clone(),
            message,
        }),
        Err(e) => Err(e),
    }
}

fn cancelled(entry: &ManifestEntry) -> MantleError {
    MantleError::Cancelled(format!("verification of {} interrupted", entry.image_ref))
}
