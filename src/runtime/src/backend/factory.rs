//! Backend selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use mantle_core::error::{MantleError, Result};

use super::{BuildxBackend, ImageBackend, RegistryBackend};
use crate::oci::ManifestRegistry;

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// First available, in priority order
    #[default]
    Auto,
    Buildx,
    Registry,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Auto => write!(f, "auto"),
            BackendKind::Buildx => write!(f, "buildx"),
            BackendKind::Registry => write!(f, "registry"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = MantleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(BackendKind::Auto),
            "buildx" | "docker" => Ok(BackendKind::Buildx),
            "registry" | "oci" => Ok(BackendKind::Registry),
            other => Err(MantleError::ConfigError(format!(
                "Unknown backend '{}' (expected auto, buildx or registry)",
                other
            ))),
        }
    }
}

/// Build and check the backend for `kind`.
///
/// `Auto` tries buildx, then the registry backend, and fails only if every
/// candidate fails its availability check.
pub async fn select_backend(
    kind: BackendKind,
    registry: Arc<dyn ManifestRegistry>,
) -> Result<Arc<dyn ImageBackend>> {
    let candidates: Vec<Arc<dyn ImageBackend>> = match kind {
        BackendKind::Auto => vec![
            Arc::new(BuildxBackend::new()),
            Arc::new(RegistryBackend::new(registry)),
        ],
        BackendKind::Buildx => vec![Arc::new(BuildxBackend::new())],
        BackendKind::Registry => vec![Arc::new(RegistryBackend::new(registry))],
    };

    first_available(candidates).await
}

/// The first candidate whose availability check succeeds.
pub(crate) async fn first_available(
    candidates: Vec<Arc<dyn ImageBackend>>,
) -> Result<Arc<dyn ImageBackend>> {
    let mut failures = Vec::new();

    for candidate in candidates {
        match candidate.check_available().await {
            Ok(()) => {
                tracing::info!(backend = %candidate.name(), "Selected build backend");
                return Ok(candidate);
            }
            Err(e) => {
                tracing::debug!(backend = %candidate.name(), error = %e, "Backend unavailable");
                failures.push(format!("{}: {}", candidate.name(), e));
            }
        }
    }

    Err(MantleError::NoBackendAvailable(failures.join("; ")))
}
