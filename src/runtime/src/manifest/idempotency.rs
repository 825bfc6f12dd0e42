//! Skip publication when an identical manifest list is already live.
//!
//! Two lists are identical when they cover the same platforms with the same
//! digests. Annotations and labels are not compared.

use sha2::{Digest, Sha256};

use mantle_core::error::Result;

use super::assemble::ManifestEntry;
use crate::oci::{ImageReference, ManifestRegistry};

/// Order-independent fingerprint of `(platform, digest)` pairs.
pub fn fingerprint<I, P, D>(pairs: I) -> String
where
    I: IntoIterator<Item = (P, D)>,
    P: AsRef<str>,
    D: AsRef<str>,
{
    let mut lines: Vec<String> = pairs
        .into_iter()
        .map(|(platform, digest)| format!("{}@{}", platform.as_ref(), digest.as_ref()))
        .collect();
    lines.sort();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// Fingerprint of the entries about to be published.
pub fn entries_fingerprint(entries: &[ManifestEntry]) -> String {
    fingerprint(
        entries
            .iter()
            .map(|e| (e.platform.as_str(), e.digest.as_str())),
    )
}

/// Whether every reference in `targets` already serves exactly `entries`.
///
/// Returns `false` as soon as one target is missing, is not a list, or
/// differs. Registry errors are returned to the caller.
pub async fn exists(
    registry: &dyn ManifestRegistry,
    entries: &[ManifestEntry],
    targets: &[ImageReference],
) -> Result<bool> {
    if targets.is_empty() {
        return Ok(false);
    }

    let desired = entries_fingerprint(entries);

    for target in targets {
        let Some(published) = registry.fetch_index(target).await? else {
            tracing::debug!(reference = %target, "No manifest list published");
            return Ok(false);
        };

        let current = fingerprint(published.iter().map(|a| (a.platform(), a.digest.as_str())));

        if current != desired {
            tracing::debug!(
                reference = %target,
                current = %current,
                desired = %desired,
                "Published manifest list differs"
            );
            return Ok(false);
        }
    }

    Ok(true)
}
