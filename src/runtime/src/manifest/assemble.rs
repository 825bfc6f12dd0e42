//! Turn validated digest records into manifest list entries.

use serde::{Deserialize, Serialize};

use super::digest::DigestRecord;
use super::platform::parse_platform;
use crate::oci::reference::repository_path;

/// One platform-specific image inside a manifest list.
///
/// `image_ref` is always digest-qualified, never tag-qualified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// `registry[/namespace]/image@<digest>`
    pub image_ref: String,
    /// Content digest of the platform image
    pub digest: String,
    /// Formatted platform (`linux/arm/v7`)
    pub platform: String,
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
}

/// Build one entry per record, preserving order.
///
/// The target tag is accepted for symmetry with the rest of the pipeline
/// but only appears in log output.
pub fn assemble(
    records: &[DigestRecord],
    registry: &str,
    namespace: &str,
    tag: &str,
) -> Vec<ManifestEntry> {
    records
        .iter()
        .map(|record| {
            let platform = parse_platform(&record.architecture);
            let repository = repository_path(registry, namespace, &record.image_name);
            let entry = ManifestEntry {
                image_ref: format!("{}@{}", repository, record.digest),
                digest: record.digest.clone(),
                platform: platform.to_string(),
                architecture: platform.architecture.clone(),
                os: platform.os.clone(),
                variant: platform.variant.clone(),
            };

            tracing::debug!(
                image_ref = %entry.image_ref,
                platform = %entry.platform,
                tag = %tag,
                "Assembled manifest entry"
            );
            entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;

    fn record(arch: &str, digest: &str) -> DigestRecord {
        DigestRecord {
            image_name: "app".to_string(),
            architecture: arch.to_string(),
            digest: digest.to_string(),
            source_path: PathBuf::from("x"),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_with_namespace() {
        let entries = assemble(
            &[record("amd64", "sha256:aaa"), record("arm/v7", "sha256:bbb")],
            "ghcr.io",
            "org",
            "latest",
        );

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image_ref, "ghcr.io/org/app@sha256:aaa");
        assert_eq!(entries[0].platform, "linux/amd64");
        assert_eq!(entries[0].variant, "");
        assert_eq!(entries[1].image_ref, "ghcr.io/org/app@sha256:bbb");
        assert_eq!(entries[1].platform, "linux/arm/v7");
        assert_eq!(entries[1].architecture, "arm");
        assert_eq!(entries[1].variant, "v7");
        assert_eq!(entries[1].os, "linux");
    }

    #[test]
    fn test_assemble_without_namespace() {
        let entries = assemble(&[record("arm64", "sha256:ccc")], "registry.local:5000", "", "v1");
        assert_eq!(entries[0].image_ref, "registry.local:5000/app@sha256:ccc");
    }

    #[test]
    fn test_tag_never_in_entries() {
        let entries = assemble(&[record("amd64", "sha256:aaa")], "ghcr.io", "org", "v9.9.9");
        assert!(!entries[0].image_ref.contains("v9.9.9"));
        assert_eq!(entries[0].image_ref, "ghcr.io/org/app@sha256:aaa");
    }

    #[test]
    fn test_assemble_empty() {
        assert!(assemble(&[], "ghcr.io", "org", "latest").is_empty());
    }
}
