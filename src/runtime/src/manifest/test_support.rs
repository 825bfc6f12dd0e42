//! In-memory registry and backend for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mantle_core::error::{MantleError, RegistryErrorKind, Result};

use super::assemble::ManifestEntry;
use super::metadata::ManifestMetadata;
use super::platform::parse_platform;
use crate::backend::ImageBackend;
use crate::oci::{
    ArchitectureInfo, ImageReference, ManifestInfo, ManifestRegistry, OCI_IMAGE_INDEX_MEDIA_TYPE,
    OCI_IMAGE_MANIFEST_MEDIA_TYPE,
};

/// Entry for `ghcr.io/org/app` with a digest of 64 repetitions of `fill`.
pub fn entry(architecture: &str, fill: char) -> ManifestEntry {
    let digest = format!("sha256:{}", fill.to_string().repeat(64));
    let platform = parse_platform(architecture);
    ManifestEntry {
        image_ref: format!("ghcr.io/org/app@{}", digest),
        digest,
        platform: platform.to_string(),
        architecture: platform.architecture.clone(),
        os: platform.os.clone(),
        variant: platform.variant.clone(),
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    digests: Mutex<HashSet<String>>,
    indexes: Mutex<HashMap<String, Vec<ArchitectureInfo>>>,
    fail: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryRegistry {
    pub fn with_digests(digests: &[&str]) -> Self {
        let registry = Self::default();
        for d in digests {
            registry.add_digest(d);
        }
        registry
    }

    pub fn add_digest(&self, digest: &str) {
        self.digests.lock().unwrap().insert(digest.to_string());
    }

    pub fn publish_index(&self, reference: &ImageReference, entries: &[ManifestEntry]) {
        let archs = entries
            .iter()
            .map(|e| ArchitectureInfo {
                os: e.os.clone(),
                architecture: e.architecture.clone(),
                variant: e.variant.clone(),
                digest: e.digest.clone(),
                size: 512,
                media_type: OCI_IMAGE_MANIFEST_MEDIA_TYPE.to_string(),
            })
            .collect();
        self.indexes
            .lock()
            .unwrap()
            .insert(reference.to_string(), archs);
    }

    pub fn fail_lookups(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check(&self, kind: RegistryErrorKind, reference: &ImageReference) -> Result<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(MantleError::RegistryError {
                kind,
                reference: reference.to_string(),
                message: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ManifestRegistry for MemoryRegistry {
    async fn health_check(&self, reference: &ImageReference) -> Result<()> {
        self.check(RegistryErrorKind::HealthCheck, reference)
    }

    async fn manifest_digest(&self, reference: &ImageReference) -> Result<Option<String>> {
        self.check(RegistryErrorKind::Verify, reference)?;
        let digest = reference.digest.clone().unwrap_or_default();
        Ok(self.digests.lock().unwrap().get(&digest).cloned())
    }

    async fn fetch_index(
        &self,
        reference: &ImageReference,
    ) -> Result<Option<Vec<ArchitectureInfo>>> {
        self.check(RegistryErrorKind::Exists, reference)?;
        Ok(self.indexes.lock().unwrap().get(&reference.to_string()).cloned())
    }

    async fn inspect(&self, reference: &ImageReference) -> Result<ManifestInfo> {
        self.check(RegistryErrorKind::Inspect, reference)?;
        let architectures = self
            .indexes
            .lock()
            .unwrap()
            .get(&reference.to_string())
            .cloned()
            .ok_or_else(|| MantleError::RegistryError {
                kind: RegistryErrorKind::Inspect,
                reference: reference.to_string(),
                message: "manifest not found".to_string(),
            })?;
        Ok(ManifestInfo {
            name: reference.repository_reference(),
            tag: reference.tag.clone().unwrap_or_default(),
            digest: "sha256:index".to_string(),
            media_type: OCI_IMAGE_INDEX_MEDIA_TYPE.to_string(),
            size: 1024,
            annotations: Default::default(),
            architectures,
        })
    }

    async fn push_index(
        &self,
        reference: &ImageReference,
        entries: &[ManifestEntry],
        _metadata: &ManifestMetadata,
    ) -> Result<String> {
        self.check(RegistryErrorKind::Push, reference)?;
        self.publish_index(reference, entries);
        Ok(super::idempotency::entries_fingerprint(entries))
    }
}

/// Backend that records manifest names and fails on chosen ones.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
    delay: Duration,
    completed: AtomicUsize,
}

impl RecordingBackend {
    pub fn failing_on(manifest_names: &[&str]) -> Self {
        Self {
            failing: manifest_names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Each manifest push takes `delay` before it lands.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Manifest pushes that ran to the end.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn check_available(&self) -> Result<()> {
        Ok(())
    }

    async fn tag(&self, _source: &str, _target: &str) -> Result<()> {
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<String> {
        self.calls.lock().unwrap().push(reference.to_string());
        Ok(format!("sha256:{}", "e".repeat(64)))
    }

    async fn create_and_push_manifest(
        &self,
        manifest_name: &str,
        _entries: &[ManifestEntry],
        _metadata: &ManifestMetadata,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(manifest_name.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| f == manifest_name) {
            Err(MantleError::BackendError {
                backend: "recording".to_string(),
                message: "denied".to_string(),
            })
        } else {
            Ok(())
        }
    }
}
