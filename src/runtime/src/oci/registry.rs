//! Registry access for manifest lists.
//!
//! `ManifestRegistry` is the seam the pipeline talks to; `RegistryClient`
//! implements it with the `oci-distribution` crate.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use mantle_core::error::{MantleError, RegistryErrorKind, Result};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::{OciDistributionError, OciErrorCode};
use oci_distribution::manifest::{ImageIndexEntry, OciImageIndex, OciManifest, Platform};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use serde::Serialize;

use super::credentials::CredentialStore;
use super::reference::ImageReference;
use crate::manifest::{ManifestEntry, ManifestMetadata};

/// OCI image index media type.
pub const OCI_IMAGE_INDEX_MEDIA_TYPE: &str = "application/vnd.oci.image.index.v1+json";
/// OCI image manifest media type.
pub const OCI_IMAGE_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
/// Docker manifest list media type.
pub const DOCKER_MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
/// Docker image manifest media type.
pub const DOCKER_MANIFEST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.v2+json";

const ANY_MANIFEST: &[&str] = &[
    OCI_IMAGE_INDEX_MEDIA_TYPE,
    DOCKER_MANIFEST_LIST_MEDIA_TYPE,
    OCI_IMAGE_MANIFEST_MEDIA_TYPE,
    DOCKER_MANIFEST_MEDIA_TYPE,
];

const IMAGE_MANIFEST: &[&str] = &[OCI_IMAGE_MANIFEST_MEDIA_TYPE, DOCKER_MANIFEST_MEDIA_TYPE];

/// One platform image inside a published manifest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchitectureInfo {
    pub os: String,
    pub architecture: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variant: String,
    pub digest: String,
    pub size: i64,
    pub media_type: String,
}

impl ArchitectureInfo {
    /// `os/arch[/variant]`
    pub fn platform(&self) -> String {
        if self.variant.is_empty() {
            format!("{}/{}", self.os, self.architecture)
        } else {
            format!("{}/{}/{}", self.os, self.architecture, self.variant)
        }
    }
}

/// A published manifest as seen by `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestInfo {
    /// `registry/repository`
    pub name: String,
    pub tag: String,
    pub digest: String,
    pub media_type: String,
    pub size: usize,
    pub annotations: BTreeMap<String, String>,
    /// Empty for a single-platform manifest
    pub architectures: Vec<ArchitectureInfo>,
}

/// Registry operations the manifest pipeline needs.
#[async_trait]
pub trait ManifestRegistry: Send + Sync {
    /// Authenticate for pull against the reference's repository.
    async fn health_check(&self, reference: &ImageReference) -> Result<()>;

    /// Digest of the manifest at `reference`, or `None` if it does not exist.
    async fn manifest_digest(&self, reference: &ImageReference) -> Result<Option<String>>;

    /// Platforms of the manifest list at `reference`.
    ///
    /// `None` when nothing is published there or the manifest is not a list.
    async fn fetch_index(&self, reference: &ImageReference)
        -> Result<Option<Vec<ArchitectureInfo>>>;

    /// Describe the manifest at `reference`.
    async fn inspect(&self, reference: &ImageReference) -> Result<ManifestInfo>;

    /// Write an image index for `entries` at `reference`; returns its digest.
    async fn push_index(
        &self,
        reference: &ImageReference,
        entries: &[ManifestEntry],
        metadata: &ManifestMetadata,
    ) -> Result<String>;
}

/// Credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// `REGISTRY_USERNAME` / `REGISTRY_PASSWORD`, else anonymous.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match (lookup("REGISTRY_USERNAME"), lookup("REGISTRY_PASSWORD")) {
            (Some(u), Some(p)) if !u.is_empty() => Self::basic(u, p),
            _ => Self::anonymous(),
        }
    }

    /// Auth file entry for `registry`, then environment, then anonymous.
    ///
    /// An unreadable auth file is logged and skipped.
    pub fn resolve(registry: &str, auth_file: Option<&Path>) -> Self {
        match CredentialStore::resolve(auth_file).and_then(|store| store.get(registry)) {
            Ok(Some((username, password))) => {
                tracing::debug!(registry = %registry, "Using credentials from auth file");
                return Self::basic(username, password);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(registry = %registry, error = %e, "Ignoring unreadable auth file");
            }
        }
        Self::from_env()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// `ManifestRegistry` over HTTPS using `oci-distribution`.
pub struct RegistryClient {
    client: Client,
    auth: RegistryAuth,
}

impl RegistryClient {
    pub fn new(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth,
        }
    }

    fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
        let ref_str = reference.full_reference();
        ref_str.parse::<Reference>().map_err(|e| {
            MantleError::ConfigError(format!("Invalid OCI reference '{}': {}", ref_str, e))
        })
    }

    /// Raw manifest bytes and digest, `None` when the registry reports it missing.
    async fn pull_raw(
        &self,
        reference: &ImageReference,
        accept: &[&str],
        kind: RegistryErrorKind,
    ) -> Result<Option<(Vec<u8>, String)>> {
        let oci_ref = Self::to_oci_reference(reference)?;
        match self
            .client
            .pull_manifest_raw(&oci_ref, &self.auth.to_oci_auth(), accept)
            .await
        {
            Ok(found) => Ok(Some(found)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(registry_error(kind, reference, e)),
        }
    }

    /// Index descriptor for one platform image.
    async fn describe_entry(&self, entry: &ManifestEntry) -> Result<ImageIndexEntry> {
        let reference = ImageReference::parse(&entry.image_ref)?;
        let (bytes, _) = self
            .pull_raw(&reference, IMAGE_MANIFEST, RegistryErrorKind::Push)
            .await?
            .ok_or_else(|| MantleError::RegistryError {
                kind: RegistryErrorKind::Push,
                reference: entry.image_ref.clone(),
                message: "platform manifest not found".to_string(),
            })?;

        Ok(ImageIndexEntry {
            media_type: declared_media_type(&bytes)
                .unwrap_or_else(|| OCI_IMAGE_MANIFEST_MEDIA_TYPE.to_string()),
            digest: entry.digest.clone(),
            size: bytes.len() as i64,
            platform: Some(Platform {
                architecture: entry.architecture.clone(),
                os: entry.os.clone(),
                os_version: None,
                os_features: None,
                variant: if entry.variant.is_empty() {
                    None
                } else {
                    Some(entry.variant.clone())
                },
                features: None,
            }),
            annotations: None,
        })
    }
}

#[async_trait]
impl ManifestRegistry for RegistryClient {
    async fn health_check(&self, reference: &ImageReference) -> Result<()> {
        let oci_ref = Self::to_oci_reference(reference)?;
        self.client
            .auth(&oci_ref, &self.auth.to_oci_auth(), RegistryOperation::Pull)
            .await
            .map_err(|e| registry_error(RegistryErrorKind::HealthCheck, reference, e))?;

        tracing::debug!(registry = %reference.registry, "Registry health check passed");
        Ok(())
    }

    async fn manifest_digest(&self, reference: &ImageReference) -> Result<Option<String>> {
        let oci_ref = Self::to_oci_reference(reference)?;
        match self
            .client
            .fetch_manifest_digest(&oci_ref, &self.auth.to_oci_auth())
            .await
        {
            Ok(digest) => Ok(Some(digest)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(registry_error(RegistryErrorKind::Verify, reference, e)),
        }
    }

    async fn fetch_index(
        &self,
        reference: &ImageReference,
    ) -> Result<Option<Vec<ArchitectureInfo>>> {
        let Some((bytes, _)) = self
            .pull_raw(reference, ANY_MANIFEST, RegistryErrorKind::Exists)
            .await?
        else {
            return Ok(None);
        };

        match parse_manifest(&bytes, reference, RegistryErrorKind::Exists)? {
            OciManifest::ImageIndex(index) => Ok(Some(index_architectures(&index))),
            OciManifest::Image(_) => Ok(None),
        }
    }

    async fn inspect(&self, reference: &ImageReference) -> Result<ManifestInfo> {
        let (bytes, digest) = self
            .pull_raw(reference, ANY_MANIFEST, RegistryErrorKind::Inspect)
            .await?
            .ok_or_else(|| MantleError::RegistryError {
                kind: RegistryErrorKind::Inspect,
                reference: reference.to_string(),
                message: "manifest not found".to_string(),
            })?;

        let declared = declared_media_type(&bytes);
        let manifest = parse_manifest(&bytes, reference, RegistryErrorKind::Inspect)?;

        let (media_type, annotations, architectures) = match manifest {
            OciManifest::ImageIndex(index) => (
                declared.unwrap_or_else(|| OCI_IMAGE_INDEX_MEDIA_TYPE.to_string()),
                to_btree(index.annotations.as_ref()),
                index_architectures(&index),
            ),
            OciManifest::Image(image) => (
                declared.unwrap_or_else(|| OCI_IMAGE_MANIFEST_MEDIA_TYPE.to_string()),
                to_btree(image.annotations.as_ref()),
                Vec::new(),
            ),
        };

        Ok(ManifestInfo {
            name: reference.repository_reference(),
            tag: reference.tag.clone().unwrap_or_default(),
            digest,
            media_type,
            size: bytes.len(),
            annotations,
            architectures,
        })
    }

    async fn push_index(
        &self,
        reference: &ImageReference,
        entries: &[ManifestEntry],
        metadata: &ManifestMetadata,
    ) -> Result<String> {
        let mut manifests = Vec::with_capacity(entries.len());
        for entry in entries {
            manifests.push(self.describe_entry(entry).await?);
        }

        let annotations = metadata.index_annotations();
        let index = OciImageIndex {
            schema_version: 2,
            media_type: Some(OCI_IMAGE_INDEX_MEDIA_TYPE.to_string()),
            manifests,
            annotations: if annotations.is_empty() {
                None
            } else {
                Some(annotations.into_iter().collect())
            },
        };

        let oci_ref = Self::to_oci_reference(reference)?;
        let auth = self.auth.to_oci_auth();

        tracing::info!(
            reference = %reference,
            platforms = entries.len(),
            "Pushing image index"
        );

        self.client
            .push_manifest_list(&oci_ref, &auth, index)
            .await
            .map_err(|e| registry_error(RegistryErrorKind::Push, reference, e))?;

        self.client
            .fetch_manifest_digest(&oci_ref, &auth)
            .await
            .map_err(|e| registry_error(RegistryErrorKind::Push, reference, e))
    }
}

fn registry_error(
    kind: RegistryErrorKind,
    reference: &ImageReference,
    err: OciDistributionError,
) -> MantleError {
    MantleError::RegistryError {
        kind,
        reference: reference.to_string(),
        message: err.to_string(),
    }
}

/// Whether a registry error means the manifest does not exist.
fn is_not_found(err: &OciDistributionError) -> bool {
    match err {
        OciDistributionError::ImageManifestNotFoundError(_) => true,
        OciDistributionError::ServerError { code, .. } => *code == 404,
        OciDistributionError::RegistryError { envelope, .. } => envelope
            .errors
            .iter()
            .any(|e| matches!(e.code, OciErrorCode::ManifestUnknown | OciErrorCode::NameUnknown)),
        _ => false,
    }
}

fn parse_manifest(
    bytes: &[u8],
    reference: &ImageReference,
    kind: RegistryErrorKind,
) -> Result<OciManifest> {
    serde_json::from_slice(bytes).map_err(|e| MantleError::RegistryError {
        kind,
        reference: reference.to_string(),
        message: format!("unrecognised manifest: {}", e),
    })
}

/// `mediaType` field of a raw manifest, if present.
fn declared_media_type(bytes: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(bytes)
        .ok()?
        .get("mediaType")?
        .as_str()
        .map(str::to_string)
}

fn index_architectures(index: &OciImageIndex) -> Vec<ArchitectureInfo> {
    index
        .manifests
        .iter()
        .map(|m| {
            let platform = m.platform.as_ref();
            ArchitectureInfo {
                os: platform.map(|p| p.os.clone()).unwrap_or_default(),
                architecture: platform.map(|p| p.architecture.clone()).unwrap_or_default(),
                variant: platform.and_then(|p| p.variant.clone()).unwrap_or_default(),
                digest: m.digest.clone(),
                size: m.size,
                media_type: m.media_type.clone(),
            }
        })
        .collect()
}

fn to_btree<'a, M>(map: Option<M>) -> BTreeMap<String, String>
where
    M: IntoIterator<Item = (&'a String, &'a String)>,
{
    map.map(|m| m.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
