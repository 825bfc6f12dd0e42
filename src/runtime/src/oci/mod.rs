//! OCI registry support.
//!
//! - `reference`: image reference parsing and construction
//! - `credentials`: docker-style auth file
//! - `registry`: the `ManifestRegistry` seam and its `oci-distribution` client

pub mod credentials;
pub mod reference;
pub mod registry;

pub use credentials::CredentialStore;
pub use reference::ImageReference;
pub use registry::{
    ArchitectureInfo, ManifestInfo, ManifestRegistry, RegistryAuth, RegistryClient,
    DOCKER_MANIFEST_LIST_MEDIA_TYPE, DOCKER_MANIFEST_MEDIA_TYPE, OCI_IMAGE_INDEX_MEDIA_TYPE,
    OCI_IMAGE_MANIFEST_MEDIA_TYPE,
};
