//! Mantle Runtime - manifest pipeline implementation.
//!
//! Discovers per-architecture digest files, checks them, and publishes a
//! multi-architecture manifest list through a pluggable build backend.

#![allow(clippy::result_large_err)]

pub mod backend;
pub mod manifest;
pub mod oci;

// Re-export common types
pub use backend::{select_backend, BackendKind, BuildxBackend, ImageBackend, RegistryBackend};
pub use manifest::{
    DigestRecord, ManifestEntry, ManifestMetadata, ManifestPipeline, ManifestTarget,
    PipelineOptions, PipelineReport, PlatformInfo, PublishOutcome, Publisher,
};
pub use oci::{
    ArchitectureInfo, CredentialStore, ImageReference, ManifestInfo, ManifestRegistry,
    RegistryAuth, RegistryClient,
};

/// Mantle runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
