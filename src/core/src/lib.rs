//! Mantle Core - Foundational Types
//!
//! Error taxonomy and configuration shared by the manifest pipeline
//! and the command-line interface.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{LogLevel, ManifestsConfig, MantleConfig, RegistryConfig};
pub use error::{MantleError, RegistryErrorKind, Result, ValidationKind};

/// Mantle version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
