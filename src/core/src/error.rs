use std::fmt;

use thiserror::Error;

/// Exit code for setup, discovery, validation and filtering failures.
pub const EXIT_VALIDATION_ERROR: i32 = 1;

/// Exit code for registry connectivity or query failures.
pub const EXIT_REGISTRY_ERROR: i32 = 2;

/// Exit code when a source digest is missing from the registry.
pub const EXIT_DIGEST_NOT_FOUND: i32 = 3;

/// Exit code for a run interrupted by the operator.
pub const EXIT_CANCELLED: i32 = 130;

/// Why a digest record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// Digest is not `algorithm:hex`, or the record has no image name
    Malformed,
    /// Digest file is older than the configured maximum age
    Stale,
    /// Two records describe the same architecture
    Duplicate,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::Malformed => write!(f, "malformed"),
            ValidationKind::Stale => write!(f, "stale"),
            ValidationKind::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Which registry interaction failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryErrorKind {
    HealthCheck,
    Verify,
    Exists,
    Inspect,
    Push,
}

impl fmt::Display for RegistryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryErrorKind::HealthCheck => write!(f, "health check"),
            RegistryErrorKind::Verify => write!(f, "verify"),
            RegistryErrorKind::Exists => write!(f, "exists"),
            RegistryErrorKind::Inspect => write!(f, "inspect"),
            RegistryErrorKind::Push => write!(f, "push"),
        }
    }
}

/// Mantle error types
#[derive(Error, Debug)]
pub enum MantleError {
    /// Digest directory missing, unreadable, or empty
    #[error("Digest discovery failed in {directory} (pattern {pattern}): {message}")]
    DiscoveryError {
        directory: String,
        pattern: String,
        message: String,
    },

    /// A digest record failed validation
    #[error("Digest validation failed ({kind}) for {path}: {message}")]
    ValidationError {
        kind: ValidationKind,
        path: String,
        message: String,
    },

    /// Required architectures are missing and best-effort mode is off
    #[error(
        "Missing required architectures: {} (use --best-effort to create a partial manifest)",
        .missing.join(", ")
    )]
    FilterError { missing: Vec<String> },

    /// Filtering left nothing to publish
    #[error("No valid architectures found after filtering")]
    NoArchitectures,

    /// Registry interaction failed
    #[error("Registry {kind} error for {reference}: {message}")]
    RegistryError {
        kind: RegistryErrorKind,
        reference: String,
        message: String,
    },

    /// Creating or pushing the manifest list for one tag failed
    #[error("Failed to push manifest for tag {tag}: {message}")]
    PushError { tag: String, message: String },

    /// Some tags failed during publication
    #[error("Failed to push {failed} of {total} tag(s): {}", .failed_tags.join(", "))]
    PublishFailed {
        failed: usize,
        total: usize,
        failed_tags: Vec<String>,
    },

    /// Build backend command failed
    #[error("Backend error: {backend} - {message}")]
    BackendError { backend: String, message: String },

    /// No build backend could be initialised
    #[error("No build backend available: {0}")]
    NoBackendAvailable(String),

    /// Operation not supported by the selected backend
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Run was cancelled before the operation completed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl MantleError {
    /// Process exit code the CLI should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MantleError::RegistryError {
                kind: RegistryErrorKind::Verify,
                ..
            } => EXIT_DIGEST_NOT_FOUND,
            MantleError::RegistryError { .. } => EXIT_REGISTRY_ERROR,
            MantleError::Cancelled(_) => EXIT_CANCELLED,
            _ => EXIT_VALIDATION_ERROR,
        }
    }

    /// Whether the error was raised before any registry contact.
    pub fn is_pre_registry(&self) -> bool {
        matches!(
            self,
            MantleError::DiscoveryError { .. }
                | MantleError::ValidationError { .. }
                | MantleError::FilterError { .. }
                | MantleError::NoArchitectures
        )
    }
}

impl From<serde_json::Error> for MantleError {
    fn from(err: serde_json::Error) -> Self {
        MantleError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for MantleError {
    fn from(err: serde_yaml::Error) -> Self {
        MantleError::SerializationError(err.to_string())
    }
}

/// Result type alias for mantle operations
pub type Result<T> = std::result::Result<T, MantleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_display() {
        let error = MantleError::DiscoveryError {
            directory: "/tmp/digests".to_string(),
            pattern: "digest-img-*.*".to_string(),
            message: "no digest files found".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Digest discovery failed in /tmp/digests (pattern digest-img-*.*): no digest files found"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let error = MantleError::ValidationError {
            kind: ValidationKind::Stale,
            path: "digest-img-amd64.txt".to_string(),
            message: "age 2h exceeds 1h".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Digest validation failed (stale) for digest-img-amd64.txt: age 2h exceeds 1h"
        );
    }

    #[test]
    fn test_filter_error_lists_missing() {
        let error = MantleError::FilterError {
            missing: vec!["arm64".to_string(), "arm/v7".to_string()],
        };
        assert!(error.to_string().contains("arm64, arm/v7"));
        assert!(error.to_string().contains("--best-effort"));
    }

    #[test]
    fn test_publish_failed_display() {
        let error = MantleError::PublishFailed {
            failed: 1,
            total: 2,
            failed_tags: vec!["v1.0".to_string()],
        };
        assert_eq!(error.to_string(), "Failed to push 1 of 2 tag(s): v1.0");
    }

    #[test]
    fn test_registry_error_display() {
        let error = MantleError::RegistryError {
            kind: RegistryErrorKind::Verify,
            reference: "ghcr.io/org/img@sha256:abc".to_string(),
            message: "manifest unknown".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Registry verify error for ghcr.io/org/img@sha256:abc: manifest unknown"
        );
    }

    #[test]
    fn test_exit_codes() {
        let verify = MantleError::RegistryError {
            kind: RegistryErrorKind::Verify,
            reference: "r".to_string(),
            message: "m".to_string(),
        };
        let health = MantleError::RegistryError {
            kind: RegistryErrorKind::HealthCheck,
            reference: "r".to_string(),
            message: "m".to_string(),
        };
        assert_eq!(verify.exit_code(), EXIT_DIGEST_NOT_FOUND);
        assert_eq!(health.exit_code(), EXIT_REGISTRY_ERROR);
        assert_eq!(MantleError::NoArchitectures.exit_code(), EXIT_VALIDATION_ERROR);
        assert_eq!(
            MantleError::Cancelled("interrupted".to_string()).exit_code(),
            EXIT_CANCELLED
        );
    }

    #[test]
    fn test_pre_registry_classification() {
        assert!(MantleError::NoArchitectures.is_pre_registry());
        assert!(MantleError::FilterError { missing: vec![] }.is_pre_registry());
        assert!(!MantleError::Other("x".to_string()).is_pre_registry());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: MantleError = io_error.into();
        assert!(matches!(error, MantleError::IoError(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ invalid");
        let error: MantleError = result.unwrap_err().into();
        assert!(matches!(error, MantleError::SerializationError(_)));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let error: MantleError = result.unwrap_err().into();
        assert!(matches!(error, MantleError::SerializationError(_)));
    }
}
