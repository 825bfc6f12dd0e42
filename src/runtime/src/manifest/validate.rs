//! Digest record validation: format, freshness, uniqueness.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mantle_core::error::{MantleError, Result, ValidationKind};

use super::digest::DigestRecord;

/// Validate every record against the current time.
///
/// A `max_age` of zero disables the freshness check.
pub fn validate(records: &[DigestRecord], max_age: Duration) -> Result<()> {
    validate_at(records, max_age, Utc::now())
}

/// Validate every record against a fixed `now`.
pub fn validate_at(records: &[DigestRecord], max_age: Duration, now: DateTime<Utc>) -> Result<()> {
    let mut seen: HashMap<&str, &DigestRecord> = HashMap::new();

    for record in records {
        let path = record.source_path.display().to_string();

        if record.image_name.trim().is_empty() {
            return Err(MantleError::ValidationError {
                kind: ValidationKind::Malformed,
                path,
                message: "image name is empty".to_string(),
            });
        }

        if !is_valid_digest(&record.digest) {
            return Err(MantleError::ValidationError {
                kind: ValidationKind::Malformed,
                path,
                message: format!("invalid digest format: '{}'", record.digest),
            });
        }

        if !max_age.is_zero() {
            let age = now.signed_duration_since(record.modified_at);
            let age = age.to_std().unwrap_or(Duration::ZERO);
            if age > max_age {
                return Err(MantleError::ValidationError {
                    kind: ValidationKind::Stale,
                    path,
                    message: format!(
                        "digest file is {}s old, maximum age is {}s",
                        age.as_secs(),
                        max_age.as_secs()
                    ),
                });
            }
        }

        if let Some(previous) = seen.insert(record.architecture.as_str(), record) {
            return Err(MantleError::ValidationError {
                kind: ValidationKind::Duplicate,
                path,
                message: format!(
                    "architecture {} already provided by {}",
                    record.architecture,
                    previous.source_path.display()
                ),
            });
        }

        tracing::debug!(
            architecture = %record.architecture,
            digest = %record.digest,
            "Digest record valid"
        );
    }

    Ok(())
}

/// Whether `digest` is `algorithm:hex` for a supported algorithm.
///
/// The hex part must be lowercase and of the algorithm's exact length.
pub fn is_valid_digest(digest: &str) -> bool {
    let Some((algorithm, hex)) = digest.split_once(':') else {
        return false;
    };

    let expected_len = match algorithm {
        "sha256" => 64,
        "sha384" => 96,
        "sha512" => 128,
        _ => return false,
    };

    hex.len() == expected_len
        && hex
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
