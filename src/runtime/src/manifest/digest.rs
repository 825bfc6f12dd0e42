//! Per-architecture digest files.
//!
//! Each architecture build job writes its pushed image digest to a file
//! named `digest-<image>-<arch>.<ext>`. The reader collects those files for
//! one image; `save_digest` is the producing side of the same convention.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mantle_core::error::{MantleError, Result};

use super::platform::{file_architecture, normalize_architecture};

/// Filename prefix shared by every digest file.
pub const DIGEST_FILE_PREFIX: &str = "digest-";

/// Extension used when writing digest files.
pub const DIGEST_FILE_EXTENSION: &str = "txt";

/// One discovered per-architecture build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestRecord {
    /// Image name the digest belongs to
    pub image_name: String,
    /// Architecture, normalized (`arm/v7`, `amd64`)
    pub architecture: String,
    /// Content digest (`sha256:<hex>`)
    pub digest: String,
    /// File the record was read from
    pub source_path: PathBuf,
    /// Modification time of the file
    pub modified_at: DateTime<Utc>,
}

/// Glob-style pattern describing the files `discover` looks for.
pub fn digest_pattern(image_name: &str) -> String {
    format!("{}{}-*.*", DIGEST_FILE_PREFIX, image_name)
}

/// File name for a digest file of `image_name` / `architecture`.
pub fn digest_file_name(image_name: &str, architecture: &str) -> String {
    format!(
        "{}{}-{}.{}",
        DIGEST_FILE_PREFIX,
        image_name,
        file_architecture(architecture),
        DIGEST_FILE_EXTENSION
    )
}

/// Scan `dir` (non-recursively) for digest files belonging to `image_name`.
///
/// Returns an empty vector when nothing matches; the caller decides whether
/// that is an error. Records are ordered by file name.
pub fn discover(dir: &Path, image_name: &str) -> Result<Vec<DigestRecord>> {
    let pattern = digest_pattern(image_name);
    let discovery_error = |message: String| MantleError::DiscoveryError {
        directory: dir.display().to_string(),
        pattern: pattern.clone(),
        message,
    };

    if !dir.is_dir() {
        return Err(discovery_error("directory does not exist".to_string()));
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| discovery_error(format!("failed to read directory: {}", e)))?;

    let prefix = format!("{}{}-", DIGEST_FILE_PREFIX, image_name);
    let mut matches: Vec<(String, PathBuf, String)> = Vec::new();

    for entry in entries {
        let entry =
            entry.map_err(|e| discovery_error(format!("failed to read directory entry: {}", e)))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };

        let Some(rest) = file_name.strip_prefix(&prefix) else {
            continue;
        };

        // Architecture runs up to the first '.'; an extension is required.
        let Some((arch_token, _ext)) = rest.split_once('.') else {
            continue;
        };

        if !is_architecture_token(arch_token) {
            tracing::debug!(
                file = %file_name,
                image = %image_name,
                "Skipping file whose architecture segment is not an architecture name"
            );
            continue;
        }

        matches.push((file_name.clone(), path, normalize_architecture(arch_token)));
    }

    matches.sort_by(|a, b| a.0.cmp(&b.0));

    let mut records = Vec::with_capacity(matches.len());
    for (file_name, path, architecture) in matches {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| discovery_error(format!("failed to read {}: {}", file_name, e)))?;
        let modified = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| discovery_error(format!("failed to stat {}: {}", file_name, e)))?;

        let record = DigestRecord {
            image_name: image_name.to_string(),
            architecture,
            digest: content.trim().to_string(),
            source_path: path,
            modified_at: DateTime::<Utc>::from(modified),
        };

        tracing::debug!(
            file = %file_name,
            architecture = %record.architecture,
            digest = %record.digest,
            "Discovered digest file"
        );
        records.push(record);
    }

    Ok(records)
}

/// Write a digest file for `image_name` / `architecture` into `dir`.
///
/// Creates `dir` if needed. Returns the path of the written file.
pub fn save_digest(
    dir: &Path,
    image_name: &str,
    architecture: &str,
    digest: &str,
) -> Result<PathBuf> {
    let digest = digest.trim();
    if digest.is_empty() {
        return Err(MantleError::Other(format!(
            "Refusing to write empty digest for {} ({})",
            image_name, architecture
        )));
    }
    if image_name.trim().is_empty() || architecture.trim().is_empty() {
        return Err(MantleError::Other(
            "Image name and architecture are required to save a digest".to_string(),
        ));
    }

    // Only write names `discover` will pick up again.
    let architecture = normalize_architecture(&architecture.to_lowercase());
    if !is_architecture_token(&file_architecture(&architecture)) {
        return Err(MantleError::ConfigError(format!(
            "Invalid architecture '{}' (expected e.g. amd64, arm64, arm/v7)",
            architecture
        )));
    }

    std::fs::create_dir_all(dir)?;
    let path = dir.join(digest_file_name(image_name, &architecture));
    std::fs::write(&path, format!("{}\n", digest))?;

    tracing::info!(
        path = %path.display(),
        architecture = %architecture,
        digest = %digest,
        "Saved digest file"
    );

    Ok(path)
}

/// Whether `token` looks like `amd64`, `arm64` or `arm-v7`.
fn is_architecture_token(token: &str) -> bool {
    let base = match token.split_once("-v") {
        Some((base, variant)) => {
            if variant.is_empty() || !variant.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            base
        }
        None => token,
    };

    !base.is_empty()
        && base
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
