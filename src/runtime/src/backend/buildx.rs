//! Docker Buildx backend.
//!
//! Drives the `docker` CLI: `docker tag`, `docker push` and
//! `docker buildx imagetools create` for manifest lists.

use std::process::Output;

use async_trait::async_trait;
use mantle_core::error::{MantleError, Result};
use tokio::process::Command;

use super::ImageBackend;
use crate::manifest::{ManifestEntry, ManifestMetadata};

const BACKEND_NAME: &str = "buildx";

/// Backend that shells out to `docker buildx`.
#[derive(Debug, Clone)]
pub struct BuildxBackend {
    program: String,
}

impl Default for BuildxBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildxBackend {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// Use a specific docker binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<Output> {
        tracing::debug!(program = %self.program, args = ?args, "Running docker command");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|e| MantleError::BackendError {
                backend: BACKEND_NAME.to_string(),
                message: format!("failed to run {}: {} (is docker installed?)", self.program, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MantleError::BackendError {
                backend: BACKEND_NAME.to_string(),
                message: format!(
                    "{} {} exited with {}: {}",
                    self.program,
                    args.first().map(String::as_str).unwrap_or_default(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl ImageBackend for BuildxBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn check_available(&self) -> Result<()> {
        let output = self
            .run(&["buildx".to_string(), "version".to_string()])
            .await?;
        tracing::debug!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "Docker buildx available"
        );
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.run(&["tag".to_string(), source.to_string(), target.to_string()])
            .await?;
        tracing::info!(source = %source, target = %target, "Tagged image");
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<String> {
        let output = self
            .run(&["push".to_string(), reference.to_string()])
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let digest = parse_push_digest(&stdout).ok_or_else(|| MantleError::BackendError {
            backend: BACKEND_NAME.to_string(),
            message: format!("no digest in docker push output for {}", reference),
        })?;

        tracing::info!(reference = %reference, digest = %digest, "Pushed image");
        Ok(digest)
    }

    async fn create_and_push_manifest(
        &self,
        manifest_name: &str,
        entries: &[ManifestEntry],
        metadata: &ManifestMetadata,
    ) -> Result<()> {
        let args = imagetools_create_args(manifest_name, entries, metadata);
        self.run(&args).await?;

        tracing::info!(
            manifest = %manifest_name,
            platforms = entries.len(),
            "Created and pushed manifest list"
        );
        Ok(())
    }
}

/// Arguments for `docker buildx imagetools create`.
fn imagetools_create_args(
    manifest_name: &str,
    entries: &[ManifestEntry],
    metadata: &ManifestMetadata,
) -> Vec<String> {
    let mut args = vec![
        "buildx".to_string(),
        "imagetools".to_string(),
        "create".to_string(),
        "--tag".to_string(),
        manifest_name.to_string(),
    ];

    for (key, value) in metadata.index_annotations() {
        args.push("--annotation".to_string());
        args.push(format!("index:{}={}", key, value));
    }

    args.extend(entries.iter().map(|e| e.image_ref.clone()));
    args
}

/// Digest from the final `<tag>: digest: sha256:... size: N` line.
fn parse_push_digest(output: &str) -> Option<String> {
    output.lines().rev().find_map(|line| {
        let (_, rest) = line.split_once("digest: ")?;
        let digest = rest.split_whitespace().next()?;
        digest.contains(':').then(|| digest.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(image_ref: &str) -> ManifestEntry {
        ManifestEntry {
            image_ref: image_ref.to_string(),
            digest: image_ref.rsplit('@').next().unwrap().to_string(),
            platform: "linux/amd64".to_string(),
            architecture: "amd64".to_string(),
            os: "linux".to_string(),
            variant: String::new(),
        }
    }

    #[test]
    fn test_imagetools_args() {
        let meta = ManifestMetadata::from_pairs(&["org.opencontainers.image.version=1.0".to_string()], &[])
            .unwrap();
        let args = imagetools_create_args(
            "ghcr.io/org/app:latest",
            &[entry("ghcr.io/org/app@sha256:aaa"), entry("ghcr.io/org/app@sha256:bbb")],
            &meta,
        );
        assert_eq!(
            args,
            vec![
                "buildx",
                "imagetools",
                "create",
                "--tag",
                "ghcr.io/org/app:latest",
                "--annotation",
                "index:org.opencontainers.image.version=1.0",
                "ghcr.io/org/app@sha256:aaa",
                "ghcr.io/org/app@sha256:bbb",
            ]
        );
    }

    #[test]
    fn test_parse_push_digest() {
        let output = "The push refers to repository [ghcr.io/org/app]\n\
                      5f70bf18a086: Pushed\n\
                      latest: digest: sha256:0123abcd size: 1573\n";
        assert_eq!(parse_push_digest(output).as_deref(), Some("sha256:0123abcd"));
        assert_eq!(parse_push_digest("nothing here"), None);
    }

    #[tokio::test]
    async fn test_availability_check_fails_without_binary() {
        let backend = BuildxBackend::with_program("/nonexistent/docker-binary");
        let err = backend.check_available().await.unwrap_err();
        assert!(matches!(err, MantleError::BackendError { .. }));
    }
}
