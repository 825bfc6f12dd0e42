//! Image reference parsing and construction.
//!
//! Handles references like `ghcr.io/org/app:v1.0` and
//! `ghcr.io/org/app@sha256:...`, and builds the references the manifest
//! pipeline addresses from registry, namespace, image name and tag.

use mantle_core::error::{MantleError, Result};

/// Registry assumed when a reference names none.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag assumed when a reference has neither tag nor digest.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry host, optionally with port (`ghcr.io`, `localhost:5000`)
    pub registry: String,
    /// Repository path (`org/app`)
    pub repository: String,
    pub tag: Option<String>,
    /// Digest (`sha256:...`)
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference string.
    ///
    /// - `app` → docker.io/library/app:latest
    /// - `org/app:v1` → docker.io/org/app:v1
    /// - `ghcr.io/org/app:v1` → ghcr.io/org/app:v1
    /// - `ghcr.io/org/app@sha256:...` → digest reference, no tag
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(MantleError::ConfigError("Empty image reference".to_string()));
        }

        let (name_tag, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                if !digest.contains(':') {
                    return Err(MantleError::ConfigError(format!(
                        "Invalid digest in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A tag is a ':' after the last '/'; a ':' before it belongs to a port.
        let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_segment_start..].rfind(':') {
            Some(colon) => {
                let split = last_segment_start + colon;
                (&name_tag[..split], Some(name_tag[split + 1..].to_string()))
            }
            None => (name_tag, None),
        };

        if tag.as_deref() == Some("") {
            return Err(MantleError::ConfigError(format!(
                "Empty tag in reference '{}'",
                reference
            )));
        }

        let (registry, repository) = split_registry_repository(name)?;

        let tag = if tag.is_none() && digest.is_none() {
            Some(DEFAULT_TAG.to_string())
        } else {
            tag
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// `registry[/namespace]/name:tag`
    pub fn tagged(registry: &str, namespace: &str, name: &str, tag: &str) -> Self {
        let (registry, repository) = registry_and_repository(registry, namespace, name);
        Self {
            registry,
            repository,
            tag: Some(tag.to_string()),
            digest: None,
        }
    }

    /// Same repository, addressed by `digest` instead of tag.
    pub fn with_digest(&self, digest: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: None,
            digest: Some(digest.to_string()),
        }
    }

    /// `registry/repository` without tag or digest.
    pub fn repository_reference(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    pub fn full_reference(&self) -> String {
        let mut s = self.repository_reference();
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

/// `registry[/namespace]/name`, with an empty namespace omitted.
pub fn repository_path(registry: &str, namespace: &str, name: &str) -> String {
    let registry = registry.trim().trim_end_matches('/');
    let namespace = namespace.trim().trim_matches('/');
    if namespace.is_empty() {
        format!("{}/{}", registry, name)
    } else {
        format!("{}/{}/{}", registry, namespace, name)
    }
}

/// `registry[/namespace]/name:tag`
pub fn manifest_reference(registry: &str, namespace: &str, name: &str, tag: &str) -> String {
    format!("{}:{}", repository_path(registry, namespace, name), tag)
}

fn registry_and_repository(registry: &str, namespace: &str, name: &str) -> (String, String) {
    let namespace = namespace.trim().trim_matches('/');
    let repository = if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", namespace, name)
    };
    (registry.trim().trim_end_matches('/').to_string(), repository)
}

/// The first segment is a registry if it has a '.' or ':' or is `localhost`.
fn split_registry_repository(name: &str) -> Result<(String, String)> {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            if rest.is_empty() {
                return Err(MantleError::ConfigError(format!(
                    "Empty repository in reference '{}'",
                    name
                )));
            }
            return Ok((first.to_string(), rest.to_string()));
        }
    }

    if name.is_empty() {
        return Err(MantleError::ConfigError("Empty repository name".to_string()));
    }

    let repository = if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{}", name)
    };

    Ok((DEFAULT_REGISTRY.to_string(), repository))
}
