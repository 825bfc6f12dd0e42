//! Annotations and labels attached to a published manifest list.

use std::collections::BTreeMap;

use mantle_core::error::{MantleError, Result};
use serde::{Deserialize, Serialize};

/// Operator-supplied metadata for the manifest list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ManifestMetadata {
    /// Parse `key=value` pairs for annotations and labels.
    pub fn from_pairs(annotations: &[String], labels: &[String]) -> Result<Self> {
        Ok(Self {
            annotations: parse_key_values(annotations)?,
            labels: parse_key_values(labels)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.labels.is_empty()
    }

    /// Annotations to write on the image index.
    ///
    /// An index has no config blob to carry labels, so labels become
    /// annotations. An explicit annotation with the same key wins.
    pub fn index_annotations(&self) -> BTreeMap<String, String> {
        let mut merged = self.labels.clone();
        for (key, value) in &self.annotations {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// Split `key=value` on the first `=`, trimming both sides.
pub fn parse_key_value(pair: &str) -> Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| MantleError::ConfigError(format!("Invalid key=value pair: '{}'", pair)))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(MantleError::ConfigError(format!(
            "Empty key in key=value pair: '{}'",
            pair
        )));
    }

    Ok((key.to_string(), value.trim().to_string()))
}

fn parse_key_values(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    pairs.iter().map(|p| parse_key_value(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value(" org.opencontainers.image.source = https://x/y ").unwrap(),
            (
                "org.opencontainers.image.source".to_string(),
                "https://x/y".to_string()
            )
        );
        assert_eq!(
            parse_key_value("k=a=b").unwrap(),
            ("k".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_key_value("k=").unwrap(), ("k".to_string(), String::new()));
    }

    #[test]
    fn test_parse_key_value_errors() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value(" =value").is_err());
    }

    #[test]
    fn test_from_pairs() {
        let meta = ManifestMetadata::from_pairs(
            &["a=1".to_string()],
            &["b=2".to_string(), "c=3".to_string()],
        )
        .unwrap();
        assert_eq!(meta.annotations.len(), 1);
        assert_eq!(meta.labels.len(), 2);
        assert!(!meta.is_empty());
        assert!(ManifestMetadata::default().is_empty());
    }

    #[test]
    fn test_index_annotations_prefers_annotation() {
        let meta = ManifestMetadata::from_pairs(
            &["version=2".to_string()],
            &["version=1".to_string(), "team=infra".to_string()],
        )
        .unwrap();
        let merged = meta.index_annotations();
        assert_eq!(merged.get("version").map(String::as_str), Some("2"));
        assert_eq!(merged.get("team").map(String::as_str), Some("infra"));
    }
}
