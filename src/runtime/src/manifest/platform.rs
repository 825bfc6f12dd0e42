//! Platform parsing for architecture strings.
//!
//! Architecture strings come from digest file names and operator flags.
//! They are either a bare architecture (`amd64`) or an architecture with a
//! variant (`arm/v7`). Every target is a Linux image.

use std::fmt;

/// Operating system for every manifest entry.
pub const DEFAULT_OS: &str = "linux";

/// Normalized platform triple derived from an architecture string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformInfo {
    /// CPU architecture (e.g. "amd64", "arm64", "arm")
    pub architecture: String,
    /// Architecture variant (e.g. "v7"), empty when absent
    pub variant: String,
    /// Operating system, always "linux"
    pub os: String,
}

impl PlatformInfo {
    /// Parse an architecture string such as `amd64` or `arm/v7`.
    ///
    /// The first `/` segment is the architecture, the second (if any) the
    /// variant. Further segments are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.trim().split('/');
        let architecture = parts.next().unwrap_or_default().to_string();
        let variant = parts.next().unwrap_or_default().to_string();

        Self {
            architecture,
            variant,
            os: DEFAULT_OS.to_string(),
        }
    }

    /// Variant as an option, for registry descriptors.
    pub fn variant(&self) -> Option<&str> {
        if self.variant.is_empty() {
            None
        } else {
            Some(&self.variant)
        }
    }
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variant.is_empty() {
            write!(f, "{}/{}", self.os, self.architecture)
        } else {
            write!(f, "{}/{}/{}", self.os, self.architecture, self.variant)
        }
    }
}

/// Parse an architecture string into its platform triple.
pub fn parse_platform(raw: &str) -> PlatformInfo {
    PlatformInfo::parse(raw)
}

/// Normalize the filename-safe spelling `arm-v7` to `arm/v7`.
///
/// Only a trailing `-v<digits>` segment is treated as a variant; anything
/// else is returned trimmed and unchanged.
pub fn normalize_architecture(raw: &str) -> String {
    let raw = raw.trim();
    if let Some((arch, variant)) = raw.rsplit_once('-') {
        if !arch.is_empty() && is_variant(variant) {
            return format!("{}/{}", arch, variant);
        }
    }
    raw.to_string()
}

/// Filename-safe spelling of an architecture (`arm/v7` → `arm-v7`).
pub fn file_architecture(architecture: &str) -> String {
    architecture.trim().replace('/', "-")
}

fn is_variant(s: &str) -> bool {
    s.len() > 1 && s.starts_with('v') && s[1..].chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_arm_v7() {
        let p = parse_platform("arm/v7");
        assert_eq!(p.architecture, "arm");
        assert_eq!(p.variant, "v7");
        assert_eq!(p.os, "linux");
    }

    #[test]
    fn test_parse_bare_architecture() {
        let p = parse_platform("amd64");
        assert_eq!(p.architecture, "amd64");
        assert_eq!(p.variant, "");
        assert_eq!(p.os, "linux");
        assert_eq!(p.variant(), None);
    }

    #[test]
    fn test_parse_ignores_extra_segments() {
        let p = parse_platform("arm64/v8/extra");
        assert_eq!(p.architecture, "arm64");
        assert_eq!(p.variant, "v8");
    }

    #[test]
    fn test_display() {
        assert_eq!(parse_platform("amd64").to_string(), "linux/amd64");
        assert_eq!(parse_platform("arm/v7").to_string(), "linux/arm/v7");
    }

    #[test]
    fn test_normalize_architecture() {
        assert_eq!(normalize_architecture("arm-v7"), "arm/v7");
        assert_eq!(normalize_architecture("arm64-v8"), "arm64/v8");
        assert_eq!(normalize_architecture("amd64"), "amd64");
        assert_eq!(normalize_architecture("arm/v6"), "arm/v6");
        assert_eq!(normalize_architecture("base-amd64"), "base-amd64");
        assert_eq!(normalize_architecture(" ppc64le "), "ppc64le");
    }

    #[test]
    fn test_file_architecture() {
        assert_eq!(file_architecture("arm/v7"), "arm-v7");
        assert_eq!(file_architecture("amd64"), "amd64");
    }
}
