use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MantleError, Result};

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "MANTLE_CONFIG";

/// Default verification concurrency when neither flag nor config sets one.
pub const DEFAULT_VERIFY_CONCURRENCY: usize = 5;

/// Mantle configuration
///
/// Loaded from `~/.config/mantle/config.yaml`, then overridden by
/// `MANTLE_*` environment variables, then by CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MantleConfig {
    /// Log level
    pub log_level: LogLevel,

    /// Manifest assembly settings
    pub manifests: ManifestsConfig,

    /// Target registry settings
    pub registry: RegistryConfig,
}

impl MantleConfig {
    /// Path of the config file: `$MANTLE_CONFIG`, else `<config_dir>/mantle/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        dirs::config_dir().map(|d| d.join("mantle").join("config.yaml"))
    }

    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|e| {
            MantleError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(&data).map_err(|e| {
            MantleError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.manifests.max_age()?;
        Ok(config)
    }

    /// Load from the default path and apply environment overrides.
    pub fn load_default() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `MANTLE_*` overrides using the given variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(registry) = get("MANTLE_REGISTRY") {
            self.registry.registry = Some(registry);
        }
        if let Some(namespace) = get("MANTLE_NAMESPACE") {
            self.registry.namespace = Some(namespace);
        }
        if let Some(auth_file) = get("MANTLE_AUTH_FILE") {
            self.registry.auth_file = Some(PathBuf::from(auth_file));
        }
        if let Some(dir) = get("MANTLE_DIGEST_DIR") {
            self.manifests.digest_dir = PathBuf::from(dir);
        }
        if let Some(value) = get("MANTLE_VERIFY_CONCURRENCY") {
            self.manifests.verify_concurrency = value.trim().parse().map_err(|_| {
                MantleError::ConfigError(format!(
                    "MANTLE_VERIFY_CONCURRENCY must be a positive integer, got '{}'",
                    value
                ))
            })?;
        }
        Ok(())
    }
}

/// Manifest assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestsConfig {
    /// Directory holding `digest-<image>-<arch>.*` files
    pub digest_dir: PathBuf,

    /// Concurrent registry verifications
    pub verify_concurrency: usize,

    /// Maximum digest file age (e.g. "1h", "30m"; "0" disables)
    #[serde(deserialize_with = "string_or_seconds")]
    pub max_age: String,

    /// Architectures that must be present
    pub required_architectures: Vec<String>,

    /// Publish whatever subset of required architectures exists
    pub best_effort: bool,

    /// Build backend: "auto", "buildx" or "registry"
    pub backend: String,
}

impl Default for ManifestsConfig {
    fn default() -> Self {
        Self {
            digest_dir: PathBuf::from("."),
            verify_concurrency: DEFAULT_VERIFY_CONCURRENCY,
            max_age: "0".to_string(),
            required_architectures: Vec::new(),
            best_effort: false,
            backend: "auto".to_string(),
        }
    }
}

impl ManifestsConfig {
    /// Parsed `max_age`. Zero disables freshness checking.
    pub fn max_age(&self) -> Result<Duration> {
        parse_duration(&self.max_age)
            .map_err(|e| MantleError::ConfigError(format!("manifests.max_age: {}", e)))
    }
}

/// Accept `max_age: 3600` as well as `max_age: "1h"`.
fn string_or_seconds<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Seconds(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Seconds(n) => n.to_string(),
    })
}

/// Registry configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Registry host, optionally with a path (e.g. "ghcr.io")
    pub registry: Option<String>,

    /// Namespace/organization under the registry
    pub namespace: Option<String>,

    /// Docker-style auth file
    pub auth_file: Option<PathBuf>,
}

/// Log level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string for an `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Parse a duration string like "90s", "30m", "1h30m", "2d" or "0".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err("empty duration value".to_string());
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(format!("invalid duration value: {s}"));
        }
        let multiplier = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => return Err(format!("invalid duration unit '{c}' in {s}")),
        };
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("invalid duration value: {s}"))?;
        total += n * multiplier;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(format!("missing unit in duration: {s}"));
    }

    Ok(Duration::from_secs(total))
}
