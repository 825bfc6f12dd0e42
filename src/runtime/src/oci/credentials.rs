//! Docker-style registry auth file.
//!
//! Reads and writes the `auths` section of `~/.docker/config.json` (or any
//! file with the same layout). Each entry stores `base64(username:password)`.
//! Keys the file carries for other tools are preserved on write.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use mantle_core::error::{MantleError, Result};
use serde::{Deserialize, Serialize};

/// Key Docker uses for Docker Hub credentials.
const DOCKER_HUB_AUTH_KEY: &str = "https://index.docker.io/v1/";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

/// Registry credentials backed by a docker-style auth file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at `~/.docker/config.json`.
    pub fn default_path() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            MantleError::ConfigError("Cannot determine home directory for auth file".to_string())
        })?;
        Ok(Self {
            path: home.join(".docker").join("config.json"),
        })
    }

    /// Store at a custom path (`--auth-file`).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Explicit path if given, otherwise the default location.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Ok(Self::new(p)),
            None => Self::default_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store credentials for a registry, replacing any existing entry.
    pub fn store(&self, registry: &str, username: &str, password: &str) -> Result<()> {
        let mut file = self.load()?;
        let encoded = BASE64.encode(format!("{}:{}", username, password));
        file.auths.insert(
            normalize_registry(registry),
            AuthEntry {
                auth: Some(encoded),
                ..Default::default()
            },
        );
        self.save(&file)
    }

    /// Credentials for a registry as `(username, password)`.
    pub fn get(&self, registry: &str) -> Result<Option<(String, String)>> {
        let file = self.load()?;
        let Some(entry) = file.auths.get(&normalize_registry(registry)) else {
            return Ok(None);
        };

        if let Some(auth) = entry.auth.as_deref().filter(|a| !a.is_empty()) {
            return decode_auth(auth).map(Some);
        }

        match (&entry.username, &entry.password) {
            (Some(u), Some(p)) => Ok(Some((u.clone(), p.clone()))),
            _ => Ok(None),
        }
    }

    /// Remove credentials for a registry. Returns true if an entry existed.
    pub fn remove(&self, registry: &str) -> Result<bool> {
        let mut file = self.load()?;
        let removed = file.auths.remove(&normalize_registry(registry)).is_some();
        if removed {
            self.save(&file)?;
        }
        Ok(removed)
    }

    /// Registries with stored credentials, sorted.
    pub fn list_registries(&self) -> Result<Vec<String>> {
        Ok(self.load()?.auths.into_keys().collect())
    }

    fn load(&self) -> Result<AuthFile> {
        if !self.path.exists() {
            return Ok(AuthFile::default());
        }
        let data = std::fs::read_to_string(&self.path).map_err(|e| {
            MantleError::ConfigError(format!(
                "Failed to read auth file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        if data.trim().is_empty() {
            return Ok(AuthFile::default());
        }
        serde_json::from_str(&data).map_err(|e| {
            MantleError::ConfigError(format!(
                "Failed to parse auth file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Write tmp then rename.
    fn save(&self, file: &AuthFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp_path = self.path.with_extension("tmp");
        let data = serde_json::to_string_pretty(file)?;
        std::fs::write(&tmp_path, data)?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            MantleError::ConfigError(format!(
                "Failed to replace auth file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

fn decode_auth(encoded: &str) -> Result<(String, String)> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| MantleError::ConfigError(format!("Invalid auth entry encoding: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| MantleError::ConfigError(format!("Invalid auth entry encoding: {}", e)))?;
    let (username, password) = text.split_once(':').ok_or_else(|| {
        MantleError::ConfigError("Invalid auth entry: expected username:password".to_string())
    })?;
    Ok((username.to_string(), password.to_string()))
}

/// Map Docker Hub aliases to the key Docker itself writes.
fn normalize_registry(registry: &str) -> String {
    let r = registry
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_lowercase();
    match r.as_str() {
        "docker.io" | "index.docker.io" | "registry-1.docker.io" | "index.docker.io/v1" => {
            DOCKER_HUB_AUTH_KEY.to_string()
        }
        _ => r,
    }
}
