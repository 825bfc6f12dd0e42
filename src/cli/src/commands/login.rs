//! `mantle login` command: store registry credentials.

use std::io::BufRead;
use std::path::PathBuf;

use clap::Args;
use mantle_core::config::MantleConfig;
use mantle_runtime::CredentialStore;

use super::auth_file;

#[derive(Args)]
pub struct LoginArgs {
    /// Registry server (default: the configured registry, else docker.io)
    pub server: Option<String>,

    /// Username
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Read password from stdin
    #[arg(long, conflicts_with = "password")]
    pub password_stdin: bool,

    /// Auth file to write (default: ~/.docker/config.json)
    #[arg(long)]
    pub auth_file: Option<PathBuf>,
}

pub async fn execute(
    args: LoginArgs,
    config: &MantleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let server = server_or_default(args.server, config);

    let username = match args.username {
        Some(u) => u,
        None => prompt("Username: ")?,
    };

    let password = if args.password_stdin {
        read_line()?
    } else {
        match args.password {
            Some(p) => p,
            None => prompt("Password: ")?,
        }
    };

    if username.is_empty() || password.is_empty() {
        return Err("Username and password are required".into());
    }

    let store = CredentialStore::resolve(auth_file(args.auth_file.as_deref(), config))?;
    store.store(&server, &username, &password)?;

    println!("Login Succeeded");
    Ok(())
}

/// Registry to log in to or out of when none is given.
pub(super) fn server_or_default(server: Option<String>, config: &MantleConfig) -> String {
    server
        .or_else(|| {
            config
                .registry
                .registry
                .as_deref()
                .map(|r| super::registry_host(r).to_string())
        })
        .unwrap_or_else(|| "docker.io".to_string())
}

fn prompt(label: &str) -> std::io::Result<String> {
    eprint!("{label}");
    read_line()
}

fn read_line() -> std::io::Result<String> {
    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let mut config = MantleConfig::default();
        assert_eq!(server_or_default(None, &config), "docker.io");

        config.registry.registry = Some("ghcr.io/org".to_string());
        assert_eq!(server_or_default(None, &config), "ghcr.io");
        assert_eq!(
            server_or_default(Some("quay.io".to_string()), &config),
            "quay.io"
        );
    }

    #[tokio::test]
    async fn test_login_writes_auth_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.json");

        let args = LoginArgs {
            server: Some("ghcr.io".to_string()),
            username: Some("user".to_string()),
            password: Some("token".to_string()),
            password_stdin: false,
            auth_file: Some(path.clone()),
        };
        execute(args, &MantleConfig::default()).await.unwrap();

        let store = CredentialStore::new(&path);
        assert_eq!(
            store.get("ghcr.io").unwrap(),
            Some(("user".to_string(), "token".to_string()))
        );
    }
}
