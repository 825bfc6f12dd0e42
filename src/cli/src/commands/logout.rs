//! `mantle logout` command: remove stored registry credentials.

use std::path::PathBuf;

use clap::Args;
use mantle_core::config::MantleConfig;
use mantle_runtime::CredentialStore;

use super::auth_file;
use super::login::server_or_default;

#[derive(Args)]
pub struct LogoutArgs {
    /// Registry server (default: the configured registry, else docker.io)
    pub server: Option<String>,

    /// Remove credentials for every registry in the auth file
    #[arg(long, conflicts_with = "server")]
    pub all: bool,

    /// Auth file to edit (default: ~/.docker/config.json)
    #[arg(long)]
    pub auth_file: Option<PathBuf>,
}

pub async fn execute(
    args: LogoutArgs,
    config: &MantleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::resolve(auth_file(args.auth_file.as_deref(), config))?;

    if args.all {
        let registries = store.list_registries()?;
        if registries.is_empty() {
            println!("No stored credentials in {}", store.path().display());
        }
        for registry in registries {
            store.remove(&registry)?;
            println!("Removing login credentials for {}", registry);
        }
        return Ok(());
    }

    let server = server_or_default(args.server, config);
    if store.remove(&server)? {
        println!("Removing login credentials for {}", server);
    } else {
        println!("Not logged in to {}", server);
    }

    Ok(())
}
