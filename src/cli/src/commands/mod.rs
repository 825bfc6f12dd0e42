//! CLI command definitions and dispatch.

mod digest;
mod login;
mod logout;
mod manifests;
mod push;
mod version;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mantle_core::config::MantleConfig;
use mantle_core::error::{MantleError, EXIT_VALIDATION_ERROR};
use mantle_runtime::{RegistryAuth, RegistryClient};
use tokio_util::sync::CancellationToken;

/// Mantle: assemble multi-architecture manifest lists from per-architecture builds.
#[derive(Parser)]
#[command(name = "mantle", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Config file (default: $MANTLE_CONFIG or ~/.config/mantle/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create, publish and inspect multi-architecture manifest lists
    #[command(subcommand)]
    Manifests(manifests::ManifestsCommand),
    /// Push a per-architecture image and record its digest file
    Push(push::PushArgs),
    /// Digest file helpers
    #[command(subcommand)]
    Digest(digest::DigestCommand),
    /// Store registry credentials in the auth file
    Login(login::LoginArgs),
    /// Remove registry credentials from the auth file
    Logout(logout::LogoutArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(
    cli: Cli,
    config: MantleConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Manifests(cmd) => manifests::execute(cmd, &config, cancel).await,
        Command::Push(args) => push::execute(args, &config, cancel).await,
        Command::Digest(cmd) => digest::execute(cmd, &config).await,
        Command::Login(args) => login::execute(args, &config).await,
        Command::Logout(args) => logout::execute(args, &config).await,
        Command::Version(args) => version::execute(args).await,
    }
}

/// Process exit code for an error returned by `dispatch`.
pub fn exit_code(err: &(dyn std::error::Error + 'static)) -> i32 {
    err.downcast_ref::<MantleError>()
        .map(MantleError::exit_code)
        .unwrap_or(EXIT_VALIDATION_ERROR)
}

/// Extra line for errors raised before the registry was contacted.
pub fn error_hint(err: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    err.downcast_ref::<MantleError>()
        .filter(|e| e.is_pre_registry())
        .map(|_| "No registry calls were made; nothing was published.")
}

/// Flag value, else config value, else error.
pub(crate) fn required(
    flag: Option<String>,
    configured: Option<&String>,
    what: &str,
) -> Result<String, MantleError> {
    flag.or_else(|| configured.cloned())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| MantleError::ConfigError(format!("--{} is required", what)))
}

/// Auth file from the flag, else config.
pub(crate) fn auth_file<'a>(flag: Option<&'a Path>, config: &'a MantleConfig) -> Option<&'a Path> {
    flag.or(config.registry.auth_file.as_deref())
}

/// Registry client authenticated for `registry`.
pub(crate) fn registry_client(registry: &str, auth_file: Option<&Path>) -> Arc<RegistryClient> {
    let host = registry_host(registry);
    let auth = RegistryAuth::resolve(host, auth_file);
    if auth.is_anonymous() {
        tracing::debug!(registry = %host, "No credentials found, using anonymous access");
    }
    Arc::new(RegistryClient::new(auth))
}

/// Host part of a registry value that may carry a path (`ghcr.io/org`).
pub(crate) fn registry_host(registry: &str) -> &str {
    registry.split('/').next().unwrap_or(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_anywhere() {
        let cli = Cli::try_parse_from(["mantle", "version", "-vv", "--log-format", "json"]).unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.log_format, LogFormat::Json);
        assert!(matches!(cli.command, Command::Version(_)));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["mantle", "-q", "-v", "version"]).is_err());
    }

    #[test]
    fn test_exit_code_mapping() {
        let err: Box<dyn std::error::Error> = Box::new(MantleError::Cancelled("x".to_string()));
        assert_eq!(exit_code(err.as_ref()), 130);

        let err: Box<dyn std::error::Error> = "plain".into();
        assert_eq!(exit_code(err.as_ref()), 1);
    }

    #[test]
    fn test_error_hint_only_before_registry() {
        let err: Box<dyn std::error::Error> = Box::new(MantleError::NoArchitectures);
        assert!(error_hint(err.as_ref()).is_some());

        let err: Box<dyn std::error::Error> = Box::new(MantleError::PushError {
            tag: "latest".to_string(),
            message: "denied".to_string(),
        });
        assert!(error_hint(err.as_ref()).is_none());

        let err: Box<dyn std::error::Error> = "plain".into();
        assert!(error_hint(err.as_ref()).is_none());
    }

    #[test]
    fn test_required_prefers_flag() {
        let configured = "ghcr.io".to_string();
        assert_eq!(
            required(Some("quay.io".to_string()), Some(&configured), "registry").unwrap(),
            "quay.io"
        );
        assert_eq!(required(None, Some(&configured), "registry").unwrap(), "ghcr.io");
        assert!(required(None, None, "registry").is_err());
    }

    #[test]
    fn test_registry_host() {
        assert_eq!(registry_host("ghcr.io"), "ghcr.io");
        assert_eq!(registry_host("ghcr.io/org"), "ghcr.io");
        assert_eq!(registry_host("localhost:5000"), "localhost:5000");
    }
}
