//! Mantle CLI entry point.

use clap::Parser;
use tokio_util::sync::CancellationToken;

use mantle_cli::commands::{dispatch, error_hint, exit_code, Cli};
use mantle_cli::logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match logging::load_config(cli.global.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(mantle_core::error::EXIT_VALIDATION_ERROR);
        }
    };

    logging::init(&cli.global, config.log_level);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    if let Err(e) = dispatch(cli, config, cancel).await {
        eprintln!("Error: {e}");
        if let Some(hint) = error_hint(e.as_ref()) {
            eprintln!("{hint}");
        }
        std::process::exit(exit_code(e.as_ref()));
    }
}
