//! Tracing setup and config loading for the binary.

use std::path::Path;

use mantle_core::config::{LogLevel, MantleConfig};
use mantle_core::error::Result;
use tracing_subscriber::EnvFilter;

use crate::commands::{GlobalArgs, LogFormat};

/// Load the config file (explicit path, else default location) and apply
/// `MANTLE_*` overrides.
pub fn load_config(path: Option<&Path>) -> Result<MantleConfig> {
    match path {
        Some(path) => {
            let mut config = MantleConfig::load(path)?;
            config.apply_env_from(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => MantleConfig::load_default(),
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins; otherwise `-v`/`-q`, then the configured level.
pub fn init(global: &GlobalArgs, configured: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(level_directive(global.verbose, global.quiet, configured))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match global.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Level directive from verbosity flags and the configured level.
pub fn level_directive(verbose: u8, quiet: bool, configured: LogLevel) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => configured.as_str(),
        1 => "debug",
        _ => "trace",
    }
}
