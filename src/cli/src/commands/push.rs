//! `mantle push` command: push one architecture's image and record its digest.

use std::path::PathBuf;

use clap::Args;
use mantle_core::config::MantleConfig;
use mantle_core::error::MantleError;
use mantle_runtime::manifest::{normalize_architecture, save_digest};
use mantle_runtime::{BuildxBackend, ImageBackend, ImageReference};
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Image reference to push (e.g. "ghcr.io/org/app:amd64")
    pub image: String,

    /// Architecture of the image (amd64, arm64, arm/v7, ...)
    #[arg(long)]
    pub arch: String,

    /// Local image to tag as IMAGE before pushing
    #[arg(long)]
    pub source: Option<String>,

    /// Image name for the digest file (default: last path component of IMAGE)
    #[arg(long)]
    pub name: Option<String>,

    /// Directory to write the digest file into
    #[arg(long)]
    pub digest_dir: Option<PathBuf>,

    /// Docker binary to drive
    #[arg(long, default_value = "docker")]
    pub docker: String,
}

pub async fn execute(
    args: PushArgs,
    config: &MantleConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let reference = ImageReference::parse(&args.image)?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => image_name(&reference).to_string(),
    };
    let architecture = normalize_architecture(&args.arch);
    let digest_dir = args
        .digest_dir
        .clone()
        .unwrap_or_else(|| config.manifests.digest_dir.clone());

    let backend = BuildxBackend::with_program(&args.docker);
    backend.check_available().await?;

    if let Some(source) = &args.source {
        backend.tag(source, &args.image).await?;
    }

    if cancel.is_cancelled() {
        return Err(MantleError::Cancelled(format!("push of {}", args.image)).into());
    }
    // A started push is awaited so its digest is always recorded.
    let digest = backend.push(&args.image).await?;

    let path = save_digest(&digest_dir, &name, &architecture, &digest)?;

    println!("Pushed {}", reference.with_digest(&digest));
    println!("Digest written to {}", path.display());
    Ok(())
}

/// Last path component of the repository (`org/app` → `app`).
fn image_name(reference: &ImageReference) -> &str {
    reference
        .repository
        .rsplit('/')
        .next()
        .unwrap_or(&reference.repository)
}
