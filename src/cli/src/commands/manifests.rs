//! `mantle manifests` commands: create and inspect manifest lists.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use mantle_core::config::{parse_duration, MantleConfig};
use mantle_core::error::MantleError;
use mantle_runtime::{
    select_backend, BackendKind, ImageReference, ManifestMetadata, ManifestPipeline,
    ManifestRegistry, PipelineOptions, PipelineReport,
};
use tokio_util::sync::CancellationToken;

use super::{auth_file, registry_client, required};
use crate::output::{format_bytes, new_table};

#[derive(Subcommand)]
pub enum ManifestsCommand {
    /// Assemble and push a manifest list from digest files
    Create(CreateArgs),
    /// Show the platforms of a published manifest list
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Image name (matches digest-<name>-<arch>.txt)
    #[arg(long)]
    pub name: String,

    /// Target registry (e.g. ghcr.io)
    #[arg(long)]
    pub registry: Option<String>,

    /// Namespace or organization under the registry
    #[arg(long)]
    pub namespace: Option<String>,

    /// Tags to publish (repeatable or comma-separated)
    #[arg(short, long = "tag", value_delimiter = ',', default_value = "latest")]
    pub tags: Vec<String>,

    /// Directory holding the digest files
    #[arg(long)]
    pub digest_dir: Option<PathBuf>,

    /// Verify every digest exists in the registry before publishing
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verify_registry: bool,

    /// Concurrent registry verifications (max 20)
    #[arg(long)]
    pub verify_concurrency: Option<usize>,

    /// Maximum digest file age (e.g. 1h, 30m, 1h30m; 0 disables)
    #[arg(long)]
    pub max_age: Option<String>,

    /// Check registry connectivity first (failures only warn)
    #[arg(long)]
    pub health_check: bool,

    /// Architectures that must be present (repeatable or comma-separated)
    #[arg(long = "require-arch", value_delimiter = ',')]
    pub require_arch: Vec<String>,

    /// Publish the required architectures that exist when some are missing
    #[arg(long)]
    pub best_effort: bool,

    /// Docker-style auth file (default: ~/.docker/config.json)
    #[arg(long)]
    pub auth_file: Option<PathBuf>,

    /// Index annotation key=value (repeatable)
    #[arg(long = "annotation")]
    pub annotations: Vec<String>,

    /// Label key=value, written as an index annotation (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Publish even if an identical manifest list exists
    #[arg(long)]
    pub force: bool,

    /// Show what would be pushed without pushing
    #[arg(long)]
    pub dry_run: bool,

    /// Build backend: auto, buildx or registry
    #[arg(long)]
    pub backend: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image name
    #[arg(long)]
    pub name: String,

    /// Registry
    #[arg(long)]
    pub registry: Option<String>,

    /// Namespace or organization
    #[arg(long)]
    pub namespace: Option<String>,

    /// Tag to inspect
    #[arg(short, long, default_value = "latest")]
    pub tag: String,

    /// Docker-style auth file
    #[arg(long)]
    pub auth_file: Option<PathBuf>,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(
    cmd: ManifestsCommand,
    config: &MantleConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ManifestsCommand::Create(args) => create(args, config, cancel).await,
        ManifestsCommand::Inspect(args) => inspect(args, config).await,
    }
}

/// Merge flags over config into pipeline options.
pub(crate) fn pipeline_options(
    args: &CreateArgs,
    config: &MantleConfig,
) -> Result<PipelineOptions, MantleError> {
    let registry = required(args.registry.clone(), config.registry.registry.as_ref(), "registry")?;

    let max_age = match &args.max_age {
        Some(value) => parse_duration(value)
            .map_err(|e| MantleError::ConfigError(format!("--max-age: {}", e)))?,
        None => config.manifests.max_age()?,
    };

    let required_architectures = if args.require_arch.is_empty() {
        config.manifests.required_architectures.clone()
    } else {
        args.require_arch.clone()
    };

    let mut options = PipelineOptions::new(args.name.clone(), registry);
    options.namespace = args
        .namespace
        .clone()
        .or_else(|| config.registry.namespace.clone())
        .unwrap_or_default();
    options.tags = args
        .tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    options.digest_dir = args
        .digest_dir
        .clone()
        .unwrap_or_else(|| config.manifests.digest_dir.clone());
    options.max_age = max_age;
    options.required_architectures = required_architectures;
    options.best_effort = args.best_effort || config.manifests.best_effort;
    options.verify_registry = args.verify_registry;
    options.verify_concurrency = args
        .verify_concurrency
        .unwrap_or(config.manifests.verify_concurrency);
    options.health_check = args.health_check;
    options.force = args.force;
    options.dry_run = args.dry_run;
    options.metadata = ManifestMetadata::from_pairs(&args.annotations, &args.labels)?;

    options.validate()?;
    Ok(options)
}

async fn create(
    args: CreateArgs,
    config: &MantleConfig,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = pipeline_options(&args, config)?;
    let backend_kind: BackendKind = args
        .backend
        .as_deref()
        .unwrap_or(config.manifests.backend.as_str())
        .parse()?;

    let registry: Arc<dyn ManifestRegistry> = registry_client(
        &options.registry,
        auth_file(args.auth_file.as_deref(), config),
    );

    let pipeline = ManifestPipeline::new(options);
    // Fail on anything local before probing for a backend.
    let entries = pipeline.prepare()?;
    let backend = select_backend(backend_kind, registry.clone()).await?;

    let report = pipeline
        .run_prepared(entries, registry, backend, &cancel)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if cancel.is_cancelled() && !report.outcome.is_success() {
        return Err(MantleError::Cancelled(format!(
            "{} tag(s) not pushed",
            report.outcome.failed_tags.len()
        ))
        .into());
    }

    report.outcome.into_result()?;
    Ok(())
}

fn print_report(report: &PipelineReport) {
    let mut table = new_table(&["PLATFORM", "IMAGE"]);
    for entry in &report.entries {
        table.add_row(vec![entry.platform.clone(), entry.image_ref.clone()]);
    }
    println!("{table}");
    println!();

    if report.skipped {
        println!(
            "Manifest list for {} is already up to date, nothing pushed",
            report.repository
        );
        return;
    }

    let prefix = if report.outcome.dry_run {
        "Would push"
    } else {
        "Pushed"
    };
    for tag in &report.outcome.success_tags {
        println!("{prefix} {}:{}", report.repository, tag);
    }
    for tag in &report.outcome.failed_tags {
        println!("Failed {}:{}", report.repository, tag);
    }
}

async fn inspect(args: InspectArgs, config: &MantleConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = required(args.registry.clone(), config.registry.registry.as_ref(), "registry")?;
    let namespace = args
        .namespace
        .clone()
        .or_else(|| config.registry.namespace.clone())
        .unwrap_or_default();

    let reference = ImageReference::tagged(&registry, &namespace, &args.name, &args.tag);
    let client = registry_client(&registry, auth_file(args.auth_file.as_deref(), config));
    let info = client.inspect(&reference).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Name:       {}", info.name);
    println!("Tag:        {}", info.tag);
    println!("Digest:     {}", info.digest);
    println!("Media type: {}", info.media_type);
    println!("Size:       {}", format_bytes(info.size as u64));
    for (key, value) in &info.annotations {
        println!("Annotation: {key}={value}");
    }
    println!();

    if info.architectures.is_empty() {
        println!("Single-platform manifest (not a manifest list)");
        return Ok(());
    }

    let mut table = new_table(&["PLATFORM", "DIGEST", "SIZE", "MEDIA TYPE"]);
    for arch in &info.architectures {
        table.add_row(vec![
            arch.platform(),
            arch.digest.clone(),
            format_bytes(arch.size.max(0) as u64),
            arch.media_type.clone(),
        ]);
    }
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::time::Duration;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        cmd: ManifestsCommand,
    }

    fn parse_create(args: &[&str]) -> CreateArgs {
        let mut argv = vec!["test", "create"];
        argv.extend_from_slice(args);
        match TestCli::try_parse_from(argv).unwrap().cmd {
            ManifestsCommand::Create(args) => args,
            ManifestsCommand::Inspect(_) => panic!("expected create"),
        }
    }

    #[test]
    fn test_create_defaults() {
        let args = parse_create(&["--name", "app", "--registry", "ghcr.io"]);
        assert_eq!(args.tags, vec!["latest"]);
        assert!(args.verify_registry);
        assert!(!args.dry_run);

        let opts = pipeline_options(&args, &MantleConfig::default()).unwrap();
        assert_eq!(opts.tags, vec!["latest"]);
        assert_eq!(opts.digest_dir, PathBuf::from("."));
        assert_eq!(opts.verify_concurrency, 5);
        assert_eq!(opts.max_age, Duration::ZERO);
    }

    #[test]
    fn test_create_full_flags() {
        let args = parse_create(&[
            "--name", "app",
            "--registry", "ghcr.io",
            "--namespace", "org",
            "-t", "latest,v1.0",
            "--tag", "stable",
            "--digest-dir", "/tmp/digests",
            "--verify-registry", "false",
            "--verify-concurrency", "10",
            "--max-age", "1h30m",
            "--require-arch", "amd64,arm64",
            "--best-effort",
            "--annotation", "org.opencontainers.image.version=1.0",
            "--label", "team=infra",
            "--force",
            "--dry-run",
            "--backend", "registry",
        ]);

        let opts = pipeline_options(&args, &MantleConfig::default()).unwrap();
        assert_eq!(opts.tags, vec!["latest", "v1.0", "stable"]);
        assert_eq!(opts.namespace, "org");
        assert_eq!(opts.digest_dir, PathBuf::from("/tmp/digests"));
        assert!(!opts.verify_registry);
        assert_eq!(opts.verify_concurrency, 10);
        assert_eq!(opts.max_age, Duration::from_secs(5400));
        assert_eq!(opts.required_architectures, vec!["amd64", "arm64"]);
        assert!(opts.best_effort && opts.force && opts.dry_run);
        assert_eq!(opts.metadata.labels.get("team").map(String::as_str), Some("infra"));
        assert_eq!(args.backend.as_deref(), Some("registry"));
    }

    #[test]
    fn test_config_fills_missing_flags() {
        let mut config = MantleConfig::default();
        config.registry.registry = Some("quay.io".to_string());
        config.registry.namespace = Some("team".to_string());
        config.manifests.verify_concurrency = 7;
        config.manifests.max_age = "30m".to_string();
        config.manifests.required_architectures = vec!["amd64".to_string()];

        let args = parse_create(&["--name", "app"]);
        let opts = pipeline_options(&args, &config).unwrap();
        assert_eq!(opts.registry, "quay.io");
        assert_eq!(opts.namespace, "team");
        assert_eq!(opts.verify_concurrency, 7);
        assert_eq!(opts.max_age, Duration::from_secs(1800));
        assert_eq!(opts.required_architectures, vec!["amd64"]);

        let args = parse_create(&["--name", "app", "--registry", "ghcr.io", "--verify-concurrency", "2"]);
        let opts = pipeline_options(&args, &config).unwrap();
        assert_eq!(opts.registry, "ghcr.io");
        assert_eq!(opts.verify_concurrency, 2);
    }

    #[test]
    fn test_missing_registry_is_an_error() {
        let args = parse_create(&["--name", "app"]);
        let err = pipeline_options(&args, &MantleConfig::default()).unwrap_err();
        assert!(err.to_string().contains("--registry"));
    }

    #[test]
    fn test_bad_metadata_is_an_error() {
        let args = parse_create(&["--name", "app", "--registry", "ghcr.io", "--annotation", "novalue"]);
        assert!(pipeline_options(&args, &MantleConfig::default()).is_err());
    }

    #[test]
    fn test_bad_max_age_is_an_error() {
        let args = parse_create(&["--name", "app", "--registry", "ghcr.io", "--max-age", "10"]);
        assert!(pipeline_options(&args, &MantleConfig::default()).is_ok());
        let args = parse_create(&["--name", "app", "--registry", "ghcr.io", "--max-age", "1x"]);
        assert!(pipeline_options(&args, &MantleConfig::default()).is_err());
    }

    #[test]
    fn test_inspect_args() {
        let cli = TestCli::try_parse_from(["test", "inspect", "--name", "app", "-t", "v1"]).unwrap();
        match cli.cmd {
            ManifestsCommand::Inspect(args) => {
                assert_eq!(args.tag, "v1");
                assert!(!args.json);
            }
            ManifestsCommand::Create(_) => panic!("expected inspect"),
        }
    }
}
