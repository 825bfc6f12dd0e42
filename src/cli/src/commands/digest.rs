//! `mantle digest` commands: write and list digest files.

use std::path::PathBuf;

use clap::Subcommand;
use mantle_core::config::MantleConfig;
use mantle_runtime::manifest::{discover, save_digest};

use crate::output::{new_table, short_digest};

#[derive(Subcommand, Debug)]
pub enum DigestCommand {
    /// Record the digest of an already-pushed image
    Save {
        /// Image name
        #[arg(long)]
        name: String,

        /// Architecture (amd64, arm64, arm/v7, ...)
        #[arg(long)]
        arch: String,

        /// Digest (`sha256:...`)
        #[arg(long)]
        digest: String,

        /// Directory to write into
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List the digest files found for an image
    List {
        /// Image name
        #[arg(long)]
        name: String,

        /// Directory to search
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub async fn execute(
    cmd: DigestCommand,
    config: &MantleConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        DigestCommand::Save {
            name,
            arch,
            digest,
            dir,
        } => {
            let dir = dir.unwrap_or_else(|| config.manifests.digest_dir.clone());
            let path = save_digest(&dir, &name, &arch, &digest)?;
            println!("{}", path.display());
        }
        DigestCommand::List { name, dir } => {
            let dir = dir.unwrap_or_else(|| config.manifests.digest_dir.clone());
            let records = discover(&dir, &name)?;
            if records.is_empty() {
                println!("No digest files for {} in {}", name, dir.display());
                return Ok(());
            }

            let mut table = new_table(&["ARCHITECTURE", "DIGEST", "MODIFIED", "FILE"]);
            for record in &records {
                let file = record
                    .source_path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                table.add_row(vec![
                    record.architecture.clone(),
                    short_digest(&record.digest).to_string(),
                    record.modified_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    file,
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
