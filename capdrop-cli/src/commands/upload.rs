//! Upload command - send an existing file to the upload sink

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use capdrop_core::types::Artifact;

use super::{deliver, load_config};

/// Arguments for the upload command
#[derive(Args)]
pub struct UploadArgs {
    /// File to upload
    file: PathBuf,
}

/// Upload a file kept after a failed upload
pub async fn upload(args: UploadArgs) -> Result<()> {
    if !args.file.is_file() {
        bail!("{} is not a file", args.file.display());
    }
    let (config, _) = load_config()?;
    deliver(&config, &Artifact::from_path(args.file)).await?;
    Ok(())
}
