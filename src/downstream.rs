// src/downstream.rs
use anyhow::{bail, Context, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Hand one produced file to the external per-file processing command.
///
/// The command is invoked as `<cmd> <file> <shared_out_dir>` and must exit
/// with status zero; anything else is surfaced as an error so the driver can
/// log it and move on.
#[instrument(level = "info", skip(file, shared_out_dir), fields(file = %file.display()))]
pub async fn run(cmd: &str, file: &Path, shared_out_dir: &Path) -> Result<()> {
    debug!(cmd = %cmd, "invoking downstream processor");
    let status = Command::new(cmd)
        .arg(file)
        .arg(shared_out_dir)
        .status()
        .await
        .with_context(|| format!("spawning downstream command '{}'", cmd))?;

    if !status.success() {
        bail!(
            "downstream command '{}' failed with {} for {}",
            cmd,
            status,
            file.display()
        );
    }
    Ok(())
}
