// src/extract/mod.rs
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};
use zip::ZipArchive;

/// Unpack every file entry of `zip_path` into `dest_dir`, returning the
/// extracted paths in archive order. Entries whose names would escape
/// `dest_dir` are skipped.
#[instrument(level = "info", skip(zip_path, dest_dir), fields(zip = %zip_path.as_ref().display()))]
pub fn extract_archive(
    zip_path: impl AsRef<Path>,
    dest_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let zip_path = zip_path.as_ref();
    let dest_dir = dest_dir.as_ref();
    fs::create_dir_all(dest_dir)
        .with_context(|| format!("creating extraction dir {}", dest_dir.display()))?;

    let file = File::open(zip_path)
        .with_context(|| format!("opening archive {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading archive {}", zip_path.display()))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("accessing entry #{} in {}", i, zip_path.display()))?;
        if !entry.is_file() {
            continue;
        }
        let relative = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            None => {
                warn!(name = %entry.name(), "skipping entry with unsafe path");
                continue;
            }
        };

        let out_path = dest_dir.join(&relative);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("creating {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("extracting {}", out_path.display()))?;
        extracted.push(out_path);
    }

    Ok(extracted)
}
