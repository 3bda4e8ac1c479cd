// src/fetch/zips.rs
use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use url::Url;

/// Download the given archive URL and save it under `dest_dir` using the
/// original filename. Returns the full path of the saved file.
///
/// The body is streamed to disk chunk by chunk; the annual archives run to
/// hundreds of megabytes and never need to be resident in memory.
#[instrument(level = "info", skip(client, dest_dir), fields(url = %url_str))]
pub async fn download_zip(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let url = Url::parse(url_str)?;
    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("download.zip");
    let dest_path = dest_dir.join(filename);

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("requesting {}", url_str))?
        .error_for_status()?;

    let mut out = fs::File::create(&dest_path)
        .await
        .with_context(|| format!("creating {}", dest_path.display()))?;
    let mut stream = resp.bytes_stream();
    let mut total = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading chunk from response")?;
        out.write_all(&chunk).await?;
        total += chunk.len() as u64;
    }
    out.flush().await?;
    debug!(bytes = total, path = %dest_path.display(), "download complete");

    Ok(dest_path)
}
