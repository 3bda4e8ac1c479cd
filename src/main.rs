use anyhow::Result;
use reqwest::Client;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    sync::{mpsc, Semaphore},
    time::Instant,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use transitscraper::{
    config::Config,
    downstream, extract, fetch,
    history::History,
    partition::{self, PartitionOptions},
};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) load config & set up dirs ────────────────────────────────
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let client = Client::new();
    let zips_dir = config.zips_dir();
    let events_dir = config.events_dir();

    for d in &[&zips_dir, &events_dir] {
        fs::create_dir_all(d)?;
    }
    let history = Arc::new(History::new(config.history_dir())?);

    // ─── 3) load history to skip processed years ─────────────────────
    let processed: HashSet<String> = history.load_event_names("processed")?;
    info!("{} years already done", processed.len());

    let to_process: Vec<(String, String)> = config
        .years
        .iter()
        .filter(|(year, _)| !processed.contains(year.as_str()))
        .map(|(year, url)| (year.clone(), url.clone()))
        .collect();

    if to_process.is_empty() {
        info!("no new archives; exit");
        return Ok(());
    }
    info!("{} archives to download + partition", to_process.len());

    // ─── 4) spawn downloader tasks ──────────────────────────────────
    let (tx, mut rx) = mpsc::channel::<Result<(String, PathBuf), (String, String)>>(100);
    let dl_sem = Arc::new(Semaphore::new(3));
    let mut dl_handles = Vec::with_capacity(to_process.len());

    for (year, url) in to_process {
        let client = client.clone();
        let zips_dir = zips_dir.clone();
        let tx = tx.clone();
        let sem = dl_sem.clone();

        dl_handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            info!(year = %year, url = %url, "downloading");
            let start = Instant::now();
            match fetch::zips::download_zip(&client, &url, &zips_dir).await {
                Ok(path) => {
                    info!(year = %year, elapsed = ?start.elapsed(), "downloaded");
                    let _ = tx.send(Ok((year, path))).await;
                }
                Err(err) => {
                    error!("{} failed: {}", url, err);
                    let _ = tx.send(Err((year, err.to_string()))).await;
                }
            }
        }));
    }
    // drop the original sender so `rx.recv()` will end once all downloads complete
    drop(tx);

    // ─── 5) process downloaded archives one at a time ────────────────
    while let Some(msg) = rx.recv().await {
        match msg {
            Ok((year, zip_path)) => {
                info!(year = %year, "processing {}", zip_path.display());

                // offload extraction + splitting to the blocking pool
                let outputs = match tokio::task::spawn_blocking({
                    let config = config.clone();
                    let year = year.clone();
                    let zip_clone = zip_path.clone();
                    move || process_archive(&config, &year, &zip_clone)
                })
                .await?
                {
                    Ok(outputs) => outputs,
                    Err(e) => {
                        error!("processing {} failed: {}", year, e);
                        continue;
                    }
                };

                // hand each produced file to the external per-file step
                if let Some(cmd) = &config.process_cmd {
                    for file in &outputs {
                        if let Err(e) = downstream::run(cmd, file, &events_dir).await {
                            error!("downstream step failed for {}: {}", file.display(), e);
                        }
                    }
                }

                // write history record
                history.record_event(&year, "processed")?;
                info!("wrote history for {}", year);

                // delete the ZIP file
                if let Err(e) = fs::remove_file(&zip_path) {
                    error!("failed to delete {}: {}", zip_path.display(), e);
                } else {
                    info!("deleted zip {}", zip_path.display());
                }
            }

            Err((year, err)) => {
                error!("download error for {}: {}", year, err);
            }
        }
    }

    // ─── 6) await all downloader tasks ───────────────────────────────
    for h in dl_handles {
        let _ = h.await;
    }

    info!("all done");
    Ok(())
}

/// Extract one year's archive and, when it holds a single oversized CSV,
/// split that CSV into monthly files. Returns the files to hand downstream;
/// the downstream step only ever sees CSVs, so other extracted entries
/// (readmes, metadata) stay on disk but are not forwarded.
fn process_archive(config: &Config, year: &str, zip_path: &Path) -> Result<Vec<PathBuf>> {
    let year_dir = config.events_dir().join(year);
    let extracted = extract::extract_archive(zip_path, &year_dir)?;

    let csvs: Vec<PathBuf> = extracted
        .into_iter()
        .filter(|p| {
            p.extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();

    let needs_split = match csvs.as_slice() {
        [only] => fs::metadata(only)?.len() >= config.split_threshold_bytes,
        _ => false,
    };
    if !needs_split {
        return Ok(csvs);
    }

    let source = csvs[0].clone();
    let opts = PartitionOptions {
        delimiter: config.delimiter,
        key_field: config.month_field,
    };
    let summary = partition::partition_by_month(&source, &year_dir, year, &opts)?;
    info!(
        year = %year,
        months = summary.partitions.len(),
        rows = summary.total_rows(),
        skipped = summary.skipped_lines,
        "split annual CSV into monthly files"
    );

    // the monthly files supersede the oversized intermediate
    if let Err(e) = fs::remove_file(&source) {
        error!("failed to delete {}: {}", source.display(), e);
    }

    Ok(summary.output_paths())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{FileOptions, SimpleFileOptions};
    use zip::CompressionMethod;

    fn archive_with(dir: &Path, entries: &[(&str, &str)]) -> Result<PathBuf> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let options: SimpleFileOptions =
                FileOptions::default().compression_method(CompressionMethod::Stored);
            for (name, content) in entries {
                zip.start_file(*name, options)?;
                zip.write_all(content.as_bytes())?;
            }
            zip.finish()?;
        }
        let path = dir.join("Events2020.zip");
        fs::write(&path, &buf)?;
        Ok(path)
    }

    #[test]
    fn only_csvs_are_forwarded_when_no_split_happens() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = archive_with(
            dir.path(),
            &[
                ("Events2020.csv", "id-month-val\n1-01-a\n"),
                ("readme.txt", "annual event export\n"),
            ],
        )?;
        let config = Config {
            data_dir: dir.path().join("data"),
            ..Config::default()
        };

        let outputs = process_archive(&config, "2020", &zip_path)?;

        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].ends_with("Events2020.csv"));
        // the non-CSV entry stays extracted, just not forwarded
        assert!(config.events_dir().join("2020").join("readme.txt").exists());
        Ok(())
    }

    #[test]
    fn lone_oversized_csv_is_split_into_monthly_files() -> Result<()> {
        let dir = tempdir()?;
        let zip_path = archive_with(
            dir.path(),
            &[("Events2020.csv", "id-month-val\n1-01-a\n2-02-b\n")],
        )?;
        let config = Config {
            data_dir: dir.path().join("data"),
            split_threshold_bytes: 1,
            ..Config::default()
        };

        let outputs = process_archive(&config, "2020", &zip_path)?;

        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].ends_with("2020_01.csv"));
        assert!(outputs[1].ends_with("2020_02.csv"));
        // the oversized intermediate is gone once the monthly files exist
        assert!(!config.events_dir().join("2020").join("Events2020.csv").exists());
        Ok(())
    }
}
