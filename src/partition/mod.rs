// src/partition/mod.rs
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("input file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read input file '{0}'")]
    Unreadable(PathBuf, #[source] std::io::Error),

    #[error("input file '{0}' is empty")]
    EmptyInput(PathBuf),

    #[error("failed to write output file for month key '{key}'")]
    OutputWriteFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// How to locate the month key inside a data line.
#[derive(Debug, Clone, Copy)]
pub struct PartitionOptions {
    /// Field separator. The observed archives use `-`.
    pub delimiter: char,
    /// Zero-based index of the field carrying the month key.
    pub key_field: usize,
}

impl Default for PartitionOptions {
    fn default() -> Self {
        PartitionOptions {
            delimiter: '-',
            key_field: 1,
        }
    }
}

/// Per-key output stats: where the file landed and how many data lines it got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStats {
    pub path: PathBuf,
    pub rows: u64,
}

#[derive(Debug, Default)]
pub struct PartitionSummary {
    /// One entry per distinct month key, in key order.
    pub partitions: BTreeMap<String, PartitionStats>,
    /// Lines dropped because they carried no month key field.
    pub skipped_lines: u64,
}

impl PartitionSummary {
    pub fn output_paths(&self) -> Vec<PathBuf> {
        self.partitions.values().map(|s| s.path.clone()).collect()
    }

    pub fn total_rows(&self) -> u64 {
        self.partitions.values().map(|s| s.rows).sum()
    }
}

struct OpenPartition {
    writer: BufWriter<File>,
    path: PathBuf,
    rows: u64,
}

/// Split one header-prefixed event-log file into per-month CSVs.
///
/// Streams `input_path` once. The first line is captured as the header and
/// replicated as line 1 of every output file. Each subsequent line is split on
/// the configured delimiter; the key field selects the output file
/// `{output_dir}/{year_label}_{key}.csv`, created lazily on first sighting of
/// the key. Lines too short to carry the key field are skipped, which is what
/// keeps blank trailing lines out of the output.
///
/// `output_dir` must already exist. The input file is never modified or
/// deleted. Output files written before a failure remain on disk; the file
/// being written at the moment of failure may be incomplete.
#[instrument(level = "info", skip(input_path, output_dir), fields(input = %input_path.as_ref().display(), year = %year_label))]
pub fn partition_by_month(
    input_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    year_label: &str,
    opts: &PartitionOptions,
) -> Result<PartitionSummary, PartitionError> {
    let input_path = input_path.as_ref();
    let output_dir = output_dir.as_ref();

    let file = File::open(input_path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PartitionError::NotFound(input_path.to_path_buf()),
        _ => PartitionError::Unreadable(input_path.to_path_buf(), e),
    })?;
    let mut reader = BufReader::new(file);

    // Header: first line, minus its terminating '\n' only. A '\r' from CRLF
    // input stays attached so the original line endings survive verbatim.
    let mut header = String::new();
    let n = reader
        .read_line(&mut header)
        .map_err(|e| PartitionError::Unreadable(input_path.to_path_buf(), e))?;
    if n == 0 {
        return Err(PartitionError::EmptyInput(input_path.to_path_buf()));
    }
    if header.ends_with('\n') {
        header.pop();
    }

    let mut open: HashMap<String, OpenPartition> = HashMap::new();
    let mut skipped_lines = 0u64;
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| PartitionError::Unreadable(input_path.to_path_buf(), e))?;
        if n == 0 {
            break;
        }
        if line.ends_with('\n') {
            line.pop();
        }

        let key = match line.split(opts.delimiter).nth(opts.key_field) {
            Some(k) => k.to_string(),
            None => {
                skipped_lines += 1;
                continue;
            }
        };

        let part = match open.entry(key.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let path = output_dir.join(format!("{}_{}.csv", year_label, key));
                debug!(key = %key, path = %path.display(), "opening partition");
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|e| PartitionError::OutputWriteFailed {
                        key: key.clone(),
                        source: e,
                    })?;
                let mut writer = BufWriter::new(file);
                write_record(&mut writer, &header).map_err(|e| {
                    PartitionError::OutputWriteFailed {
                        key: key.clone(),
                        source: e,
                    }
                })?;
                v.insert(OpenPartition {
                    writer,
                    path,
                    rows: 0,
                })
            }
        };
        write_record(&mut part.writer, &line)
            .map_err(|e| PartitionError::OutputWriteFailed { key, source: e })?;
        part.rows += 1;
    }

    let mut partitions = BTreeMap::new();
    for (key, mut part) in open {
        part.writer
            .flush()
            .map_err(|e| PartitionError::OutputWriteFailed {
                key: key.clone(),
                source: e,
            })?;
        partitions.insert(
            key,
            PartitionStats {
                path: part.path,
                rows: part.rows,
            },
        );
    }

    debug!(
        partitions = partitions.len(),
        skipped = skipped_lines,
        "partition pass complete"
    );
    Ok(PartitionSummary {
        partitions,
        skipped_lines,
    })
}

fn write_record(writer: &mut BufWriter<File>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")
}
