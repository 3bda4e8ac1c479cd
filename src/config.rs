// src/config.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::fetch::urls::default_year_urls;

/// Run configuration, loadable from YAML. Every field has a default so an
/// empty file (or no file at all) yields a working setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Working root; `zips/`, `events/` and `history/` live underneath.
    pub data_dir: PathBuf,
    /// Field separator inside event records.
    pub delimiter: char,
    /// Zero-based index of the field carrying the month key.
    pub month_field: usize,
    /// A lone extracted CSV at or above this size gets split by month.
    pub split_threshold_bytes: u64,
    /// External command run once per produced file, as
    /// `<cmd> <file> <shared output dir>`. Skipped when unset.
    pub process_cmd: Option<String>,
    /// Year → archive URL. Defaults to the built-in table.
    pub years: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            delimiter: '-',
            month_field: 1,
            split_threshold_bytes: 100 * 1024 * 1024,
            process_cmd: None,
            years: default_year_urls(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn zips_dir(&self) -> PathBuf {
        self.data_dir.join("zips")
    }

    pub fn events_dir(&self) -> PathBuf {
        self.data_dir.join("events")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join("history")
    }
}
