// src/history/mod.rs
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    path::PathBuf,
};

#[derive(Debug, Serialize, Deserialize)]
struct HistoryRecord {
    name: String,
    event: String,
    event_time: chrono::DateTime<Utc>,
}

/// A simple history manager backed by one JSON file per event.
pub struct History {
    history_dir: PathBuf,
}

impl History {
    /// Construct a new History store at `history_dir`, creating the directory if needed.
    pub fn new(history_dir: impl Into<PathBuf>) -> Result<Self> {
        let history_dir = history_dir.into();
        fs::create_dir_all(&history_dir)
            .with_context(|| format!("creating history directory {:?}", &history_dir))?;
        Ok(Self { history_dir })
    }

    /// Record an event for `name` (e.g. "downloaded", "processed").
    /// Writes a single-record JSON file named `<name>_<event>_<ts>.json`.
    pub fn record_event(&self, name: &str, event: &str) -> Result<()> {
        let now = Utc::now();
        let filename = format!("{}_{}_{}.json", name, event, now.timestamp_micros());
        let path = self.history_dir.join(filename);

        let record = HistoryRecord {
            name: name.to_string(),
            event: event.to_string(),
            event_time: now,
        };
        let body = serde_json::to_vec(&record).context("serializing history record")?;
        fs::write(&path, body).with_context(|| format!("writing history file {:?}", &path))?;
        Ok(())
    }

    /// Load all distinct `name`s for the given `event` by scanning filenames.
    /// Filenames follow `<name>_<event>_<ts>.json`.
    pub fn load_event_names(&self, event: &str) -> Result<HashSet<String>> {
        let mut set = HashSet::new();
        let marker = format!("_{}_", event);
        for entry in fs::read_dir(&self.history_dir)
            .with_context(|| format!("reading history directory {:?}", &self.history_dir))?
        {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(fname) = path.file_stem().and_then(|s| s.to_str()) {
                // fname = "<name>_<event>_<ts>"
                if let Some(idx) = fname.rfind(&marker) {
                    set.insert(fname[..idx].to_string());
                }
            }
        }
        Ok(set)
    }
}
