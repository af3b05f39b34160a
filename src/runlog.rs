// src/runlog.rs

use crate::dataset::TIMESTAMP_FORMAT;
use anyhow::{Context, Result};
use chrono::Local;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

/// Append-only text log of crawl actions, one `[timestamp] message` per line.
/// Final messages close a phase and are followed by a blank line.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn message(&self, msg: impl AsRef<str>) -> Result<()> {
        self.write(msg.as_ref(), false)
    }

    pub fn final_message(&self, msg: impl AsRef<str>) -> Result<()> {
        self.write(msg.as_ref(), true)
    }

    fn write(&self, msg: &str, last: bool) -> Result<()> {
        info!("{}", msg);
        let ts = Local::now().format(TIMESTAMP_FORMAT);
        let entry = if last {
            format!("[{}] {}\n\n", ts, msg)
        } else {
            format!("[{}] {}\n", ts, msg)
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening run log {}", self.path.display()))?;
        file.write_all(entry.as_bytes())
            .with_context(|| format!("writing run log {}", self.path.display()))?;
        Ok(())
    }
}
