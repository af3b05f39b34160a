// src/extract/mod.rs

pub mod layout;
pub mod pdf;
pub mod table;

use crate::dataset::{Dataset, NewRecord, TIMESTAMP_FORMAT};
use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

pub use layout::{table_from_runs, TextRun};
pub use pdf::{PageTables, PdfTables};
pub use table::{candidate_rows, is_stray_header, Table, HEADER_KEYWORDS};

/// What a single extraction call did to the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The PDF name is already in the dataset; nothing was read or written.
    AlreadyRecorded,
    /// The PDF held no usable rows; the dataset was left untouched.
    NoRows,
    /// `extracted` candidate rows were merged, `kept` survived deduplication.
    Appended { extracted: usize, kept: usize },
}

/// Turns one downloaded PDF into dataset rows.
pub trait Extract {
    fn extract(&self, path: &Path, name: &str) -> Result<ExtractOutcome>;
}

/// Extracts fee schedule tables into the CSV dataset at `dataset_path`.
#[derive(Debug, Clone)]
pub struct FeeScheduleExtractor {
    dataset_path: PathBuf,
}

impl FeeScheduleExtractor {
    pub fn new(dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
        }
    }

    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    /// Merge the tables of `source` for `name`. The PDF source is only opened
    /// through `open_source` once the name is known to be new.
    pub fn extract_with<S, O>(&self, name: &str, open_source: O) -> Result<ExtractOutcome>
    where
        S: PageTables,
        O: FnOnce() -> Result<S>,
    {
        let mut dataset = Dataset::load(&self.dataset_path)?;
        if dataset.contains_pdf(name) {
            info!(pdf = name, "skipping extraction, already processed");
            return Ok(ExtractOutcome::AlreadyRecorded);
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let source = open_source()?;
        let new_rows: Vec<NewRecord> = source
            .page_tables()?
            .iter()
            .flatten()
            .flat_map(|table| candidate_rows(table, name, &timestamp))
            .collect();

        if new_rows.is_empty() {
            info!(pdf = name, "no new data to append");
            return Ok(ExtractOutcome::NoRows);
        }

        let extracted = new_rows.len();
        let kept = dataset.append(new_rows);
        dataset.save(&self.dataset_path)?;
        info!(
            pdf = name,
            extracted,
            kept,
            dataset = %self.dataset_path.display(),
            "appended records"
        );
        Ok(ExtractOutcome::Appended { extracted, kept })
    }
}

impl Extract for FeeScheduleExtractor {
    #[tracing::instrument(level = "info", skip(self, path), fields(path = %path.display()))]
    fn extract(&self, path: &Path, name: &str) -> Result<ExtractOutcome> {
        self.extract_with(name, || PdfTables::open(path))
    }
}
