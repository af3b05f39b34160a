// src/dataset/mod.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};
use tracing::debug;

/// Column header of the dataset file, in order.
pub const HEADER: [&str; 11] = [
    "ID",
    "CPT/HCPC Code",
    "Modifier",
    "Medicare Location",
    "Global Surgery Indicator",
    "Multiple Surgery Indicator",
    "Prevailing Charge Amount",
    "Fee Schedule Amount",
    "Site of Service Amount",
    "PDF Name",
    "Timestamp",
];

/// Number of business columns taken from each PDF table row.
pub const BUSINESS_COLUMNS: usize = 8;

/// Format of the `Timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the fee schedule dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeScheduleRecord {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "CPT/HCPC Code")]
    pub code: String,
    #[serde(rename = "Modifier")]
    pub modifier: String,
    #[serde(rename = "Medicare Location")]
    pub locality: String,
    #[serde(rename = "Global Surgery Indicator")]
    pub global_surgery: String,
    #[serde(rename = "Multiple Surgery Indicator")]
    pub multiple_surgery: String,
    #[serde(rename = "Prevailing Charge Amount")]
    pub prevailing_charge: String,
    #[serde(rename = "Fee Schedule Amount")]
    pub fee_schedule: String,
    #[serde(rename = "Site of Service Amount")]
    pub site_of_service: String,
    #[serde(rename = "PDF Name")]
    pub pdf_name: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// A record extracted from a PDF that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub fields: [String; BUSINESS_COLUMNS],
    pub pdf_name: String,
    pub timestamp: String,
}

impl NewRecord {
    /// Takes the first eight cells of `cells`. Returns `None` when there are fewer.
    pub fn from_cells(cells: &[String], pdf_name: &str, timestamp: &str) -> Option<Self> {
        let fields: [String; BUSINESS_COLUMNS] =
            cells.get(..BUSINESS_COLUMNS)?.to_vec().try_into().ok()?;
        Some(Self {
            fields,
            pdf_name: pdf_name.to_string(),
            timestamp: timestamp.to_string(),
        })
    }

    fn with_id(self, id: u64) -> FeeScheduleRecord {
        let [
            code,
            modifier,
            locality,
            global_surgery,
            multiple_surgery,
            prevailing_charge,
            fee_schedule,
            site_of_service,
        ] = self.fields;
        FeeScheduleRecord {
            id,
            code,
            modifier,
            locality,
            global_surgery,
            multiple_surgery,
            prevailing_charge,
            fee_schedule,
            site_of_service,
            pdf_name: self.pdf_name,
            timestamp: self.timestamp,
        }
    }
}

impl FeeScheduleRecord {
    /// The columns that decide whether two records are duplicates.
    fn dedup_key(&self) -> [&str; BUSINESS_COLUMNS] {
        [
            self.code.as_str(),
            self.modifier.as_str(),
            self.locality.as_str(),
            self.global_surgery.as_str(),
            self.multiple_surgery.as_str(),
            self.prevailing_charge.as_str(),
            self.fee_schedule.as_str(),
            self.site_of_service.as_str(),
        ]
    }
}

/// The cumulative fee schedule table, held fully in memory.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    rows: Vec<FeeScheduleRecord>,
}

impl Dataset {
    /// Load the dataset at `path`. A missing file is an empty dataset.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "dataset absent, starting empty");
            return Ok(Self::default());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("opening dataset {}", path.display()))?;

        let rows = rdr
            .deserialize::<FeeScheduleRecord>()
            .enumerate()
            .map(|(idx, rec)| {
                rec.with_context(|| format!("parsing record {} of {}", idx, path.display()))
            })
            .collect::<Result<Vec<FeeScheduleRecord>>>()?;

        debug!(path = %path.display(), rows = rows.len(), "loaded dataset");
        Ok(Self { rows })
    }

    /// Rewrite the whole dataset file, header included.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("creating dataset {}", path.display()))?;
        // written by hand so an empty dataset still gets its header
        wtr.write_record(HEADER)?;
        for row in &self.rows {
            wtr.serialize(row)
                .with_context(|| format!("writing record {} to {}", row.id, path.display()))?;
        }
        wtr.flush()
            .with_context(|| format!("flushing dataset {}", path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeeScheduleRecord] {
        &self.rows
    }

    /// Whether any row was extracted from `pdf_name`.
    pub fn contains_pdf(&self, pdf_name: &str) -> bool {
        self.rows.iter().any(|r| r.pdf_name == pdf_name)
    }

    /// Append `new_rows` with ids continuing from the current size, then drop
    /// duplicates over the business columns keeping the first occurrence.
    /// Returns how many of the new rows survived.
    pub fn append(&mut self, new_rows: Vec<NewRecord>) -> usize {
        let start = self.rows.len() as u64;
        let before = self.rows.len();
        self.rows.extend(
            new_rows
                .into_iter()
                .enumerate()
                .map(|(i, rec)| rec.with_id(start + i as u64)),
        );

        let mut seen = HashSet::with_capacity(self.rows.len());
        let mut kept_new = 0;
        let mut kept = Vec::with_capacity(self.rows.len());
        for (idx, row) in std::mem::take(&mut self.rows).into_iter().enumerate() {
            let key = row.dedup_key().map(str::to_owned);
            if seen.insert(key) {
                if idx >= before {
                    kept_new += 1;
                }
                kept.push(row);
            }
        }
        self.rows = kept;
        kept_new
    }
}
