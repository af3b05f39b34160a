use crate::dataset::{NewRecord, BUSINESS_COLUMNS};
use tracing::debug;

/// Column names that mark a row as a repeated table header.
pub const HEADER_KEYWORDS: [&str; BUSINESS_COLUMNS] = [
    "CPT/HCPC Code",
    "Modifier",
    "Medicare Location",
    "Global Surgery Indicator",
    "Multiple Surgery Indicator",
    "Prevailing Charge Amount",
    "Fee Schedule Amount",
    "Site of Service Amount",
];

/// A table as detected on one PDF page. The first row is the header.
/// Empty strings stand for empty cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Every row after the header.
    pub fn body(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// Lowercase, space-joined text of the non-empty cells of `row`.
pub fn row_text(row: &[String]) -> String {
    row.iter()
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when the row text contains any header keyword, case-insensitively.
pub fn is_stray_header(row: &[String]) -> bool {
    let text = row_text(row);
    HEADER_KEYWORDS
        .iter()
        .any(|kw| text.contains(&kw.to_lowercase()))
}

/// Turn the body rows of `table` into dataset candidates tagged with
/// `pdf_name` and `timestamp`.
pub fn candidate_rows(table: &Table, pdf_name: &str, timestamp: &str) -> Vec<NewRecord> {
    let Some(header) = table.header() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for row in table.body() {
        if is_stray_header(row) {
            debug!(pdf = pdf_name, ?row, "skipping header row");
            continue;
        }
        if row.as_slice() == header {
            continue;
        }
        if let Some(rec) = NewRecord::from_cells(row, pdf_name, timestamp) {
            out.push(rec);
        }
    }
    out
}
