// src/extract/mod.rs
//! Turns a decoded spreadsheet grid into job records with monthly projections.
//!
//! Two passes:
//! 1. [`header`] finds the header row and classifies its columns
//!    (fixed id/name columns plus one [`MonthColumn`] per month header).
//! 2. [`aggregate`] folds every later row into a [`JobRecord`], splitting the
//!    monthly values into "completed to date" and "projected remaining"
//!    around a reference month.
//!
//! Extraction never fails. Missing structure yields empty output, unparseable
//! amounts count as zero, and rows that cannot become jobs are listed in
//! [`Extraction::skipped`].

pub mod aggregate;
pub mod header;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use crate::grid::Cell;
use aggregate::{aggregate_rows, ReferenceMonth};

pub use header::{
    detect_month, discover_columns, find_header_row, normalize_header, ColumnLayout, MonthColumn,
    MONTH_NAMES,
};

/// Knobs for header discovery. Defaults match the WIP tracker layout: two
/// preamble rows, then a header with `Project #` and `Project Name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Rows above the header search start.
    pub skip_rows: usize,
    pub id_header: String,
    pub name_header: String,
    /// Drop later month columns that repeat an already seen (year, month).
    pub dedupe_months: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            skip_rows: 2,
            id_header: "Project #".to_string(),
            name_header: "Project Name".to_string(),
            dedupe_months: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "In Progress")]
    InProgress,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Completed => "Completed",
            JobStatus::InProgress => "In Progress",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "completed" => Some(JobStatus::Completed),
            "in progress" | "in-progress" | "inprogress" => Some(JobStatus::InProgress),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One job row, aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub name: String,
    /// No column feeds this yet; always empty.
    pub client: String,
    pub yearly_total: f64,
    pub completed_to_date: f64,
    pub projected_remaining: f64,
    pub status: JobStatus,
    /// 0..=100
    pub progress: u8,
    /// `"YYYY-MM"` → value of that month's column.
    pub projections: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Fewer than two cells in the row.
    TooFewCells,
    /// Both id and name are empty.
    MissingIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Absolute row index in the grid.
    pub row_index: usize,
    pub reason: SkipReason,
}

/// Result of one extraction run. Replaces any previous result wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub jobs: Vec<JobRecord>,
    pub month_columns: Vec<MonthColumn>,
    pub skipped: Vec<SkippedRow>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.month_columns.is_empty()
    }
}

/// Extract jobs with the default header layout.
pub fn extract(grid: &[Vec<Cell>], reference_date: NaiveDate) -> Extraction {
    extract_with(grid, reference_date, &ExtractOptions::default())
}

/// Extract jobs from `grid`, treating every month up to and including
/// `reference_date`'s month as completed.
pub fn extract_with(
    grid: &[Vec<Cell>],
    reference_date: NaiveDate,
    opts: &ExtractOptions,
) -> Extraction {
    let Some(header_idx) = find_header_row(grid, opts.skip_rows) else {
        warn!(rows = grid.len(), skip = opts.skip_rows, "no header row found");
        return Extraction::default();
    };
    debug!(row = header_idx, "header row");

    let layout = discover_columns(&grid[header_idx], opts);
    if layout.month_columns.is_empty() {
        warn!(row = header_idx, "header row has no month columns");
    }

    let reference = ReferenceMonth {
        year: reference_date.year(),
        month: reference_date.month(),
    };
    let first_data = header_idx + 1;
    let (jobs, skipped) = aggregate_rows(&grid[first_data..], first_data, &layout, reference);

    debug!(jobs = jobs.len(), skipped = skipped.len(), "extraction finished");
    Extraction {
        jobs,
        month_columns: layout.month_columns,
        skipped,
    }
}
