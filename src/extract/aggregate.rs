// src/extract/aggregate.rs
use std::collections::BTreeMap;
use tracing::trace;

use super::header::ColumnLayout;
use super::{JobRecord, JobStatus, SkipReason, SkippedRow};
use crate::grid::{cell_at, Cell};

/// Reference point splitting completed months from projected ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMonth {
    pub year: i32,
    pub month: u32,
}

/// Pass 2: fold the data rows below the header into job records.
///
/// `first_row` is the absolute grid index of `rows[0]`, used only to label
/// skipped rows.
pub fn aggregate_rows(
    rows: &[Vec<Cell>],
    first_row: usize,
    layout: &ColumnLayout,
    reference: ReferenceMonth,
) -> (Vec<JobRecord>, Vec<SkippedRow>) {
    let mut jobs = Vec::new();
    let mut skipped = Vec::new();

    for (offset, row) in rows.iter().enumerate() {
        let row_index = first_row + offset;
        match aggregate_row(row, layout, reference) {
            Ok(job) => jobs.push(job),
            Err(reason) => {
                trace!(row = row_index, ?reason, "skipping row");
                skipped.push(SkippedRow { row_index, reason });
            }
        }
    }

    (jobs, skipped)
}

/// Identity text of a cell. A numeric zero counts as blank: sheets often fill
/// unused id columns with `0`.
fn read_text(row: &[Cell], col: Option<usize>) -> String {
    match col.map(|c| cell_at(row, c)) {
        Some(Cell::Number(n)) if *n == 0.0 => String::new(),
        Some(cell) => cell.as_text(),
        None => String::new(),
    }
}

fn aggregate_row(
    row: &[Cell],
    layout: &ColumnLayout,
    reference: ReferenceMonth,
) -> Result<JobRecord, SkipReason> {
    if row.len() < 2 {
        return Err(SkipReason::TooFewCells);
    }

    let id = read_text(row, layout.id_col);
    let name = read_text(row, layout.name_col);
    if id.is_empty() && name.is_empty() {
        return Err(SkipReason::MissingIdentity);
    }

    let mut yearly_total = 0.0;
    let mut completed_to_date = 0.0;
    let mut projected_remaining = 0.0;
    let mut projections = BTreeMap::new();

    for col in &layout.month_columns {
        let value = cell_at(row, col.column_index).as_amount();
        yearly_total += value;
        if col.is_on_or_before(reference.year, reference.month) {
            completed_to_date += value;
        } else {
            projected_remaining += value;
        }
        // same key twice: later column overwrites, both still count in the sums
        projections.insert(col.key(), value);
    }

    let status = if completed_to_date >= yearly_total {
        JobStatus::Completed
    } else {
        JobStatus::InProgress
    };

    Ok(JobRecord {
        id,
        name,
        client: String::new(),
        yearly_total,
        completed_to_date,
        projected_remaining,
        status,
        progress: progress_percent(completed_to_date, yearly_total),
        projections,
    })
}

/// Rounded completion percentage, clamped to `0..=100`; zero when there is
/// nothing to complete.
pub fn progress_percent(completed: f64, total: f64) -> u8 {
    if total > 0.0 {
        (completed / total * 100.0).round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}
