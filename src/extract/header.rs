// src/extract/header.rs
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use super::ExtractOptions;
use crate::grid::{populated_count, Cell};

/// Full English month names, in calendar order.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One regex per month, case-insensitive, tried in calendar order.
static MONTH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    MONTH_NAMES
        .iter()
        .map(|name| Regex::new(&format!("(?i){}", name)).expect("month pattern is valid"))
        .collect()
});

/// First run of exactly four digits not glued to other digits.
static YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{4})(?:[^0-9]|$)").expect("year pattern is valid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// A header column that carries one calendar month of projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthColumn {
    pub column_index: usize,
    /// 1..=12
    pub month: u32,
    pub year: i32,
    /// Header text as it appeared in the sheet.
    pub label: String,
}

impl MonthColumn {
    /// Projection key, `"YYYY-MM"`.
    pub fn key(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// Full month name, e.g. `"March"`.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// True when this column's month is at or before `(year, month)`.
    pub fn is_on_or_before(&self, year: i32, month: u32) -> bool {
        (self.year, self.month) <= (year, month)
    }
}

/// Everything pass 1 learns from the header row.
#[derive(Debug, Clone, Default)]
pub struct ColumnLayout {
    /// Normalized header text → column index; the last duplicate wins.
    pub header_map: HashMap<String, usize>,
    pub id_col: Option<usize>,
    pub name_col: Option<usize>,
    pub month_columns: Vec<MonthColumn>,
}

/// Collapse whitespace runs (line breaks included) to one space, trim and
/// lower-case.
pub fn normalize_header(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_lowercase()
}

/// Index of the header row: the first row at or after `skip` with at least two
/// populated cells.
pub fn find_header_row(grid: &[Vec<Cell>], skip: usize) -> Option<usize> {
    grid.iter()
        .enumerate()
        .skip(skip)
        .find(|(_, row)| populated_count(row) >= 2)
        .map(|(idx, _)| idx)
}

/// Month and year named in a header, if it names both.
///
/// The first month name found (in calendar order) wins; the year is the first
/// stand-alone four-digit run. The pair must form a real calendar date.
pub fn detect_month(header: &str) -> Option<(u32, i32)> {
    let month_idx = MONTH_PATTERNS.iter().position(|re| re.is_match(header))?;
    let year: i32 = YEAR_PATTERN.captures(header)?.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month_idx as u32 + 1, 1)?;
    Some((date.month(), date.year()))
}

/// Pass 1: build the column layout from a header row.
pub fn discover_columns(header: &[Cell], opts: &ExtractOptions) -> ColumnLayout {
    let mut layout = ColumnLayout::default();
    let mut seen_months: HashSet<(i32, u32)> = HashSet::new();

    for (idx, cell) in header.iter().enumerate() {
        let label = cell.as_text();
        let normalized = normalize_header(&label);
        if normalized.is_empty() {
            continue;
        }

        if let Some((month, year)) = detect_month(&normalized) {
            if opts.dedupe_months && !seen_months.insert((year, month)) {
                debug!(column = idx, label = %label, "dropping duplicate month column");
            } else {
                seen_months.insert((year, month));
                trace!(column = idx, month, year, "month column");
                layout.month_columns.push(MonthColumn {
                    column_index: idx,
                    month,
                    year,
                    label: label.clone(),
                });
            }
        }

        layout.header_map.insert(normalized, idx);
    }

    layout.id_col = layout
        .header_map
        .get(&normalize_header(&opts.id_header))
        .copied();
    layout.name_col = layout
        .header_map
        .get(&normalize_header(&opts.name_header))
        .copied();

    debug!(
        id_col = ?layout.id_col,
        name_col = ?layout.name_col,
        months = layout.month_columns.len(),
        "discovered columns"
    );
    layout
}
