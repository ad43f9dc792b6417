// src/grid/mod.rs
//! Loosely typed spreadsheet cells as produced by the decoders in [`decode`].
//!
//! Cells are never coerced implicitly: callers pick [`Cell::as_text`] or
//! [`Cell::as_amount`] depending on what the column is supposed to hold.

pub mod decode;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use decode::{grid_from_csv_reader, load_grid};

/// One decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

pub type Row = Vec<Cell>;
pub type Grid = Vec<Row>;

impl Cell {
    /// Classify a raw CSV field: blank → `Empty`, float literal → `Number`, else `Text`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(raw.to_string()),
        }
    }

    /// Empty cells and whitespace-only text do not count as populated.
    pub fn is_populated(&self) -> bool {
        match self {
            Cell::Empty => false,
            Cell::Number(_) => true,
            Cell::Text(s) => !s.trim().is_empty(),
        }
    }

    /// Cell rendered as trimmed text; `Empty` yields an empty string.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
        }
    }

    /// Cell read as a currency-like amount. Never fails: anything that does not
    /// yield a number counts as `0.0`.
    pub fn as_amount(&self) -> f64 {
        match self {
            Cell::Empty => 0.0,
            Cell::Number(n) if n.is_finite() => *n,
            Cell::Number(_) => 0.0,
            Cell::Text(s) => parse_amount(s),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

/// Cell at `idx`, or `Empty` past the end of a short row.
pub fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    const EMPTY: &Cell = &Cell::Empty;
    row.get(idx).unwrap_or(EMPTY)
}

/// Number of populated cells in a row.
pub fn populated_count(row: &[Cell]) -> usize {
    row.iter().filter(|c| c.is_populated()).count()
}

/// Whole numbers print without a fractional part (`1000`, not `1000.0`).
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Currency-like text → number.
///
/// Everything except digits, `.` and `-` is dropped, then the longest leading
/// numeric literal is read: `"$1,000"` → 1000, `"1.2.3"` → 1.2, `"12-3"` → 12.
pub fn parse_amount(raw: &str) -> f64 {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let bytes = kept.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || digits > 0 {
            digits += frac_end - frac_start;
            end = frac_end;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    kept[..end].parse().unwrap_or(0.0)
}
