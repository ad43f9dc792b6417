// src/text/mod.rs
//! Job facts pulled out of free text, such as status emails pasted from a
//! mail client.
//!
//! The text is cut into sections at blank lines, `------` / `======` rules and
//! `From:` / `Subject:` markers. Each section is scanned line by line and the
//! first match of every field wins.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::grid::parse_amount;

static SECTION_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n\s*\n|-{6,}|={6,}|From:|Subject:").expect("section pattern is valid")
});

/// `d/m/yyyy` (or `m/d/yyyy`) and ISO dates; kept as written.
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}/\d{1,2}/\d{4}|\d{4}-\d{2}-\d{2})").expect("date pattern is valid")
});

/// `Job #123`, `project no. P-220`, `Job: 42`. The number must hold a digit,
/// so `Project Name: ...` is not read as project number `Name`.
static JOB_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:job|project)\s*(?:#|no\.?|number)?\s*:?\s*([A-Za-z0-9-]*[0-9][A-Za-z0-9-]*)")
        .expect("job number pattern is valid")
});

static JOB_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:job|project)\s*name\s*:?\s*(.+)").expect("job name pattern is valid")
});

static DOLLARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[0-9,]+(?:\.[0-9]+)?").expect("dollar pattern is valid"));

static TOTAL_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)total|contract|value").expect("keyword pattern is valid"));
static COMPLETED_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)completed|done|finished").expect("keyword pattern is valid"));
static REMAINING_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)remaining|left|outstanding").expect("keyword pattern is valid"));

/// What one section of text says about a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextRecord {
    /// 1-based position among the non-blank sections.
    pub section: usize,
    pub date: Option<String>,
    pub job_number: Option<String>,
    pub job_name: Option<String>,
    pub total_value: Option<f64>,
    pub completed_work: Option<f64>,
    pub remaining_work: Option<f64>,
}

impl TextRecord {
    /// True when no field was found.
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.job_number.is_none()
            && self.job_name.is_none()
            && self.total_value.is_none()
            && self.completed_work.is_none()
            && self.remaining_work.is_none()
    }

    /// File a line's dollar amount under the first keyword bucket that the
    /// line mentions and that is still empty.
    fn bucket_amount(&mut self, line: &str, amount: f64) {
        let buckets: [(&Regex, &mut Option<f64>); 3] = [
            (&*TOTAL_WORDS, &mut self.total_value),
            (&*COMPLETED_WORDS, &mut self.completed_work),
            (&*REMAINING_WORDS, &mut self.remaining_work),
        ];
        for (words, slot) in buckets {
            if slot.is_none() && words.is_match(line) {
                *slot = Some(amount);
                return;
            }
        }
    }
}

/// Non-blank sections of `text`, trimmed.
pub fn split_sections(text: &str) -> Vec<&str> {
    SECTION_BREAK
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Scan one section. `section` is only copied into the record.
pub fn scan_section(section: usize, body: &str) -> TextRecord {
    let mut record = TextRecord {
        section,
        ..TextRecord::default()
    };

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if record.date.is_none() {
            record.date = DATE.captures(line).map(|c| c[1].to_string());
        }
        if record.job_number.is_none() {
            record.job_number = JOB_NUMBER.captures(line).map(|c| c[1].to_string());
        }
        if record.job_name.is_none() {
            record.job_name = JOB_NAME
                .captures(line)
                .map(|c| c[1].replace(['\'', '"'], "").trim().to_string())
                .filter(|name| !name.is_empty());
        }
        if let Some(m) = DOLLARS.find(line) {
            record.bucket_amount(line, parse_amount(m.as_str()));
        }
    }

    trace!(section, empty = record.is_empty(), "scanned section");
    record
}

/// Every section that yields at least one field, in text order.
pub fn extract_text_records(text: &str) -> Vec<TextRecord> {
    let sections = split_sections(text);
    let records: Vec<TextRecord> = sections
        .iter()
        .enumerate()
        .map(|(idx, body)| scan_section(idx + 1, body))
        .filter(|r| !r.is_empty())
        .collect();
    debug!(sections = sections.len(), records = records.len(), "scanned text");
    records
}
