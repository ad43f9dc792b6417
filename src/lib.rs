pub mod config;
pub mod export;
pub mod extract;
pub mod grid;
pub mod report;
pub mod text;

pub use extract::{extract, extract_with, Extraction, JobRecord, JobStatus, MonthColumn};
pub use grid::{Cell, Grid};
pub use text::{extract_text_records, TextRecord};
