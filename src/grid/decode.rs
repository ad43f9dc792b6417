// src/grid/decode.rs
use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use csv::ReaderBuilder;
use std::{fs::File, io::Read, path::Path};
use tracing::{debug, instrument};

use super::{Cell, Grid, Row};

/// File extensions we know how to decode, lower-case.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xlsm", "xls", "ods"];

/// Decode a spreadsheet file into a grid, choosing the decoder by extension.
///
/// - `.csv` goes through the `csv` reader (no header row, ragged rows allowed)
/// - workbook formats go through `calamine`, first worksheet only
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn load_grid<P: AsRef<Path>>(path: P) -> Result<Grid> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let grid = match ext.as_str() {
        "csv" => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
            grid_from_csv_reader(file)
                .with_context(|| format!("Failed to decode CSV file: {:?}", path))?
        }
        "xlsx" | "xlsm" | "xls" | "ods" => load_workbook(path)?,
        other => bail!(
            "unsupported spreadsheet extension `{}` for {:?} (expected one of {:?})",
            other,
            path,
            SUPPORTED_EXTENSIONS
        ),
    };

    debug!(rows = grid.len(), "decoded grid");
    Ok(grid)
}

/// Decode CSV bytes into a grid. Every record becomes one row, including the
/// preamble rows above the header.
pub fn grid_from_csv_reader<R: Read>(reader: R) -> Result<Grid> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut grid = Grid::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        grid.push(record.iter().map(Cell::from_raw).collect());
    }
    Ok(grid)
}

fn load_workbook(path: &Path) -> Result<Grid> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {:?}", path))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => {
            range.with_context(|| format!("Failed to read first worksheet of {:?}", path))?
        }
        None => bail!("workbook {:?} has no worksheets", path),
    };

    Ok(grid_from_range(&range))
}

/// Turn a worksheet range into a grid.
///
/// calamine trims leading blank rows/columns; they are padded back so row and
/// column indices match what the user sees in the sheet. The range itself is
/// rectangular, so trailing empty cells are dropped again: a row ends at its
/// last populated cell, like a CSV record does.
fn grid_from_range(range: &Range<Data>) -> Grid {
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid: Grid = vec![Row::new(); row_offset];
    for data_row in range.rows() {
        let used = data_row
            .iter()
            .rposition(|d| !matches!(d, Data::Empty))
            .map_or(0, |last| last + 1);
        let mut row = Row::new();
        if used > 0 {
            row.resize(col_offset, Cell::Empty);
            row.extend(data_row[..used].iter().map(cell_from_data));
        }
        grid.push(row);
    }
    grid
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::SkipReason;
    use chrono::NaiveDate;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;
    use tempfile::{tempdir, Builder};

    #[test]
    fn csv_keeps_ragged_rows_and_preamble() -> Result<()> {
        let content = "WIP Report,,\n,,\nProject #,Project Name,January 2025\nP-1,\"Main St, Phase 2\",\"$1,000\"\nP-2\n";
        let grid = grid_from_csv_reader(content.as_bytes())?;

        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0], vec![Cell::Text("WIP Report".into()), Cell::Empty, Cell::Empty]);
        assert_eq!(grid[1], vec![Cell::Empty; 3]);
        assert_eq!(grid[3][1], Cell::Text("Main St, Phase 2".into()));
        assert_eq!(grid[3][2].as_amount(), 1000.0);
        assert_eq!(grid[4], vec![Cell::Text("P-2".into())]);
        Ok(())
    }

    #[test]
    fn load_grid_dispatches_on_extension() -> Result<()> {
        let mut tmp = Builder::new().suffix(".CSV").tempfile()?;
        tmp.write_all(b"a,b\n1,2\n")?;
        let grid = load_grid(tmp.path())?;
        assert_eq!(grid[1], vec![Cell::Number(1.0), Cell::Number(2.0)]);
        Ok(())
    }

    #[test]
    fn load_grid_rejects_unknown_extension() -> Result<()> {
        let tmp = Builder::new().suffix(".txt").tempfile()?;
        let err = load_grid(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported spreadsheet extension"));
        Ok(())
    }

    #[test]
    fn range_rows_end_at_last_populated_cell() {
        // B3:D5, so two padded rows above and one padded column to the left
        let mut range: Range<Data> = Range::new((2, 1), (4, 3));
        range.set_value((2, 1), Data::String("Project #".into()));
        range.set_value((2, 2), Data::String("Project Name".into()));
        range.set_value((2, 3), Data::String("January 2025".into()));
        range.set_value((3, 1), Data::String("Subtotal".into()));
        range.set_value((4, 1), Data::String("P-1".into()));
        range.set_value((4, 3), Data::Float(100.0));

        let grid = grid_from_range(&range);
        assert_eq!(grid.len(), 5);
        assert!(grid[0].is_empty());
        assert!(grid[1].is_empty());
        assert_eq!(grid[2].len(), 4);
        assert_eq!(grid[2][0], Cell::Empty);
        assert_eq!(grid[3], vec![Cell::Empty, Cell::Text("Subtotal".into())]);
        assert_eq!(
            grid[4],
            vec![Cell::Empty, Cell::Text("P-1".into()), Cell::Empty, Cell::Number(100.0)]
        );
    }

    #[test]
    fn xlsx_footer_row_is_not_a_job() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("wip.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Monthly WIP")?;
        sheet.write_string(2, 0, "Project #")?;
        sheet.write_string(2, 1, "Project Name")?;
        sheet.write_string(2, 2, "January 2025")?;
        sheet.write_string(3, 0, "P-1")?;
        sheet.write_string(3, 1, "Real Job")?;
        sheet.write_number(3, 2, 100.0)?;
        sheet.write_string(4, 0, "Subtotal")?;
        workbook.save(&path)?;

        let grid = load_grid(&path)?;
        assert_eq!(grid.len(), 5);
        assert_eq!(grid[0], vec![Cell::Text("Monthly WIP".into())]);
        assert!(grid[1].is_empty());
        assert_eq!(grid[3][2], Cell::Number(100.0));
        assert_eq!(grid[4], vec![Cell::Text("Subtotal".into())]);

        let as_of = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let extraction = crate::extract(&grid, as_of);
        assert_eq!(extraction.jobs.len(), 1);
        assert_eq!(extraction.jobs[0].id, "P-1");
        assert_eq!(extraction.jobs[0].yearly_total, 100.0);
        assert_eq!(extraction.skipped.len(), 1);
        assert_eq!(extraction.skipped[0].row_index, 4);
        assert_eq!(extraction.skipped[0].reason, SkipReason::TooFewCells);
        Ok(())
    }

    #[test]
    fn workbook_cells_map_to_grid_cells() {
        assert_eq!(cell_from_data(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(cell_from_data(&Data::Empty), Cell::Empty);
        assert_eq!(
            cell_from_data(&Data::String("Jan 2025".into())),
            Cell::Text("Jan 2025".into())
        );
        assert_eq!(cell_from_data(&Data::Bool(true)), Cell::Text("TRUE".into()));
    }
}
