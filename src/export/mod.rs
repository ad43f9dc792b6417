// src/export/mod.rs
use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Float64Array, StringArray, UInt8Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::Serialize;
use std::{
    collections::BTreeSet,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};
use tracing::{info, instrument};

use crate::extract::{Extraction, JobRecord};

/// Write the extraction as pretty JSON.
///
/// Goes through a hidden `.<name>.tmp` next to the target and a rename, so a
/// reader never sees a half-written file.
#[instrument(level = "info", skip(path, extraction), fields(path = %path.as_ref().display()))]
pub fn write_json<P: AsRef<Path>>(path: P, extraction: &Extraction) -> Result<()> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("output path {:?} has no file name", path))?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

    {
        let tmp = File::create(&tmp_path)
            .with_context(|| format!("creating {:?}", tmp_path))?;
        let mut writer = BufWriter::new(tmp);
        serde_json::to_writer_pretty(&mut writer, extraction).context("serializing JSON")?;
        writer.write_all(b"\n")?;
        writer.flush().with_context(|| format!("flushing {:?}", tmp_path))?;
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp_path, path))?;
    info!(jobs = extraction.jobs.len(), "wrote JSON");
    Ok(())
}

/// Arrow schema for a set of jobs: fixed job columns followed by one nullable
/// `Float64` column per projection key, sorted.
pub fn jobs_schema(keys: &BTreeSet<String>) -> Schema {
    let mut fields = vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("client", DataType::Utf8, false),
        Field::new("yearly_total", DataType::Float64, false),
        Field::new("completed_to_date", DataType::Float64, false),
        Field::new("projected_remaining", DataType::Float64, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("progress", DataType::UInt8, false),
    ];
    fields.extend(keys.iter().map(|k| Field::new(k, DataType::Float64, true)));
    Schema::new(fields)
}

/// Build one record batch holding every job.
pub fn jobs_to_batch(jobs: &[JobRecord]) -> Result<RecordBatch> {
    let keys: BTreeSet<String> = jobs
        .iter()
        .flat_map(|j| j.projections.keys().cloned())
        .collect();
    let schema = Arc::new(jobs_schema(&keys));

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(jobs.iter().map(|j| j.id.as_str()))),
        Arc::new(StringArray::from_iter_values(jobs.iter().map(|j| j.name.as_str()))),
        Arc::new(StringArray::from_iter_values(jobs.iter().map(|j| j.client.as_str()))),
        Arc::new(Float64Array::from_iter_values(jobs.iter().map(|j| j.yearly_total))),
        Arc::new(Float64Array::from_iter_values(jobs.iter().map(|j| j.completed_to_date))),
        Arc::new(Float64Array::from_iter_values(jobs.iter().map(|j| j.projected_remaining))),
        Arc::new(StringArray::from_iter_values(jobs.iter().map(|j| j.status.as_str()))),
        Arc::new(UInt8Array::from_iter_values(jobs.iter().map(|j| j.progress))),
    ];
    for key in &keys {
        let values: Float64Array = jobs.iter().map(|j| j.projections.get(key).copied()).collect();
        columns.push(Arc::new(values));
    }

    RecordBatch::try_new(schema, columns).context("building jobs record batch")
}

/// Write jobs as a single SNAPPY-compressed Parquet file.
#[instrument(level = "info", skip(path, jobs), fields(path = %path.as_ref().display()))]
pub fn write_parquet<P: AsRef<Path>>(path: P, jobs: &[JobRecord]) -> Result<()> {
    let path = path.as_ref();
    let batch = jobs_to_batch(jobs)?;

    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer for jobs")?;
    writer.write(&batch).context("writing jobs batch")?;
    writer.close().context("closing jobs writer")?;

    info!(jobs = jobs.len(), "wrote Parquet");
    Ok(())
}

/// Write rows as CSV, one record per row, with a header line taken from the
/// field names. Nothing is written for an empty slice.
#[instrument(level = "info", skip(path, rows), fields(path = %path.as_ref().display()))]
pub fn write_csv<P: AsRef<Path>, T: Serialize>(path: P, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if rows.is_empty() {
        info!("no rows; skipping CSV");
        return Ok(());
    }

    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {:?}", path))?;
    for (idx, row) in rows.iter().enumerate() {
        writer
            .serialize(row)
            .with_context(|| format!("serializing CSV row {}", idx))?;
    }
    writer.flush().with_context(|| format!("flushing {:?}", path))?;

    info!(rows = rows.len(), "wrote CSV");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::JobStatus;
    use arrow::array::Array;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn sample_jobs() -> Vec<JobRecord> {
        vec![
            JobRecord {
                id: "P-100".into(),
                name: "Acme Sewer Line".into(),
                client: String::new(),
                yearly_total: 3000.0,
                completed_to_date: 1000.0,
                projected_remaining: 2000.0,
                status: JobStatus::InProgress,
                progress: 33,
                projections: [("2025-01".to_string(), 1000.0), ("2025-02".to_string(), 2000.0)]
                    .into_iter()
                    .collect(),
            },
            JobRecord {
                id: "P-200".into(),
                name: "Bridge Deck".into(),
                client: String::new(),
                yearly_total: 50.0,
                completed_to_date: 50.0,
                projected_remaining: 0.0,
                status: JobStatus::Completed,
                progress: 100,
                projections: [("2024-12".to_string(), 50.0)].into_iter().collect(),
            },
        ]
    }

    #[test]
    fn json_is_written_atomically() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("jobs.json");
        let extraction = Extraction {
            jobs: sample_jobs(),
            ..Extraction::default()
        };

        write_json(&path, &extraction)?;

        assert!(!dir.path().join(".jobs.json.tmp").exists());
        let text = fs::read_to_string(&path)?;
        assert!(text.ends_with("}\n"));
        let back: Extraction = serde_json::from_str(&text)?;
        assert_eq!(back, extraction);
        assert!(text.contains("\"In Progress\""));
        Ok(())
    }

    #[test]
    fn parquet_has_one_column_per_projection_key() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("jobs.parquet");
        write_parquet(&path, &sample_jobs())?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches: Vec<RecordBatch> = reader.collect::<std::result::Result<_, _>>()?;
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);

        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(&names[8..], &["2024-12", "2025-01", "2025-02"]);

        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("id column is utf8");
        assert_eq!(ids.value(1), "P-200");

        let dec = batch
            .column(8)
            .as_any()
            .downcast_ref::<Float64Array>()
            .expect("projection column is f64");
        assert!(dec.is_null(0));
        assert_eq!(dec.value(1), 50.0);
        Ok(())
    }

    #[test]
    fn text_records_write_as_csv_with_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("mail.csv");
        let records = crate::text::extract_text_records(
            "Project #P-220\nProject name: Harbor Wall\nContract value $120,000.50\n\nJob 7",
        );
        write_csv(&path, &records)?;

        let text = fs::read_to_string(&path)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "section,date,job_number,job_name,total_value,completed_work,remaining_work"
        );
        assert!(lines[1].starts_with("1,,P-220,Harbor Wall,120000.5"));
        assert!(lines[2].starts_with("2,,7,,"));

        let empty = dir.path().join("none.csv");
        write_csv::<_, crate::text::TextRecord>(&empty, &[])?;
        assert!(!empty.exists());
        Ok(())
    }

    #[test]
    fn empty_job_list_still_writes() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("empty.parquet");
        write_parquet(&path, &[])?;
        assert!(path.exists());
        Ok(())
    }
}
