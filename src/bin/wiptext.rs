use anyhow::{Context, Result};
use clap::Parser;
use prettytable::{format, Cell, Row, Table};
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use wipsheet::{export, report::format_money, text, TextRecord};

/// Pull job numbers, names, dates and dollar amounts out of pasted text such as
/// status emails.
#[derive(Parser, Debug)]
#[command(name = "wiptext", version)]
struct Args {
    /// Text files to scan; stdin when none are given
    inputs: Vec<PathBuf>,

    /// Write the records as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let input = read_inputs(&args.inputs)?;
    let records = text::extract_text_records(&input);
    info!(records = records.len(), "scanned input");

    if records.is_empty() {
        warn!("no job data found in the text");
        println!("No job data found.");
        return Ok(());
    }
    println!("{}", render_records(&records));

    if let Some(path) = &args.csv {
        export::write_csv(path, &records)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Files are joined with a blank line, so no section spans two files.
fn read_inputs(inputs: &[PathBuf]) -> Result<String> {
    if inputs.is_empty() {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    let mut parts = Vec::with_capacity(inputs.len());
    for path in inputs {
        parts.push(
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        );
    }
    Ok(parts.join("\n\n"))
}

fn render_records(records: &[TextRecord]) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(Row::new(
        ["#", "Date", "Job #", "Job Name", "Total", "Completed", "Remaining"]
            .iter()
            .map(|h| Cell::new(h).style_spec("bFg"))
            .collect(),
    ));

    let money = |v: Option<f64>| v.map(format_money).unwrap_or_default();
    for r in records {
        table.add_row(Row::new(vec![
            Cell::new(&r.section.to_string()),
            Cell::new(r.date.as_deref().unwrap_or("")),
            Cell::new(r.job_number.as_deref().unwrap_or("")),
            Cell::new(r.job_name.as_deref().unwrap_or("")),
            Cell::new(&money(r.total_value)).style_spec("r"),
            Cell::new(&money(r.completed_work)).style_spec("r"),
            Cell::new(&money(r.remaining_work)).style_spec("r"),
        ]));
    }
    table.to_string()
}
