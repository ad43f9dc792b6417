use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use glob::glob;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{fmt, EnvFilter};
use wipsheet::{
    config::Settings,
    export, extract,
    grid::{self, decode::SUPPORTED_EXTENSIONS},
    report::{self, FilterOptions, JobQuery, PortfolioMetrics},
    Extraction, JobStatus,
};

/// Summarise WIP job spreadsheets: per-job completed vs projected work.
#[derive(Parser, Debug)]
#[command(name = "wipsheet", version)]
struct Args {
    /// Spreadsheet files or directories containing them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reference date splitting completed from projected months (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,

    /// Only show jobs whose name, client or id contains this text
    #[arg(long, default_value = "")]
    search: String,

    /// Only show jobs with non-zero projections in this year
    #[arg(long)]
    year: Option<i32>,

    /// Only show jobs with this status ("Completed" or "In Progress")
    #[arg(long, value_parser = parse_status)]
    status: Option<JobStatus>,

    /// Write the full extraction as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the jobs as Parquet
    #[arg(long)]
    parquet: Option<PathBuf>,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date `{}`: {}", s, e))
}

fn parse_status(s: &str) -> std::result::Result<JobStatus, String> {
    JobStatus::from_str(s).ok_or_else(|| format!("unknown status `{}`", s))
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) settings ─────────────────────────────────────────────────
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    info!(%as_of, margin = settings.margin_pct, "startup");

    if let Some(dir) = &settings.output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    // ─── 3) discover input files ─────────────────────────────────────
    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        warn!("no spreadsheet files found; exit");
        return Ok(());
    }
    info!("{} spreadsheet(s) to extract", files.len());

    // ─── 4) decode + extract in parallel ─────────────────────────────
    let results: Vec<(PathBuf, Result<Extraction>)> = files
        .par_iter()
        .map(|path| (path.clone(), process_file(path, as_of, &settings)))
        .collect();

    // ─── 5) report in input order ────────────────────────────────────
    let query = JobQuery {
        search: args.search.clone(),
        year: args.year,
        status: args.status,
    };
    let multi = results.len() > 1;
    let mut failed_inputs = 0;

    for (path, result) in &results {
        let extraction = match result {
            Ok(extraction) => extraction,
            Err(err) => {
                error!("{} failed: {:#}", path.display(), err);
                failed_inputs += 1;
                continue;
            }
        };

        print_report(path, extraction, &query, &settings);

        let mut export_failed = false;
        if let Some(target) = &args.json {
            let out = settings.output_path(&output_name(target, path, multi));
            if let Err(e) = export::write_json(&out, extraction) {
                error!("writing {} failed: {:#}", out.display(), e);
                export_failed = true;
            }
        }
        if let Some(target) = &args.parquet {
            let out = settings.output_path(&output_name(target, path, multi));
            if let Err(e) = export::write_parquet(&out, &extraction.jobs) {
                error!("writing {} failed: {:#}", out.display(), e);
                export_failed = true;
            }
        }
        if export_failed {
            failed_inputs += 1;
        }
    }

    if failed_inputs == results.len() {
        return Err(anyhow!("every input failed"));
    }
    info!("all done");
    Ok(())
}

/// Files are kept as given; directories expand to the spreadsheets directly inside them.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found = Vec::new();
        for ext in SUPPORTED_EXTENSIONS {
            let pattern = format!("{}/*.{}", input.display(), ext);
            for entry in glob(&pattern).context("invalid glob pattern for input directory")? {
                match entry {
                    Ok(p) if p.is_file() => found.push(p),
                    Ok(_) => {}
                    Err(e) => warn!("cannot read glob entry: {:?}", e),
                }
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

#[instrument(level = "info", skip(path, settings), fields(file = %path.display()))]
fn process_file(path: &Path, as_of: NaiveDate, settings: &Settings) -> Result<Extraction> {
    let start = Instant::now();
    let grid = grid::load_grid(path)?;
    let extraction = extract::extract_with(&grid, as_of, &settings.extract);
    info!(
        rows = grid.len(),
        jobs = extraction.jobs.len(),
        months = extraction.month_columns.len(),
        skipped = extraction.skipped.len(),
        elapsed = ?start.elapsed(),
        "extracted"
    );
    Ok(extraction)
}

/// With several inputs, `jobs.json` becomes `jobs-<input stem>.json`.
fn output_name(target: &Path, input: &Path, multi: bool) -> PathBuf {
    if !multi {
        return target.to_path_buf();
    }
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let input_stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut name = format!("{}-{}", stem, input_stem);
    if let Some(ext) = target.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    target.with_file_name(name)
}

fn print_report(path: &Path, extraction: &Extraction, query: &JobQuery, settings: &Settings) {
    println!("\n=== {} ===", path.display());
    if extraction.is_empty() {
        println!("No header row or job data found.");
        return;
    }

    let shown = report::filter_jobs(&extraction.jobs, query);
    println!("{}", report::render_jobs_table(shown.iter().copied()));

    let options = FilterOptions::from_extraction(extraction);
    println!(
        "Years: {:?}  Months: {}",
        options.years,
        options.months.join(", ")
    );

    let metrics =
        PortfolioMetrics::compute(&extraction.jobs, settings.margin_pct, settings.fixed_overhead);
    println!(
        "Total {}  Completed {} ({}%)  Remaining {}  Active jobs {}",
        report::format_money(metrics.total_value),
        report::format_money(metrics.completed),
        metrics.completion_pct,
        report::format_money(metrics.remaining),
        metrics.active_jobs
    );
    println!(
        "Gross profit at {}%: {}  Net after overhead: {}",
        metrics.margin_pct,
        report::format_money(metrics.gross_profit),
        report::format_money(metrics.net_profit)
    );

    let scenarios: Vec<String> =
        report::profit_scenarios(metrics.completed, settings.fixed_overhead)
            .iter()
            .map(|s| {
                let flag = if s.breakeven { " (break-even)" } else { "" };
                format!("{}% {}{}", s.margin_pct, report::format_money(s.net_profit), flag)
            })
            .collect();
    println!("Net profit by margin: {}", scenarios.join("  "));
    match report::breakeven_revenue(settings.margin_pct, settings.fixed_overhead) {
        Some(revenue) => println!(
            "Break-even revenue at {}%: {}",
            settings.margin_pct,
            report::format_money(revenue)
        ),
        None => println!("No break-even revenue at a {}% margin.", settings.margin_pct),
    }

    let quarters = report::quarterly_rollup(&extraction.jobs);
    if !quarters.is_empty() {
        let line: Vec<String> = quarters
            .iter()
            .map(|(q, v)| format!("{} {}", q, report::format_money(*v)))
            .collect();
        println!("By quarter: {}", line.join("  "));
    }

    if !extraction.skipped.is_empty() {
        println!("Skipped {} row(s) without usable data.", extraction.skipped.len());
    }
}
