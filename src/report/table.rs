// src/report/table.rs
use prettytable::{format, Cell, Row, Table};

use crate::extract::JobRecord;

/// Dollar amount with thousands separators and no cents, e.g. `-$1,250`.
pub fn format_money(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Box-drawn table of jobs, one line each.
pub fn render_jobs_table<'a, I>(jobs: I) -> String
where
    I: IntoIterator<Item = &'a JobRecord>,
{
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    table.add_row(Row::new(vec![
        Cell::new("Project #").style_spec("bFg"),
        Cell::new("Project Name").style_spec("bFg"),
        Cell::new("Total").style_spec("bFg"),
        Cell::new("Completed").style_spec("bFg"),
        Cell::new("Remaining").style_spec("bFg"),
        Cell::new("Progress").style_spec("bFg"),
        Cell::new("Status").style_spec("bFg"),
    ]));

    for job in jobs {
        table.add_row(Row::new(vec![
            Cell::new(&job.id),
            Cell::new(&job.name),
            Cell::new(&format_money(job.yearly_total)).style_spec("r"),
            Cell::new(&format_money(job.completed_to_date)).style_spec("r"),
            Cell::new(&format_money(job.projected_remaining)).style_spec("r"),
            Cell::new(&format!("{}%", job.progress)).style_spec("r"),
            Cell::new(job.status.as_str()),
        ]));
    }

    table.to_string()
}
