// src/report/mod.rs
//! Dashboard views computed from an [`Extraction`]: search/filter, filter
//! dropdown options, per-job chart points, portfolio metrics, profit
//! scenarios and monthly/quarterly rollups.

pub mod table;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::extract::{Extraction, JobRecord, JobStatus};

pub use table::{format_money, render_jobs_table};

/// Search and filter predicates applied on top of extracted jobs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    /// Case-insensitive substring of name, client or id. Empty matches all.
    pub search: String,
    /// Keep jobs with a non-zero projection in this year.
    pub year: Option<i32>,
    pub status: Option<JobStatus>,
}

impl JobQuery {
    pub fn matches(&self, job: &JobRecord) -> bool {
        let needle = self.search.trim().to_lowercase();
        let text_ok = needle.is_empty()
            || job.name.to_lowercase().contains(&needle)
            || job.client.to_lowercase().contains(&needle)
            || job.id.to_lowercase().contains(&needle);

        let year_ok = match self.year {
            None => true,
            Some(year) => {
                let prefix = format!("{}-", year);
                job.projections
                    .iter()
                    .any(|(key, value)| key.starts_with(&prefix) && *value != 0.0)
            }
        };

        let status_ok = self.status.map_or(true, |s| s == job.status);

        text_ok && year_ok && status_ok
    }
}

/// Jobs matching `query`, in input order.
pub fn filter_jobs<'a>(jobs: &'a [JobRecord], query: &JobQuery) -> Vec<&'a JobRecord> {
    jobs.iter().filter(|job| query.matches(job)).collect()
}

/// Choices for the year / status / month dropdowns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Ascending.
    pub years: Vec<i32>,
    /// In order of first appearance.
    pub statuses: Vec<JobStatus>,
    /// Calendar order.
    pub months: Vec<&'static str>,
}

impl FilterOptions {
    pub fn from_extraction(extraction: &Extraction) -> Self {
        let years: BTreeSet<i32> = extraction.month_columns.iter().map(|c| c.year).collect();
        let months: BTreeMap<u32, &'static str> = extraction
            .month_columns
            .iter()
            .map(|c| (c.month, c.month_name()))
            .collect();

        let mut statuses = Vec::new();
        for job in &extraction.jobs {
            if !statuses.contains(&job.status) {
                statuses.push(job.status);
            }
        }

        Self {
            years: years.into_iter().collect(),
            statuses,
            months: months.into_values().collect(),
        }
    }
}

/// One bar group in the completed-vs-remaining chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub total: f64,
    pub completed: f64,
    pub remaining: f64,
}

/// Chart points, labelled by the first word of each job name (or its id).
pub fn chart_points(jobs: &[JobRecord]) -> Vec<ChartPoint> {
    jobs.iter()
        .map(|job| ChartPoint {
            label: job
                .name
                .split_whitespace()
                .next()
                .unwrap_or(job.id.as_str())
                .to_string(),
            total: job.yearly_total,
            completed: job.completed_to_date,
            remaining: job.projected_remaining,
        })
        .collect()
}

/// Headline numbers across all jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioMetrics {
    pub total_value: f64,
    pub completed: f64,
    pub remaining: f64,
    /// One decimal place; zero when there is no value.
    pub completion_pct: f64,
    pub margin_pct: f64,
    /// Completed work at the margin.
    pub gross_profit: f64,
    pub fixed_overhead: f64,
    pub net_profit: f64,
    pub active_jobs: usize,
}

impl PortfolioMetrics {
    pub fn compute(jobs: &[JobRecord], margin_pct: f64, fixed_overhead: f64) -> Self {
        let total_value: f64 = jobs.iter().map(|j| j.yearly_total).sum();
        let completed: f64 = jobs.iter().map(|j| j.completed_to_date).sum();
        let remaining: f64 = jobs.iter().map(|j| j.projected_remaining).sum();
        let completion_pct = if total_value > 0.0 {
            (completed / total_value * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let gross_profit = completed * margin_pct / 100.0;

        Self {
            total_value,
            completed,
            remaining,
            completion_pct,
            margin_pct,
            gross_profit,
            fixed_overhead,
            net_profit: gross_profit - fixed_overhead,
            active_jobs: jobs
                .iter()
                .filter(|j| j.status == JobStatus::InProgress)
                .count(),
        }
    }
}

/// Margins tabulated by [`profit_scenarios`], in percent.
pub const SCENARIO_MARGINS: [f64; 6] = [5.0, 10.0, 15.0, 20.0, 25.0, 30.0];

/// Profit at one margin for a fixed revenue base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitScenario {
    pub margin_pct: f64,
    pub gross_profit: f64,
    /// Floored at zero.
    pub net_profit: f64,
    /// Gross profit covers overhead to within a cent.
    pub breakeven: bool,
}

/// What-if table over [`SCENARIO_MARGINS`] for `base_revenue`, usually the
/// completed work to date.
pub fn profit_scenarios(base_revenue: f64, fixed_overhead: f64) -> Vec<ProfitScenario> {
    SCENARIO_MARGINS
        .iter()
        .map(|&margin_pct| {
            let gross_profit = base_revenue * margin_pct / 100.0;
            let net = gross_profit - fixed_overhead;
            ProfitScenario {
                margin_pct,
                gross_profit,
                net_profit: net.max(0.0),
                breakeven: net.abs() < 0.005,
            }
        })
        .collect()
}

/// Revenue at which `margin_pct` exactly pays for `fixed_overhead`. `None`
/// for a zero or negative margin, which never breaks even.
pub fn breakeven_revenue(margin_pct: f64, fixed_overhead: f64) -> Option<f64> {
    if margin_pct > 0.0 {
        Some(fixed_overhead * 100.0 / margin_pct)
    } else {
        None
    }
}

/// Sum of every job's projection per `"YYYY-MM"` key.
pub fn monthly_rollup(jobs: &[JobRecord]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for job in jobs {
        for (key, value) in &job.projections {
            *out.entry(key.clone()).or_insert(0.0) += value;
        }
    }
    out
}

/// Calendar quarter of a projection key, e.g. `"2025-05"` → `(2025, 2)`.
fn quarter_of(key: &str) -> Option<(i32, u32)> {
    let (year, month) = key.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some((year, (month - 1) / 3 + 1))
}

/// Quarterly totals, ordered by (year, quarter). Labels read `"Q2-2025"`.
pub fn quarterly_rollup(jobs: &[JobRecord]) -> Vec<(String, f64)> {
    let mut by_quarter: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (key, value) in monthly_rollup(jobs) {
        if let Some(q) = quarter_of(&key) {
            *by_quarter.entry(q).or_insert(0.0) += value;
        }
    }
    by_quarter
        .into_iter()
        .map(|((year, q), value)| (format!("Q{}-{}", q, year), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MonthColumn;

    fn job(id: &str, name: &str, projections: &[(&str, f64)], completed: f64) -> JobRecord {
        let total: f64 = projections.iter().map(|(_, v)| v).sum();
        JobRecord {
            id: id.to_string(),
            name: name.to_string(),
            client: String::new(),
            yearly_total: total,
            completed_to_date: completed,
            projected_remaining: total - completed,
            status: if completed >= total {
                JobStatus::Completed
            } else {
                JobStatus::InProgress
            },
            progress: 0,
            projections: projections
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    fn jobs() -> Vec<JobRecord> {
        vec![
            job("P-100", "Acme Sewer Line", &[("2025-01", 1000.0), ("2025-02", 2000.0)], 3000.0),
            job("P-200", "Downtown Office", &[("2024-12", 500.0), ("2025-04", 1500.0)], 500.0),
            job("W-7", "", &[("2025-01", 0.0)], 0.0),
        ]
    }

    #[test]
    fn search_is_case_insensitive_over_name_and_id() {
        let jobs = jobs();
        let q = JobQuery {
            search: "SEWER".into(),
            ..JobQuery::default()
        };
        assert_eq!(filter_jobs(&jobs, &q).len(), 1);

        let q = JobQuery {
            search: "p-2".into(),
            ..JobQuery::default()
        };
        let hits = filter_jobs(&jobs, &q);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Downtown Office");

        assert_eq!(filter_jobs(&jobs, &JobQuery::default()).len(), 3);
    }

    #[test]
    fn year_and_status_filters_combine() {
        let jobs = jobs();
        let q = JobQuery {
            year: Some(2024),
            ..JobQuery::default()
        };
        let ids: Vec<&str> = filter_jobs(&jobs, &q).iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["P-200"]);

        // zero-valued projections do not place a job in a year
        let q = JobQuery {
            year: Some(2025),
            status: Some(JobStatus::Completed),
            ..JobQuery::default()
        };
        let ids: Vec<&str> = filter_jobs(&jobs, &q).iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["P-100"]);
    }

    #[test]
    fn filter_options_are_distinct_and_ordered() {
        let col = |month, year| MonthColumn {
            column_index: 0,
            month,
            year,
            label: String::new(),
        };
        let extraction = Extraction {
            jobs: jobs(),
            month_columns: vec![col(3, 2025), col(12, 2024), col(1, 2025), col(3, 2025)],
            skipped: Vec::new(),
        };
        let opts = FilterOptions::from_extraction(&extraction);
        assert_eq!(opts.years, vec![2024, 2025]);
        assert_eq!(opts.statuses, vec![JobStatus::Completed, JobStatus::InProgress]);
        assert_eq!(opts.months, vec!["January", "March", "December"]);
    }

    #[test]
    fn chart_labels_use_first_word() {
        let points = chart_points(&jobs());
        assert_eq!(points[0].label, "Acme");
        assert_eq!(points[1].remaining, 1500.0);
        assert_eq!(points[2].label, "W-7");
    }

    #[test]
    fn metrics_apply_margin_and_overhead() {
        let m = PortfolioMetrics::compute(&jobs(), 15.0, 100.0);
        assert_eq!(m.total_value, 5000.0);
        assert_eq!(m.completed, 3500.0);
        assert_eq!(m.remaining, 1500.0);
        assert_eq!(m.completion_pct, 70.0);
        assert_eq!(m.gross_profit, 525.0);
        assert_eq!(m.net_profit, 425.0);
        assert_eq!(m.active_jobs, 1);

        let empty = PortfolioMetrics::compute(&[], 15.0, 0.0);
        assert_eq!(empty.completion_pct, 0.0);
        assert_eq!(empty.active_jobs, 0);
    }

    #[test]
    fn scenarios_floor_net_profit_at_zero() {
        let rows = profit_scenarios(312_500.0, 25_000.0);
        let margins: Vec<f64> = rows.iter().map(|r| r.margin_pct).collect();
        assert_eq!(margins, vec![5.0, 10.0, 15.0, 20.0, 25.0, 30.0]);

        assert_eq!(rows[0].gross_profit, 15_625.0);
        assert_eq!(rows[0].net_profit, 0.0);
        assert!(!rows[0].breakeven);
        assert_eq!(rows[1].gross_profit, 31_250.0);
        assert_eq!(rows[1].net_profit, 6_250.0);
        assert_eq!(rows[5].net_profit, 68_750.0);
    }

    #[test]
    fn scenario_flags_exact_breakeven() {
        let rows = profit_scenarios(100_000.0, 10_000.0);
        let flagged: Vec<f64> = rows
            .iter()
            .filter(|r| r.breakeven)
            .map(|r| r.margin_pct)
            .collect();
        assert_eq!(flagged, vec![10.0]);
        assert_eq!(rows[1].net_profit, 0.0);

        // no revenue and no overhead breaks even at every margin
        assert!(profit_scenarios(0.0, 0.0).iter().all(|r| r.breakeven));
    }

    #[test]
    fn breakeven_revenue_guards_zero_margin() {
        assert_eq!(breakeven_revenue(10.0, 10_000.0), Some(100_000.0));
        let at_15 = breakeven_revenue(15.0, 25_000.0).unwrap();
        assert!((at_15 - 166_666.666).abs() < 0.01);
        assert_eq!(breakeven_revenue(0.0, 25_000.0), None);
        assert_eq!(breakeven_revenue(-5.0, 25_000.0), None);
        assert_eq!(breakeven_revenue(20.0, 0.0), Some(0.0));
    }

    #[test]
    fn rollups_group_by_month_and_quarter() {
        let jobs = jobs();
        let monthly = monthly_rollup(&jobs);
        assert_eq!(monthly["2025-01"], 1000.0);
        assert_eq!(monthly.len(), 4);

        let quarterly = quarterly_rollup(&jobs);
        assert_eq!(
            quarterly,
            vec![
                ("Q4-2024".to_string(), 500.0),
                ("Q1-2025".to_string(), 3000.0),
                ("Q2-2025".to_string(), 1500.0),
            ]
        );
    }
}
