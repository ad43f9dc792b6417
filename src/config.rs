// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::extract::ExtractOptions;

/// Runtime settings, usually read from a YAML file.
///
/// ```yaml
/// extract:
///   skip_rows: 2
///   id_header: "Project #"
///   name_header: "Project Name"
///   dedupe_months: false
/// margin_pct: 15.0
/// fixed_overhead: 25000
/// output_dir: reports
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub extract: ExtractOptions,
    /// Profit margin applied to completed work, in percent.
    pub margin_pct: f64,
    pub fixed_overhead: f64,
    /// Where relative `--json` / `--parquet` outputs land.
    pub output_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            extract: ExtractOptions::default(),
            margin_pct: 15.0,
            fixed_overhead: 0.0,
            output_dir: None,
        }
    }
}

impl Settings {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text)?;
        if !settings.margin_pct.is_finite() {
            anyhow::bail!("margin_pct must be a finite number");
        }
        Ok(settings)
    }

    /// Resolve an output path against `output_dir`. Absolute paths pass through.
    pub fn output_path(&self, path: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
