//! CLI command implementations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use tracing::debug;

use crate::config::{ConfigOverrides, apply_overrides};
use crate::core::report::Report;
use crate::exit_codes;
use crate::io::digest::file_sha256;
use crate::plan::{Plan, run_plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Options for `grade run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub plan: PathBuf,
    pub submission: PathBuf,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
    pub overrides: ConfigOverrides,
}

/// JSON report with run metadata.
#[derive(Debug, Serialize)]
struct ReportEnvelope<'a> {
    graded_at: String,
    submission: String,
    #[serde(flatten)]
    report: &'a Report,
}

/// Grade a submission and emit the report. Returns the process exit code.
pub fn grade(options: &RunOptions) -> Result<i32> {
    let plan = Plan::load(&options.plan).context("load plan")?;
    let config = apply_overrides(plan.config.clone(), &options.overrides)?;
    debug!(plan = %options.plan.display(), config = ?config, "plan loaded");

    let report = run_plan(&plan, config, &options.submission).context("grade submission")?;
    let rendered = match options.format {
        ReportFormat::Text => report.render_text(),
        ReportFormat::Json => render_json(&report, &options.submission)?,
    };
    match &options.output {
        Some(path) => write_report(path, &rendered)?,
        None => print!("{rendered}"),
    }
    Ok(exit_code_for(&report))
}

pub fn exit_code_for(report: &Report) -> i32 {
    if report.is_terminated() {
        exit_codes::REJECTED
    } else if !report.passed {
        exit_codes::BELOW_THRESHOLD
    } else {
        exit_codes::OK
    }
}

/// Print `<sha256>  <path>` for each file, for pinning in a plan.
pub fn hash_files(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        let digest = file_sha256(path)?;
        println!("{}  {}", digest, path.display());
    }
    Ok(())
}

/// Validate a plan and print what it will run.
pub fn check_plan(path: &Path) -> Result<()> {
    let plan = Plan::load(path)?;
    let name = plan.assignment.name.as_deref().unwrap_or("(unnamed)");
    println!(
        "plan: assignment={} checks={} points={}/{} threshold={}",
        name,
        plan.checks.len(),
        plan.available_points(),
        plan.assignment.total_points,
        plan.assignment.passing_threshold
    );
    Ok(())
}

fn render_json(report: &Report, submission: &Path) -> Result<String> {
    let envelope = ReportEnvelope {
        graded_at: Utc::now().to_rfc3339(),
        submission: submission.display().to_string(),
        report,
    };
    let mut contents = serde_json::to_string_pretty(&envelope).context("serialize report")?;
    contents.push('\n');
    Ok(contents)
}

fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write report {}", path.display()))?;
    Ok(())
}
