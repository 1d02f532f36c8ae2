//! Running a GoogleTest binary once and recovering its verdicts.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::gtest::{GtestResults, parse_console_output, parse_json_report};
use crate::io::process::{CommandOutput, ProcessLimits, run_command};

/// Where the verdicts of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    JsonReport,
    /// The JSON report was missing or unreadable; console lines were parsed.
    ConsoleOutput,
}

#[derive(Debug)]
pub struct GtestRun {
    pub results: GtestResults,
    pub source: ResultSource,
    pub output: CommandOutput,
}

impl GtestRun {
    /// The binary died without reporting normally (signal, timeout, or no JSON report).
    pub fn abnormal_exit(&self) -> bool {
        self.output.timed_out
            || self.output.status.code().is_none()
            || self.source == ResultSource::ConsoleOutput
    }
}

/// Execute `binary` (relative to `root`) with a JSON report in a temp dir.
///
/// Errors only when the binary cannot be launched.
#[instrument(skip_all, fields(binary = %binary))]
pub fn run_gtest_binary(root: &Path, binary: &str, limits: ProcessLimits) -> Result<GtestRun> {
    let report_dir = tempfile::tempdir().context("create gtest report dir")?;
    let report_path = report_dir.path().join("gtest_report.json");

    let mut command = Command::new(root.join(binary));
    command
        .arg(format!("--gtest_output=json:{}", report_path.display()))
        .current_dir(root);
    let output = run_command(command, limits).with_context(|| format!("run test binary {binary}"))?;

    let parsed = fs::read_to_string(&report_path)
        .with_context(|| format!("read {}", report_path.display()))
        .and_then(|contents| parse_json_report(&contents));
    let (results, source) = match parsed {
        Ok(results) => (results, ResultSource::JsonReport),
        Err(err) => {
            warn!(err = %format!("{err:#}"), "gtest json report unavailable, parsing console output");
            let console = String::from_utf8_lossy(&output.stdout);
            (parse_console_output(&console), ResultSource::ConsoleOutput)
        }
    };

    debug!(
        tests = results.test_count(),
        failed = results.failed_count(),
        source = ?source,
        "gtest results recovered"
    );
    Ok(GtestRun {
        results,
        source,
        output,
    })
}
