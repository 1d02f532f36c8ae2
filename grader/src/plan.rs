//! Grading plan parsing, validation, and execution.
//!
//! A plan is a TOML file naming the assignment, optional limits, and the
//! ordered list of checks to run against a submission. See
//! `demos/poly_exp/grade.toml` for a complete plan.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::config::GraderConfig;
use crate::core::report::Report;
use crate::core::types::Assignment;
use crate::io::contributors::ContributorsConfig;
use crate::io::digest::validate_digest;
use crate::state::GradingState;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Plan {
    pub assignment: AssignmentSection,
    #[serde(default)]
    pub config: GraderConfig,
    #[serde(default)]
    pub contributors: ContributorsConfig,
    #[serde(default)]
    pub checks: Vec<PlanCheck>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssignmentSection {
    pub name: Option<String>,
    pub total_points: u32,
    #[serde(default)]
    pub passing_threshold: u32,
}

/// One step of a plan, run in file order.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanCheck {
    /// The contributors file lists at least one name.
    ContributorsPresent,
    /// No listed contributor is a starter placeholder.
    ContributorsNotDefault,
    /// Every path exists in the submission.
    FilesExist { paths: Vec<PathBuf> },
    /// Reject when the file still has its starter-code digest.
    FileUnchanged { path: PathBuf, digest: String },
    /// Reject when a protected file no longer has its pinned digest.
    FileChanged { path: PathBuf, digest: String },
    /// The command exits successfully.
    CommandSucceeds { cmd: Vec<String> },
    /// Award points when no listed file contains `pattern`.
    StringRemoved {
        name: String,
        points: u32,
        pattern: String,
        paths: Vec<PathBuf>,
    },
    /// Run a GoogleTest binary and keep its results.
    GtestRun { binary: String },
    /// Award points when a suite (or `Suite.test`) passed.
    GtestSuiteTest { name: String, points: u32 },
}

impl Plan {
    /// Load and validate a plan file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
        Self::parse_str(&contents).with_context(|| format!("load plan {}", path.display()))
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        let plan: Plan = toml::from_str(contents).context("parse plan")?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn assignment(&self) -> Result<Assignment> {
        let assignment = Assignment::new(
            self.assignment.total_points,
            self.assignment.passing_threshold,
        )?;
        Ok(match &self.assignment.name {
            Some(name) => assignment.with_name(name),
            None => assignment,
        })
    }

    /// Points available from partial-credit checks.
    pub fn available_points(&self) -> u32 {
        self.checks
            .iter()
            .map(|check| match check {
                PlanCheck::StringRemoved { points, .. } | PlanCheck::GtestSuiteTest { points, .. } => {
                    *points
                }
                _ => 0,
            })
            .sum()
    }

    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.assignment.name
            && name.trim().is_empty()
        {
            bail!("assignment.name must be non-empty when set");
        }
        self.assignment().context("assignment invalid")?;
        self.config.validate().context("config invalid")?;
        self.contributors.validate()?;
        if self.checks.is_empty() {
            bail!("checks must be a non-empty array");
        }
        for (index, check) in self.checks.iter().enumerate() {
            check
                .validate()
                .with_context(|| format!("checks[{}] invalid", index))?;
        }
        let available = self.available_points();
        if available > self.assignment.total_points {
            bail!(
                "checks award {} points but assignment.total_points is {}",
                available,
                self.assignment.total_points
            );
        }
        Ok(())
    }
}

impl PlanCheck {
    fn validate(&self) -> Result<()> {
        match self {
            PlanCheck::ContributorsPresent | PlanCheck::ContributorsNotDefault => {}
            PlanCheck::FilesExist { paths } => {
                if paths.is_empty() {
                    bail!("files_exist.paths must be a non-empty array");
                }
                for path in paths {
                    validate_relative_path(path)?;
                }
            }
            PlanCheck::FileUnchanged { path, digest } | PlanCheck::FileChanged { path, digest } => {
                validate_relative_path(path)?;
                validate_digest(digest)?;
            }
            PlanCheck::CommandSucceeds { cmd } => {
                if cmd.is_empty() || cmd[0].trim().is_empty() {
                    bail!("command_succeeds.cmd must be a non-empty array");
                }
            }
            PlanCheck::StringRemoved {
                name,
                pattern,
                paths,
                ..
            } => {
                if name.trim().is_empty() {
                    bail!("string_removed.name must be non-empty");
                }
                if pattern.is_empty() {
                    bail!("string_removed.pattern must be non-empty");
                }
                if paths.is_empty() {
                    bail!("string_removed.paths must be a non-empty array");
                }
                for path in paths {
                    validate_relative_path(path)?;
                }
            }
            PlanCheck::GtestRun { binary } => {
                if binary.trim().is_empty() {
                    bail!("gtest_run.binary must be non-empty");
                }
                validate_relative_path(Path::new(binary))?;
            }
            PlanCheck::GtestSuiteTest { name, .. } => {
                if name.trim().is_empty() {
                    bail!("gtest_suite_test.name must be non-empty");
                }
            }
        }
        Ok(())
    }

    /// Invoke the matching `GradingState` check.
    pub fn apply(&self, state: &mut GradingState) {
        match self {
            PlanCheck::ContributorsPresent => {
                state.reject_if_missing_contributors();
            }
            PlanCheck::ContributorsNotDefault => {
                state.reject_if_starter_contributors();
            }
            PlanCheck::FilesExist { paths } => {
                state.reject_unless_files_exist(paths);
            }
            PlanCheck::FileUnchanged { path, digest } => {
                state.reject_if_file_unchanged(path, digest);
            }
            PlanCheck::FileChanged { path, digest } => {
                state.reject_if_file_changed(path, digest);
            }
            PlanCheck::CommandSucceeds { cmd } => {
                state.reject_unless_command_succeeds(cmd);
            }
            PlanCheck::StringRemoved {
                name,
                points,
                pattern,
                paths,
            } => {
                state.string_removed_test(name, *points, pattern, paths);
            }
            PlanCheck::GtestRun { binary } => {
                state.gtest_run(binary);
            }
            PlanCheck::GtestSuiteTest { name, points } => {
                state.gtest_suite_test(name, *points);
            }
        }
    }
}

/// Paths must stay inside the submission: relative, no `..`.
fn validate_relative_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("path must be non-empty");
    }
    if path.is_absolute() {
        bail!("path {} must be relative to the submission", path.display());
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        bail!("path {} must not contain '..'", path.display());
    }
    Ok(())
}

/// Run every check of `plan` against `submission` and summarize.
#[instrument(skip_all, fields(submission = %submission.display(), checks = plan.checks.len()))]
pub fn run_plan(plan: &Plan, config: GraderConfig, submission: &Path) -> Result<Report> {
    if !submission.is_dir() {
        bail!("submission {} is not a directory", submission.display());
    }
    // Child processes run with the submission as cwd, so program paths
    // joined onto the root must not be relative.
    let root = submission
        .canonicalize()
        .with_context(|| format!("resolve submission {}", submission.display()))?;
    let mut state = GradingState::new(plan.assignment()?, root)
        .with_config(config)
        .with_contributors(plan.contributors.clone());

    info!("grading started");
    for check in &plan.checks {
        check.apply(&mut state);
    }
    let report = state.summarize();
    info!(
        score = report.score,
        total = report.total_points,
        terminated = report.is_terminated(),
        "grading finished"
    );
    Ok(report)
}
