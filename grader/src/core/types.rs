//! Shared deterministic types for grading.
//!
//! These types define the stable contract between checks, the scorecard, and
//! the report. They carry no I/O and serialize into the JSON report as-is.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Immutable description of what a submission can score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Display name used in the report header.
    pub name: Option<String>,
    /// Ceiling of the final score.
    pub total_points: u32,
    /// Minimum score considered passing.
    pub passing_threshold: u32,
}

impl Assignment {
    pub fn new(total_points: u32, passing_threshold: u32) -> Result<Self> {
        let assignment = Self {
            name: None,
            total_points,
            passing_threshold,
        };
        assignment.validate()?;
        Ok(assignment)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_points == 0 {
            bail!("assignment.total_points must be > 0");
        }
        if self.passing_threshold > self.total_points {
            bail!(
                "assignment.passing_threshold ({}) must not exceed total_points ({})",
                self.passing_threshold,
                self.total_points
            );
        }
        Ok(())
    }
}

/// How a check's outcome affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Failure terminates grading.
    FailFast,
    /// Awards fixed points on success, never terminates.
    PartialCredit,
    /// Records an outcome without points and never terminates.
    Informational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Pass,
    Fail,
    /// Not executed because an earlier fail-fast check failed.
    Skipped,
}

/// Why a check did not pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Required files or contributor metadata are missing.
    Structural,
    /// A pinned file changed, or a starter file did not.
    Integrity,
    /// The build command could not launch or exited non-zero.
    Build,
    /// A forbidden pattern is still present.
    Content,
    /// A test case failed, is absent, or the test binary did not run.
    Test,
    /// Administrative: grading was already terminated.
    SkippedDueToTermination,
    /// Authoring error: the check is worth more points than remain unallocated.
    Overallocated,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Structural => "structural failure",
            FailureKind::Integrity => "integrity failure",
            FailureKind::Build => "build failure",
            FailureKind::Content => "content failure",
            FailureKind::Test => "test failure",
            FailureKind::SkippedDueToTermination => "skipped due to termination",
            FailureKind::Overallocated => "points exceed assignment total",
        }
    }
}

/// Immutable outcome of one check invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub name: String,
    pub kind: CheckKind,
    pub outcome: CheckOutcome,
    pub points_awarded: u32,
    /// Points the check could award; 0 for fail-fast and informational checks.
    pub points_possible: u32,
    pub failure: Option<FailureKind>,
    pub detail: String,
}

/// Grading phase. `Terminated` is absorbing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Active,
    Terminated {
        /// Name of the fail-fast check that ended grading.
        by: String,
    },
}

impl Phase {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Phase::Terminated { .. })
    }
}
