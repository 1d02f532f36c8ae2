//! Grader limits, read from the `[config]` section of a plan.

use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::process::ProcessLimits;

/// Process limits and report shaping.
///
/// Missing fields default to values suitable for course-sized projects.
/// Timeouts are off unless configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GraderConfig {
    /// Wall-clock bound for `command_succeeds` checks, in seconds.
    pub command_timeout_secs: Option<u64>,

    /// Wall-clock bound for the test binary in `gtest_run`, in seconds.
    pub test_timeout_secs: Option<u64>,

    /// Keep only the last this-many bytes of captured stdout and stderr each.
    pub output_limit_bytes: usize,

    /// Lines of command output kept in a failing check's detail.
    pub detail_tail_lines: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: None,
            test_timeout_secs: None,
            output_limit_bytes: 100_000,
            detail_tail_lines: 20,
        }
    }
}

impl GraderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == Some(0) {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.test_timeout_secs == Some(0) {
            return Err(anyhow!("test_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.detail_tail_lines == 0 {
            return Err(anyhow!("detail_tail_lines must be > 0"));
        }
        Ok(())
    }

    pub fn command_limits(&self) -> ProcessLimits {
        ProcessLimits {
            timeout: self.command_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }

    pub fn test_limits(&self) -> ProcessLimits {
        ProcessLimits {
            timeout: self.test_timeout_secs.map(Duration::from_secs),
            output_limit_bytes: self.output_limit_bytes,
        }
    }
}

/// Command-line overrides applied on top of a plan's config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub command_timeout_secs: Option<u64>,
    pub test_timeout_secs: Option<u64>,
}

/// Apply overrides to the plan config and re-validate.
pub fn apply_overrides(mut base: GraderConfig, overrides: &ConfigOverrides) -> Result<GraderConfig> {
    if let Some(secs) = overrides.command_timeout_secs {
        base.command_timeout_secs = Some(secs);
    }
    if let Some(secs) = overrides.test_timeout_secs {
        base.test_timeout_secs = Some(secs);
    }
    base.validate()?;
    Ok(base)
}
