//! Assignment verification and scoring engine.
//!
//! Grades a student submission by running an ordered list of checks:
//! structural preconditions, tamper detection on pinned files, a build, a
//! forbidden-pattern scan, and GoogleTest suites. The architecture keeps a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (scorecard state machine, test
//!   result parsing, report rendering). No I/O.
//! - **[`io`]**: Side-effecting leaves (file digests, process execution,
//!   file scanning).
//!
//! [`state::GradingState`] ties the two together, and [`plan`] drives it from a
//! TOML grading plan.

pub mod cli;
pub mod config;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
