//! Stable exit codes for the `grade` CLI.

/// Graded, and the score meets the passing threshold.
pub const OK: i32 = 0;
/// Invalid plan, arguments, or another error outside of grading.
pub const INVALID: i32 = 1;
/// A fail-fast check failed and grading stopped.
pub const REJECTED: i32 = 2;
/// Graded, but the score is below the passing threshold.
pub const BELOW_THRESHOLD: i32 = 3;
