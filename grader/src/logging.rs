//! Diagnostic tracing for the grader.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. The grading report
//! itself is written to stdout (or `--output`) and is never affected by the
//! log level.
//!
//! What shows up at each level:
//! - `warn`: fail-fast terminations (`check`, `failure`), checks whose points
//!   exceed the unallocated total, errored checks, timeouts, truncated output.
//! - `info`: the `run_plan` span (`submission`, `checks`) with start/finish
//!   events (`score`, `total`, `terminated`), and captured test counts from
//!   the `gtest_run` span (`binary`).
//! - `debug`: every recorded check (`check`, `outcome`, `points`) and each child
//!   process inside the `run_command` span (`timeout`, `output_limit_bytes`).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "warn";

/// Initialize the tracing subscriber for the `grade` binary.
///
/// # Example
/// ```bash
/// RUST_LOG=grader=debug grade run --plan grade.toml --submission .
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
