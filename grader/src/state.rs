//! Grading orchestration over one submission.
//!
//! `GradingState` owns the scorecard and exposes one method per check. Every
//! method resolves to exactly one `CheckRecord`: leaf errors become `Fail`
//! records of the check's failure class, and once a fail-fast check has
//! failed, later checks are recorded `Skipped` without touching the
//! submission.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::config::GraderConfig;
use crate::core::gtest::{CaseVerdict, GtestResults};
use crate::core::report::Report;
use crate::core::scorecard::{Scorecard, Verdict};
use crate::core::types::{Assignment, CheckKind, CheckRecord, FailureKind, Phase};
use crate::io::contributors::{Contributors, ContributorsConfig, placeholder_entries, read_contributors};
use crate::io::digest::{DigestVerdict, normalize_digest, verify};
use crate::io::files::missing_files;
use crate::io::gtest::{ResultSource, run_gtest_binary};
use crate::io::process::{run_tokens, tail_lines};
use crate::io::scan::count_pattern;

/// Results of the last `gtest_run`, shared by all later suite lookups.
#[derive(Debug, Clone)]
struct CapturedTests {
    binary: String,
    results: GtestResults,
    abnormal_exit: bool,
}

#[derive(Debug)]
pub struct GradingState {
    scorecard: Scorecard,
    root: PathBuf,
    config: GraderConfig,
    contributors: ContributorsConfig,
    tests: Option<CapturedTests>,
}

impl GradingState {
    pub fn new(assignment: Assignment, root: impl Into<PathBuf>) -> Self {
        Self {
            scorecard: Scorecard::new(assignment),
            root: root.into(),
            config: GraderConfig::default(),
            contributors: ContributorsConfig::default(),
            tests: None,
        }
    }

    pub fn with_config(mut self, config: GraderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_contributors(mut self, contributors: ContributorsConfig) -> Self {
        self.contributors = contributors;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> &[CheckRecord] {
        self.scorecard.records()
    }

    pub fn phase(&self) -> &Phase {
        self.scorecard.phase()
    }

    pub fn is_terminated(&self) -> bool {
        self.scorecard.is_terminated()
    }

    pub fn score(&self) -> u32 {
        self.scorecard.score()
    }

    /// Render the records so far. Does not change state.
    pub fn summarize(&self) -> Report {
        Report::from_scorecard(&self.scorecard)
    }

    /// Fail fast unless the contributors file lists at least one contributor.
    pub fn reject_if_missing_contributors(&mut self) -> &CheckRecord {
        self.check(
            "contributors listed",
            CheckKind::FailFast,
            0,
            FailureKind::Structural,
            |state| {
                let config = &state.contributors;
                let file = config.path.display();
                Ok(match read_contributors(&state.root, config)? {
                    Contributors::FileMissing => {
                        Verdict::fail(FailureKind::Structural, format!("{file} is missing"))
                    }
                    Contributors::HeaderMissing => Verdict::fail(
                        FailureKind::Structural,
                        format!("{file} has no {:?} line", config.header),
                    ),
                    Contributors::Listed(names) if names.is_empty() => Verdict::fail(
                        FailureKind::Structural,
                        format!("{file} lists no names after {:?}", config.header),
                    ),
                    Contributors::Listed(names) => {
                        Verdict::pass(format!("{} contributor(s) listed", names.len()))
                    }
                })
            },
        )
    }

    /// Fail fast if any listed contributor is still a starter placeholder.
    pub fn reject_if_starter_contributors(&mut self) -> &CheckRecord {
        self.check(
            "contributors edited",
            CheckKind::FailFast,
            0,
            FailureKind::Structural,
            |state| {
                let config = &state.contributors;
                let file = config.path.display();
                let names = match read_contributors(&state.root, config)? {
                    Contributors::Listed(names) => names,
                    Contributors::FileMissing | Contributors::HeaderMissing => {
                        return Ok(Verdict::fail(
                            FailureKind::Structural,
                            format!("{file} has no contributor list"),
                        ));
                    }
                };
                let starters = placeholder_entries(&names, &config.placeholders);
                if starters.is_empty() {
                    Ok(Verdict::pass(""))
                } else {
                    Ok(Verdict::fail(
                        FailureKind::Structural,
                        format!(
                            "{file} still lists starter contributor(s): {}",
                            starters.join("; ")
                        ),
                    ))
                }
            },
        )
    }

    /// Fail fast unless every path exists; the detail lists all missing paths.
    pub fn reject_unless_files_exist(&mut self, paths: &[PathBuf]) -> &CheckRecord {
        self.check(
            "required files exist",
            CheckKind::FailFast,
            0,
            FailureKind::Structural,
            |state| {
                let missing = missing_files(&state.root, paths);
                if missing.is_empty() {
                    return Ok(Verdict::pass(""));
                }
                let listed: Vec<String> = missing.iter().map(|path| path.display().to_string()).collect();
                Ok(Verdict::fail(
                    FailureKind::Structural,
                    format!("missing: {}", listed.join(", ")),
                ))
            },
        )
    }

    /// Fail fast if `path` still has the starter-code digest.
    pub fn reject_if_file_unchanged(&mut self, path: &Path, baseline_digest: &str) -> &CheckRecord {
        let name = format!("{} was modified", path.display());
        self.check(
            &name,
            CheckKind::FailFast,
            0,
            FailureKind::Integrity,
            |state| {
                Ok(match verify(&state.root.join(path), baseline_digest)? {
                    DigestVerdict::Matches => Verdict::fail(
                        FailureKind::Integrity,
                        format!("{} is unchanged from the starter code", path.display()),
                    ),
                    DigestVerdict::Mismatch { .. } => Verdict::pass(""),
                    DigestVerdict::FileMissing => Verdict::fail(
                        FailureKind::Integrity,
                        format!("{} is missing", path.display()),
                    ),
                })
            },
        )
    }

    /// Fail fast if a protected file no longer has its pinned digest.
    pub fn reject_if_file_changed(&mut self, path: &Path, pinned_digest: &str) -> &CheckRecord {
        let name = format!("{} is untouched", path.display());
        self.check(
            &name,
            CheckKind::FailFast,
            0,
            FailureKind::Integrity,
            |state| {
                Ok(match verify(&state.root.join(path), pinned_digest)? {
                    DigestVerdict::Matches => Verdict::pass(""),
                    DigestVerdict::Mismatch { actual } => Verdict::fail(
                        FailureKind::Integrity,
                        format!(
                            "{} was modified; restore the original file\nexpected sha256 {}\nactual   sha256 {actual}",
                            path.display(),
                            normalize_digest(pinned_digest)
                        ),
                    ),
                    DigestVerdict::FileMissing => Verdict::fail(
                        FailureKind::Integrity,
                        format!("{} is missing; restore the original file", path.display()),
                    ),
                })
            },
        )
    }

    /// Fail fast unless the command exits with status zero.
    pub fn reject_unless_command_succeeds(&mut self, cmd: &[String]) -> &CheckRecord {
        let name = format!("`{}` succeeds", cmd.join(" "));
        self.check(&name, CheckKind::FailFast, 0, FailureKind::Build, |state| {
            let limits = state.config.command_limits();
            let output = run_tokens(cmd, &state.root, limits)?;
            if output.success() {
                return Ok(Verdict::pass(""));
            }
            let mut detail = output.describe_exit(&limits);
            let tail = tail_lines(&output.combined(), state.config.detail_tail_lines);
            if !tail.is_empty() {
                detail.push_str(&format!("\n{tail}"));
            }
            Ok(Verdict::fail(FailureKind::Build, detail))
        })
    }

    /// Award `points` iff no listed file contains `pattern`.
    pub fn string_removed_test(
        &mut self,
        name: &str,
        points: u32,
        pattern: &str,
        paths: &[PathBuf],
    ) -> &CheckRecord {
        self.check(
            name,
            CheckKind::PartialCredit,
            points,
            FailureKind::Content,
            |state| {
                let counts = count_pattern(&state.root, pattern, paths)?;
                let total = counts.total();
                if total == 0 {
                    return Ok(Verdict::pass(""));
                }
                let mut detail = format!("{total} occurrence(s) of {pattern:?} remain");
                for (path, count) in counts.offenders() {
                    detail.push_str(&format!("\n{}: {count}", path.display()));
                }
                Ok(Verdict::fail(FailureKind::Content, detail))
            },
        )
    }

    /// Run the test binary once and keep its results for `gtest_suite_test`.
    #[instrument(skip(self))]
    pub fn gtest_run(&mut self, binary: &str) -> &CheckRecord {
        let name = format!("run {binary}");
        let kind = CheckKind::Informational;
        if self.scorecard.is_terminated() {
            return self.scorecard.skip(&name, kind, 0);
        }

        // Stale results from an earlier binary must not satisfy later lookups.
        self.tests = None;
        let limits = self.config.test_limits();
        let verdict = match run_gtest_binary(&self.root, binary, limits) {
            Err(err) => {
                warn!(err = %format!("{err:#}"), "test binary did not run");
                Verdict::fail(FailureKind::Test, format!("{err:#}"))
            }
            Ok(run) if run.results.is_empty() => {
                let mut detail = format!("no test results recovered ({})", run.output.describe_exit(&limits));
                let tail = tail_lines(&run.output.combined(), self.config.detail_tail_lines);
                if !tail.is_empty() {
                    detail.push_str(&format!("\n{tail}"));
                }
                Verdict::fail(FailureKind::Test, detail)
            }
            Ok(run) => {
                let abnormal_exit = run.abnormal_exit();
                let mut detail = format!(
                    "{} test(s), {} failed",
                    run.results.test_count(),
                    run.results.failed_count()
                );
                if run.source == ResultSource::ConsoleOutput {
                    detail.push_str(&format!(
                        "\nno JSON report ({}); results recovered from console output",
                        run.output.describe_exit(&limits)
                    ));
                }
                info!(
                    tests = run.results.test_count(),
                    failed = run.results.failed_count(),
                    abnormal_exit,
                    "test results captured"
                );
                self.tests = Some(CapturedTests {
                    binary: binary.to_string(),
                    results: run.results,
                    abnormal_exit,
                });
                Verdict::pass(detail)
            }
        };
        self.scorecard.record(&name, kind, 0, verdict)
    }

    /// Award `points` iff the named suite (or `Suite.test`) passed in the last run.
    pub fn gtest_suite_test(&mut self, name: &str, points: u32) -> &CheckRecord {
        self.check(
            name,
            CheckKind::PartialCredit,
            points,
            FailureKind::Test,
            |state| {
                let Some(tests) = &state.tests else {
                    return Ok(Verdict::fail(
                        FailureKind::Test,
                        "no test results: the test binary was not run successfully",
                    ));
                };
                Ok(match tests.results.lookup(name) {
                    CaseVerdict::Passed { tests: count } => {
                        Verdict::pass(format!("{count} test(s) passed"))
                    }
                    CaseVerdict::Failed { failed, tests: count } => Verdict::fail(
                        FailureKind::Test,
                        format!(
                            "{} of {count} test(s) failed: {}",
                            failed.len(),
                            failed.join(", ")
                        ),
                    ),
                    CaseVerdict::Absent => {
                        let mut detail = format!("{name} not found in {} results", tests.binary);
                        if tests.abnormal_exit {
                            detail.push_str(" (test binary exited abnormally)");
                        }
                        Verdict::fail(FailureKind::Test, detail)
                    }
                })
            },
        )
    }

    /// Skip when terminated, otherwise run `body` and record its verdict.
    ///
    /// Errors from `body` become a `Fail` of `failure`.
    fn check<F>(
        &mut self,
        name: &str,
        kind: CheckKind,
        points: u32,
        failure: FailureKind,
        body: F,
    ) -> &CheckRecord
    where
        F: FnOnce(&Self) -> Result<Verdict>,
    {
        if self.scorecard.is_terminated() {
            return self.scorecard.skip(name, kind, points);
        }
        let verdict = match body(&*self) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(check = name, err = %format!("{err:#}"), "check errored");
                Verdict::fail(failure, format!("{err:#}"))
            }
        };
        self.scorecard.record(name, kind, points, verdict)
    }
}
