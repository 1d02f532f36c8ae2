//! GoogleTest result parsing.
//!
//! Two sources are understood:
//! - the JSON report written by `--gtest_output=json:<path>`;
//! - the console lines `[       OK ] Suite.test` / `[  FAILED  ] Suite.test`,
//!   used when the JSON report was never written (crash, abort, timeout).
//!
//! Both produce the same `GtestResults`: suite name -> test name -> passed.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GtestResults {
    suites: BTreeMap<String, BTreeMap<String, bool>>,
}

/// Verdict for one lookup in a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseVerdict {
    Passed { tests: usize },
    Failed { failed: Vec<String>, tests: usize },
    Absent,
}

impl GtestResults {
    pub fn insert(&mut self, suite: &str, test: &str, passed: bool) {
        let entry = self
            .suites
            .entry(suite.to_string())
            .or_default()
            .entry(test.to_string())
            .or_insert(passed);
        // A test reported twice only passes if every report passed.
        *entry &= passed;
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }

    pub fn test_count(&self) -> usize {
        self.suites.values().map(BTreeMap::len).sum()
    }

    pub fn failed_count(&self) -> usize {
        self.suites
            .values()
            .flat_map(BTreeMap::values)
            .filter(|passed| !**passed)
            .count()
    }

    /// Look up `Suite.test` (a single test) or a bare suite name.
    ///
    /// A suite passes iff it has at least one test and all of them passed.
    pub fn lookup(&self, name: &str) -> CaseVerdict {
        if let Some(tests) = self.suites.get(name) {
            let failed: Vec<String> = tests
                .iter()
                .filter(|(_, passed)| !**passed)
                .map(|(test, _)| format!("{name}.{test}"))
                .collect();
            return verdict(failed, tests.len());
        }
        // Suite names never contain '.', so split at the first one.
        if let Some((suite, test)) = name.split_once('.')
            && let Some(passed) = self.suites.get(suite).and_then(|tests| tests.get(test))
        {
            let failed = if *passed { Vec::new() } else { vec![name.to_string()] };
            return verdict(failed, 1);
        }
        CaseVerdict::Absent
    }
}

fn verdict(failed: Vec<String>, tests: usize) -> CaseVerdict {
    if tests == 0 {
        CaseVerdict::Absent
    } else if failed.is_empty() {
        CaseVerdict::Passed { tests }
    } else {
        CaseVerdict::Failed { failed, tests }
    }
}

#[derive(Debug, Deserialize)]
struct JsonReport {
    #[serde(default)]
    testsuites: Vec<JsonSuite>,
}

#[derive(Debug, Deserialize)]
struct JsonSuite {
    name: String,
    #[serde(default)]
    testsuite: Vec<JsonTest>,
}

#[derive(Debug, Deserialize)]
struct JsonTest {
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    failures: Vec<serde_json::Value>,
}

/// Parse a GoogleTest JSON report.
///
/// Disabled tests (`status = NOTRUN`) are left out. Skipped tests count as
/// not passed.
pub fn parse_json_report(contents: &str) -> Result<GtestResults> {
    let report: JsonReport = serde_json::from_str(contents).context("parse gtest json report")?;
    let mut results = GtestResults::default();
    for suite in &report.testsuites {
        for test in &suite.testsuite {
            if test.status.as_deref() == Some("NOTRUN") {
                continue;
            }
            let skipped = test.result.as_deref() == Some("SKIPPED");
            let passed = test.failures.is_empty() && !skipped;
            results.insert(&suite.name, &test.name, passed);
        }
    }
    Ok(results)
}

/// Recover verdicts from GoogleTest console output.
///
/// Tests that started (`[ RUN      ]`) but never reported a verdict are
/// absent from the result.
pub fn parse_console_output(output: &str) -> GtestResults {
    let mut results = GtestResults::default();
    for line in output.lines() {
        let line = line.trim_start();
        let (passed, rest) = if let Some(rest) = line.strip_prefix("[       OK ]") {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix("[  FAILED  ]") {
            (false, rest)
        } else {
            continue;
        };
        let Some(full_name) = rest
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .find(|token| !token.is_empty())
        else {
            continue;
        };
        // Summary lines like "[  FAILED  ] 2 tests, listed below:" have no dot.
        if let Some((suite, test)) = full_name.split_once('.')
            && !suite.is_empty()
            && !test.is_empty()
        {
            results.insert(suite, test, passed);
        }
    }
    results
}
