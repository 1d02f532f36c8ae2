//! Ordered check log with the Active/Terminated state machine.
//!
//! The scorecard is the only place where records are created. It enforces:
//! - a failing fail-fast check moves the phase to `Terminated`, permanently;
//! - after termination every record is `Skipped` with 0 points;
//! - `points_awarded` is 0 unless the outcome is `Pass`;
//! - partial-credit checks never allocate more than `Assignment.total_points`
//!   in total, so the score reaches the total only if every one of them passed.

use tracing::{debug, warn};

use crate::core::types::{Assignment, CheckKind, CheckOutcome, CheckRecord, FailureKind, Phase};

/// Result of executing a check, before it is turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass { detail: String },
    Fail { failure: FailureKind, detail: String },
}

impl Verdict {
    pub fn pass(detail: impl Into<String>) -> Self {
        Verdict::Pass {
            detail: detail.into(),
        }
    }

    pub fn fail(failure: FailureKind, detail: impl Into<String>) -> Self {
        Verdict::Fail {
            failure,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scorecard {
    assignment: Assignment,
    records: Vec<CheckRecord>,
    phase: Phase,
    score: u32,
    /// Points claimed by recorded partial-credit checks, passed or not.
    allocated: u32,
}

impl Scorecard {
    pub fn new(assignment: Assignment) -> Self {
        Self {
            assignment,
            records: Vec::new(),
            phase: Phase::Active,
            score: 0,
            allocated: 0,
        }
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn records(&self) -> &[CheckRecord] {
        &self.records
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_terminated(&self) -> bool {
        self.phase.is_terminated()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Record a check that was not executed.
    ///
    /// Callers skip checks only after termination; the detail names the
    /// check that terminated grading.
    pub fn skip(&mut self, name: &str, kind: CheckKind, points_possible: u32) -> &CheckRecord {
        let detail = match &self.phase {
            Phase::Terminated { by } => format!("not run: grading stopped after '{by}' failed"),
            Phase::Active => "not run".to_string(),
        };
        debug!(check = name, "check skipped");
        self.records.push(CheckRecord {
            name: name.to_string(),
            kind,
            outcome: CheckOutcome::Skipped,
            points_awarded: 0,
            points_possible: possible_for(kind, points_possible),
            failure: Some(FailureKind::SkippedDueToTermination),
            detail,
        });
        self.last()
    }

    /// Append the record for an executed check and apply phase transitions.
    pub fn record(
        &mut self,
        name: &str,
        kind: CheckKind,
        points_possible: u32,
        verdict: Verdict,
    ) -> &CheckRecord {
        if self.is_terminated() {
            return self.skip(name, kind, points_possible);
        }

        let points_possible = possible_for(kind, points_possible);
        if kind == CheckKind::PartialCredit {
            let unallocated = self.assignment.total_points.saturating_sub(self.allocated);
            if points_possible > unallocated {
                return self.reject_overallocated(name, points_possible, unallocated);
            }
            self.allocated += points_possible;
        }

        let record = match verdict {
            Verdict::Pass { detail } => {
                self.score += points_possible;
                CheckRecord {
                    name: name.to_string(),
                    kind,
                    outcome: CheckOutcome::Pass,
                    points_awarded: points_possible,
                    points_possible,
                    failure: None,
                    detail,
                }
            }
            Verdict::Fail { failure, detail } => {
                if kind == CheckKind::FailFast {
                    warn!(check = name, failure = failure.label(), "fail-fast check failed, terminating");
                    self.phase = Phase::Terminated {
                        by: name.to_string(),
                    };
                }
                CheckRecord {
                    name: name.to_string(),
                    kind,
                    outcome: CheckOutcome::Fail,
                    points_awarded: 0,
                    points_possible,
                    failure: Some(failure),
                    detail,
                }
            }
        };
        debug!(
            check = name,
            outcome = ?record.outcome,
            points = record.points_awarded,
            "check recorded"
        );
        self.records.push(record);
        self.last()
    }

    /// A partial-credit check worth more than the assignment has left to
    /// allocate fails with no points and does not terminate grading.
    fn reject_overallocated(&mut self, name: &str, points: u32, unallocated: u32) -> &CheckRecord {
        let total = self.assignment.total_points;
        warn!(check = name, points, unallocated, total, "check exceeds unallocated points");
        self.records.push(CheckRecord {
            name: name.to_string(),
            kind: CheckKind::PartialCredit,
            outcome: CheckOutcome::Fail,
            points_awarded: 0,
            points_possible: 0,
            failure: Some(FailureKind::Overallocated),
            detail: format!(
                "worth {points} point(s) but only {unallocated} of {total} remain unallocated"
            ),
        });
        self.last()
    }

    fn last(&self) -> &CheckRecord {
        // Only called right after a push.
        &self.records[self.records.len() - 1]
    }
}

fn possible_for(kind: CheckKind, points: u32) -> u32 {
    match kind {
        CheckKind::PartialCredit => points,
        CheckKind::FailFast | CheckKind::Informational => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorecard(total: u32) -> Scorecard {
        Scorecard::new(Assignment::new(total, 0).expect("assignment"))
    }

    #[test]
    fn partial_credit_pass_awards_points() {
        let mut card = scorecard(10);
        let record = card.record("todo", CheckKind::PartialCredit, 2, Verdict::pass("ok"));
        assert_eq!(record.outcome, CheckOutcome::Pass);
        assert_eq!(record.points_awarded, 2);
        assert_eq!(card.score(), 2);
    }

    #[test]
    fn partial_credit_fail_continues() {
        let mut card = scorecard(10);
        card.record(
            "todo",
            CheckKind::PartialCredit,
            2,
            Verdict::fail(FailureKind::Content, "1 occurrence"),
        );
        assert!(!card.is_terminated());
        let record = card.record("next", CheckKind::PartialCredit, 3, Verdict::pass(""));
        assert_eq!(record.points_awarded, 3);
    }

    #[test]
    fn fail_fast_failure_terminates_and_skips_rest() {
        let mut card = scorecard(10);
        card.record(
            "files",
            CheckKind::FailFast,
            0,
            Verdict::fail(FailureKind::Structural, "missing a.cpp"),
        );
        assert!(card.is_terminated());

        let record = card.record("todo", CheckKind::PartialCredit, 2, Verdict::pass("ok"));
        assert_eq!(record.outcome, CheckOutcome::Skipped);
        assert_eq!(record.points_awarded, 0);
        assert_eq!(record.points_possible, 2);
        assert_eq!(record.failure, Some(FailureKind::SkippedDueToTermination));
        assert!(record.detail.contains("'files'"));
        assert_eq!(card.score(), 0);
    }

    #[test]
    fn termination_is_monotonic() {
        let mut card = scorecard(10);
        card.record(
            "build",
            CheckKind::FailFast,
            0,
            Verdict::fail(FailureKind::Build, "exit 2"),
        );
        for name in ["a", "b", "c"] {
            card.record(name, CheckKind::FailFast, 0, Verdict::pass(""));
        }
        assert!(
            card.records()[1..]
                .iter()
                .all(|record| record.outcome == CheckOutcome::Skipped)
        );
        assert_eq!(
            card.phase(),
            &Phase::Terminated {
                by: "build".to_string()
            }
        );
    }

    #[test]
    fn fail_fast_and_informational_award_nothing() {
        let mut card = scorecard(10);
        let record = card.record("files", CheckKind::FailFast, 5, Verdict::pass(""));
        assert_eq!(record.points_awarded, 0);
        assert_eq!(record.points_possible, 0);
        let record = card.record("run", CheckKind::Informational, 5, Verdict::pass(""));
        assert_eq!(record.points_awarded, 0);
        assert_eq!(card.score(), 0);
    }

    #[test]
    fn informational_failure_does_not_terminate() {
        let mut card = scorecard(10);
        card.record(
            "gtest",
            CheckKind::Informational,
            0,
            Verdict::fail(FailureKind::Test, "no results"),
        );
        assert!(!card.is_terminated());
    }

    #[test]
    fn overallocated_check_fails_without_points() {
        let mut card = scorecard(4);
        card.record("a", CheckKind::PartialCredit, 3, Verdict::pass(""));
        let record = card.record("b", CheckKind::PartialCredit, 3, Verdict::pass(""));
        assert_eq!(record.outcome, CheckOutcome::Fail);
        assert_eq!(record.points_awarded, 0);
        assert_eq!(record.points_possible, 0);
        assert_eq!(record.failure, Some(FailureKind::Overallocated));
        assert!(record.detail.contains("only 1 of 4"));
        assert!(!card.is_terminated());
        assert_eq!(card.score(), 3);
    }

    #[test]
    fn failed_check_keeps_score_below_total() {
        let mut card = scorecard(4);
        card.record("first", CheckKind::PartialCredit, 3, Verdict::pass(""));
        card.record(
            "second",
            CheckKind::PartialCredit,
            3,
            Verdict::fail(FailureKind::Content, "TODO remains"),
        );
        card.record("third", CheckKind::PartialCredit, 3, Verdict::pass(""));
        assert!(card.score() < 4);
        assert!(
            card.records()
                .iter()
                .any(|record| record.outcome == CheckOutcome::Fail)
        );
    }

    #[test]
    fn failed_checks_still_claim_their_points() {
        let mut card = scorecard(4);
        card.record(
            "todo",
            CheckKind::PartialCredit,
            2,
            Verdict::fail(FailureKind::Content, "TODO remains"),
        );
        card.record("suite_a", CheckKind::PartialCredit, 2, Verdict::pass(""));
        let record = card.record("suite_b", CheckKind::PartialCredit, 2, Verdict::pass(""));
        assert_eq!(record.failure, Some(FailureKind::Overallocated));
        assert_eq!(card.score(), 2);
    }

    #[test]
    fn skip_names_terminating_check() {
        let mut card = scorecard(4);
        card.record(
            "contributors listed",
            CheckKind::FailFast,
            0,
            Verdict::fail(FailureKind::Structural, "README.md is missing"),
        );
        let record = card.skip("build", CheckKind::FailFast, 0);
        assert_eq!(
            record.detail,
            "not run: grading stopped after 'contributors listed' failed"
        );
    }
}
