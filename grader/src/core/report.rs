//! Report rendering over a finished (or in-progress) scorecard.

use serde::{Deserialize, Serialize};

use crate::core::scorecard::Scorecard;
use crate::core::types::{CheckKind, CheckOutcome, CheckRecord, Phase};

/// Snapshot of a grading run, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub assignment: Option<String>,
    pub checks: Vec<CheckRecord>,
    pub score: u32,
    pub total_points: u32,
    pub passing_threshold: u32,
    pub phase: Phase,
    pub passed: bool,
}

impl Report {
    pub fn from_scorecard(card: &Scorecard) -> Self {
        let assignment = card.assignment();
        let score = card.score();
        let terminated = card.is_terminated();
        Self {
            assignment: assignment.name.clone(),
            checks: card.records().to_vec(),
            score,
            total_points: assignment.total_points,
            passing_threshold: assignment.passing_threshold,
            phase: card.phase().clone(),
            passed: !terminated && score >= assignment.passing_threshold,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.phase.is_terminated()
    }

    /// Plain-text rendering for a terminal.
    pub fn render_text(&self) -> String {
        let rule = "=".repeat(72);
        let mut lines = vec![rule.clone()];
        if let Some(name) = &self.assignment {
            lines.push(name.clone());
            lines.push(rule.clone());
        }

        for record in &self.checks {
            lines.push(format!(
                "{:<6} {}{}",
                outcome_label(record.outcome),
                record.name,
                points_label(record)
            ));
            if let Some(failure) = record.failure
                && record.outcome == CheckOutcome::Fail
            {
                lines.push(format!("       ({})", failure.label()));
            }
            lines.extend(record.detail.lines().map(|line| format!("       {line}")));
        }

        lines.push(rule);
        if let Phase::Terminated { by } = &self.phase {
            lines.push(format!("grading stopped: '{by}' failed"));
        }
        lines.push(format!("score: {}/{}", self.score, self.total_points));
        let verdict = if self.passed {
            "passing"
        } else {
            "not passing"
        };
        lines.push(format!(
            "result: {verdict} (threshold {}/{})",
            self.passing_threshold, self.total_points
        ));

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

fn outcome_label(outcome: CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Pass => "[PASS]",
        CheckOutcome::Fail => "[FAIL]",
        CheckOutcome::Skipped => "[SKIP]",
    }
}

fn points_label(record: &CheckRecord) -> String {
    match record.kind {
        CheckKind::PartialCredit => {
            format!(" ({}/{})", record.points_awarded, record.points_possible)
        }
        CheckKind::FailFast | CheckKind::Informational => String::new(),
    }
}
