//! Structured failure report
//!
//! Everything a human (or downstream tooling) needs to see why a test
//! failed: failed goals with missing fields, constraint violations,
//! detected issues and anomalies, and the final counters. Not a wire
//! protocol.

use serde::{Deserialize, Serialize};

use callsim_core::{ConstraintViolation, DataField, GoalTestResult};
use callsim_tracker::{Anomaly, ProgressIssue, ProgressState};

/// One failed goal and what was missing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedGoal {
    pub goal_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<DataField>,
    pub detail: String,
}

/// Final state counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportCounters {
    pub turns: u32,
    pub transcript_messages: usize,
    pub fields_collected: usize,
    pub anomalies: usize,
    pub issues: usize,
}

/// The full diagnostic report for one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub test_name: String,
    pub passed: bool,
    pub summary: String,
    pub failed_goals: Vec<FailedGoal>,
    pub violations: Vec<ConstraintViolation>,
    pub issues: Vec<ProgressIssue>,
    pub anomalies: Vec<Anomaly>,
    pub counters: ReportCounters,
}

impl FailureReport {
    pub fn build(
        test_name: &str,
        result: &GoalTestResult,
        state: &ProgressState,
        anomalies: Vec<Anomaly>,
        transcript_messages: usize,
    ) -> Self {
        let failed_goals = result
            .goal_results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| FailedGoal {
                goal_id: r.goal_id.clone(),
                missing_fields: r.missing_fields.clone(),
                detail: r.detail.clone(),
            })
            .collect();

        Self {
            test_name: test_name.to_string(),
            passed: result.passed,
            summary: result.summary.clone(),
            failed_goals,
            violations: result.violations.clone(),
            issues: state.issues.clone(),
            counters: ReportCounters {
                turns: state.turn,
                transcript_messages,
                fields_collected: state.collected.len(),
                anomalies: anomalies.len(),
                issues: state.issues.len(),
            },
            anomalies,
        }
    }

    /// Render as a plain-text block
    pub fn render(&self) -> String {
        let mut out = format!("=== {} ===\n{}\n", self.test_name, self.summary);

        if !self.failed_goals.is_empty() {
            out.push_str("\nFailed goals:\n");
            for goal in &self.failed_goals {
                out.push_str(&format!("  - {} ({})", goal.goal_id, goal.detail));
                if !goal.missing_fields.is_empty() {
                    let fields: Vec<&str> =
                        goal.missing_fields.iter().map(|f| f.as_str()).collect();
                    out.push_str(&format!(" missing: {}", fields.join(", ")));
                }
                out.push('\n');
            }
        }

        if !self.violations.is_empty() {
            out.push_str("\nConstraint violations:\n");
            for violation in &self.violations {
                out.push_str(&format!(
                    "  - [{:?}] {}: {}",
                    violation.severity, violation.constraint_id, violation.description
                ));
                if let Some(turn) = violation.turn {
                    out.push_str(&format!(" (turn {turn})"));
                }
                out.push('\n');
            }
        }

        if !self.issues.is_empty() {
            out.push_str("\nDetected issues:\n");
            for issue in &self.issues {
                out.push_str(&format!(
                    "  - [{:?}] turn {}: {}\n",
                    issue.severity, issue.turn, issue.description
                ));
            }
        }

        if !self.anomalies.is_empty() {
            out.push_str("\nAnomalies:\n");
            for anomaly in &self.anomalies {
                out.push_str(&format!(
                    "  - [{:?}] turn {}: {}\n",
                    anomaly.severity, anomaly.turn, anomaly.description
                ));
            }
        }

        out.push_str(&format!(
            "\nTurns: {} ({} messages), fields collected: {}\n",
            self.counters.turns, self.counters.transcript_messages, self.counters.fields_collected
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsim_core::{GoalContext, GoalResult, Severity};

    #[test]
    fn test_render_contains_sections() {
        let result = GoalTestResult {
            passed: false,
            goal_results: vec![GoalResult {
                goal_id: "basics".to_string(),
                passed: false,
                missing_fields: vec![DataField::ChildName],
                detail: "1 required fields missing".to_string(),
            }],
            violations: vec![ConstraintViolation {
                constraint_id: "budget".to_string(),
                severity: Severity::High,
                description: "too many turns".to_string(),
                turn: Some(24),
            }],
            summary: "FAILED: 0/1 goals passed".to_string(),
            final_context: GoalContext::default(),
        };

        let state = ProgressState {
            turn: 12,
            intent_history: Vec::new(),
            collected: Default::default(),
            pending: Vec::new(),
            flow_state: Default::default(),
            completed_goals: Vec::new(),
            failed_goals: Vec::new(),
            issues: Vec::new(),
            booking_confirmed: false,
            transfer_initiated: false,
            started_at: chrono::Utc::now(),
        };

        let report = FailureReport::build("scenario-c", &result, &state, Vec::new(), 24);
        let text = report.render();
        assert!(text.contains("scenario-c"));
        assert!(text.contains("child_name"));
        assert!(text.contains("budget"));
        assert!(text.contains("turn 24"));

        // serializable for downstream tooling
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"passed\":false"));
    }
}
