//! Final goal and constraint evaluation
//!
//! Pure and deterministic given its inputs. Goal evaluation here mirrors
//! the per-turn evaluation in the progress tracker; goals already completed
//! during the run short-circuit to pass.

use callsim_core::{
    Constraint, ConstraintKind, ConstraintViolation, FlowState, Goal, GoalContext, GoalResult,
    GoalTestResult, GoalType, LegacyIntent, Severity, Transcript,
};

/// Evaluate one goal against a progress snapshot
pub fn evaluate_goal(
    goal: &Goal,
    ctx: &GoalContext,
    last_intent: Option<LegacyIntent>,
    completed: &[String],
) -> GoalResult {
    if completed.iter().any(|id| *id == goal.id) {
        return GoalResult {
            goal_id: goal.id.clone(),
            passed: true,
            missing_fields: Vec::new(),
            detail: "completed during the conversation".to_string(),
        };
    }

    match goal.goal_type {
        GoalType::DataCollection => {
            let missing: Vec<_> = goal
                .required_fields
                .iter()
                .filter(|f| !ctx.collected.contains_key(*f))
                .copied()
                .collect();
            let passed = missing.is_empty();
            GoalResult {
                goal_id: goal.id.clone(),
                passed,
                detail: if passed {
                    format!("all {} required fields collected", goal.required_fields.len())
                } else {
                    format!("{} required fields missing", missing.len())
                },
                missing_fields: missing,
            }
        }
        GoalType::BookingConfirmed => {
            let passed = ctx.booking_confirmed || ctx.flow_state == FlowState::Confirmation;
            GoalResult {
                goal_id: goal.id.clone(),
                passed,
                missing_fields: Vec::new(),
                detail: if passed {
                    "booking confirmed".to_string()
                } else {
                    "no booking confirmation observed".to_string()
                },
            }
        }
        GoalType::TransferInitiated => {
            let passed = ctx.transfer_initiated || ctx.flow_state == FlowState::Transfer;
            GoalResult {
                goal_id: goal.id.clone(),
                passed,
                missing_fields: Vec::new(),
                detail: if passed {
                    "transfer initiated".to_string()
                } else {
                    "no transfer observed".to_string()
                },
            }
        }
        GoalType::ConversationEnded => {
            let passed = ctx.flow_state == FlowState::Ended
                || last_intent == Some(LegacyIntent::SayingGoodbye);
            GoalResult {
                goal_id: goal.id.clone(),
                passed,
                missing_fields: Vec::new(),
                detail: if passed {
                    "conversation ended".to_string()
                } else {
                    "conversation did not reach a clean end".to_string()
                },
            }
        }
        GoalType::Custom => evaluate_custom_goal(goal, ctx),
    }
}

/// Custom goals: explicit predicate, then id-substring heuristics, then a
/// forward-progress fallback. An unscored custom goal must not silently
/// fail a test.
fn evaluate_custom_goal(goal: &Goal, ctx: &GoalContext) -> GoalResult {
    if let Some(predicate) = &goal.predicate {
        let passed = predicate(ctx);
        return GoalResult {
            goal_id: goal.id.clone(),
            passed,
            missing_fields: Vec::new(),
            detail: format!("custom predicate returned {passed}"),
        };
    }

    let id = goal.id.to_lowercase();
    let heuristic = if id.contains("recognize-existing") {
        Some(("existing-patient recognition implies transfer", ctx.transfer_initiated))
    } else if id.contains("collect") || id.contains("gather") {
        Some(("collection heuristic", !ctx.collected.is_empty()))
    } else if id.contains("end") || id.contains("close") {
        Some(("clean-end heuristic", ctx.flow_state == FlowState::Ended))
    } else {
        None
    };

    if let Some((name, passed)) = heuristic {
        return GoalResult {
            goal_id: goal.id.clone(),
            passed,
            missing_fields: Vec::new(),
            detail: name.to_string(),
        };
    }

    // No predicate, no heuristic: pass on any forward progress.
    let passed = ctx.turn_count > 2
        || !ctx.collected.is_empty()
        || ctx.booking_confirmed
        || ctx.transfer_initiated;
    GoalResult {
        goal_id: goal.id.clone(),
        passed,
        missing_fields: Vec::new(),
        detail: "forward-progress fallback".to_string(),
    }
}

/// Computes the terminal verdict for one conversation
pub struct GoalEvaluator;

impl GoalEvaluator {
    /// Evaluate all goals and constraints against the final state
    pub fn evaluate_test(
        goals: &[Goal],
        constraints: &[Constraint],
        ctx: &GoalContext,
        completed_goals: &[String],
        last_intent: Option<LegacyIntent>,
        transcript: &Transcript,
        duration_ms: u64,
    ) -> GoalTestResult {
        let goal_results: Vec<GoalResult> = goals
            .iter()
            .map(|g| evaluate_goal(g, ctx, last_intent, completed_goals))
            .collect();

        let violations = Self::check_constraints(constraints, ctx, duration_ms);

        let critical = violations
            .iter()
            .filter(|v| v.severity == Severity::Critical)
            .count();
        let required_failed: Vec<&GoalResult> = goals
            .iter()
            .zip(&goal_results)
            .filter(|(goal, result)| goal.required && !result.passed)
            .map(|(_, result)| result)
            .collect();

        let passed = critical == 0 && required_failed.is_empty();

        let summary = Self::render_summary(
            passed,
            &goal_results,
            &violations,
            critical,
            ctx,
            transcript,
        );

        GoalTestResult {
            passed,
            goal_results,
            violations,
            summary,
            final_context: ctx.clone(),
        }
    }

    fn check_constraints(
        constraints: &[Constraint],
        ctx: &GoalContext,
        duration_ms: u64,
    ) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        for constraint in constraints {
            let violated = match &constraint.kind {
                ConstraintKind::MustHappen => constraint
                    .predicate
                    .as_ref()
                    .map(|p| !p(ctx))
                    .unwrap_or(false),
                ConstraintKind::MustNotHappen => constraint
                    .predicate
                    .as_ref()
                    .map(|p| p(ctx))
                    .unwrap_or(false),
                ConstraintKind::MaxTurns(limit) => ctx.turn_count > *limit,
                ConstraintKind::MaxTimeMs(limit) => duration_ms > *limit,
            };

            if violated {
                violations.push(ConstraintViolation {
                    constraint_id: constraint.id.clone(),
                    severity: constraint.severity,
                    description: if constraint.description.is_empty() {
                        format!("constraint {} violated", constraint.id)
                    } else {
                        constraint.description.clone()
                    },
                    turn: match constraint.kind {
                        ConstraintKind::MaxTurns(_) => Some(2 * ctx.turn_count),
                        _ => None,
                    },
                });
            }
        }

        violations
    }

    fn render_summary(
        passed: bool,
        goal_results: &[GoalResult],
        violations: &[ConstraintViolation],
        critical: usize,
        ctx: &GoalContext,
        transcript: &Transcript,
    ) -> String {
        let goals_passed = goal_results.iter().filter(|r| r.passed).count();
        let failed_ids: Vec<&str> = goal_results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.goal_id.as_str())
            .collect();

        let mut summary = format!(
            "{}: {}/{} goals passed",
            if passed { "PASSED" } else { "FAILED" },
            goals_passed,
            goal_results.len(),
        );
        if !failed_ids.is_empty() {
            summary.push_str(&format!("; failed goals: {}", failed_ids.join(", ")));
        }
        summary.push_str(&format!(
            "; {} constraint violations ({critical} critical); {} turns ({} transcript messages); {} fields collected",
            violations.len(),
            ctx.turn_count,
            transcript.len(),
            ctx.collected.len(),
        ));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsim_core::DataField;
    use std::collections::BTreeMap;

    fn ctx_with(fields: &[(DataField, &str)]) -> GoalContext {
        let mut collected = BTreeMap::new();
        for (field, value) in fields {
            collected.insert(*field, value.to_string());
        }
        GoalContext {
            collected,
            ..GoalContext::default()
        }
    }

    #[test]
    fn test_scenario_c_max_turns_and_missing_field() {
        // data_collection requiring {parent_phone, child_name}, max_turns 10;
        // 12 turns with only parent_phone collected.
        let goals = vec![Goal::data_collection(
            "collect-basics",
            vec![DataField::ParentPhone, DataField::ChildName],
        )];
        let constraints = vec![Constraint::max_turns("turn-budget", 10, Severity::High)];

        let mut ctx = ctx_with(&[(DataField::ParentPhone, "555-0182")]);
        ctx.turn_count = 12;

        let result = GoalEvaluator::evaluate_test(
            &goals,
            &constraints,
            &ctx,
            &[],
            None,
            &Transcript::new(),
            60_000,
        );

        assert!(!result.passed);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].constraint_id, "turn-budget");
        let failed = &result.goal_results[0];
        assert!(!failed.passed);
        assert_eq!(failed.missing_fields, vec![DataField::ChildName]);
        assert!(result.summary.contains("FAILED"));
    }

    #[test]
    fn test_completed_goal_short_circuits() {
        let goals = vec![Goal::booking_confirmed("booked")];
        // Final flags say no booking, but the goal completed during the run.
        let ctx = GoalContext::default();
        let result = GoalEvaluator::evaluate_test(
            &goals,
            &[],
            &ctx,
            &["booked".to_string()],
            None,
            &Transcript::new(),
            1_000,
        );
        assert!(result.passed);
        assert!(result.goal_results[0].passed);
    }

    #[test]
    fn test_optional_goal_does_not_fail_test() {
        let goals = vec![Goal::booking_confirmed("nice-to-have").optional()];
        let result = GoalEvaluator::evaluate_test(
            &goals,
            &[],
            &GoalContext::default(),
            &[],
            None,
            &Transcript::new(),
            1_000,
        );
        assert!(result.passed);
        assert!(!result.goal_results[0].passed);
    }

    #[test]
    fn test_critical_violation_fails_even_with_goals_passed() {
        let goals = vec![Goal::custom("any", |_| true)];
        let constraints = vec![Constraint::must_not_happen(
            "no-transfer",
            Severity::Critical,
            |ctx| ctx.transfer_initiated,
        )];
        let mut ctx = GoalContext::default();
        ctx.transfer_initiated = true;

        let result = GoalEvaluator::evaluate_test(
            &goals,
            &constraints,
            &ctx,
            &[],
            None,
            &Transcript::new(),
            1_000,
        );
        assert!(!result.passed);
        assert_eq!(result.violations[0].severity, Severity::Critical);
    }

    #[test]
    fn test_must_happen_violation() {
        let constraints = vec![Constraint::must_happen(
            "must-book",
            Severity::High,
            |ctx| ctx.booking_confirmed,
        )];
        let result = GoalEvaluator::evaluate_test(
            &[],
            &constraints,
            &GoalContext::default(),
            &[],
            None,
            &Transcript::new(),
            1_000,
        );
        // High severity violation alone does not fail the test...
        assert!(result.passed);
        // ...but it is reported.
        assert_eq!(result.violations.len(), 1);
    }

    #[test]
    fn test_max_time_violation() {
        let constraints = vec![Constraint::max_time_ms("time-budget", 5_000, Severity::Critical)];
        let result = GoalEvaluator::evaluate_test(
            &[],
            &constraints,
            &GoalContext::default(),
            &[],
            None,
            &Transcript::new(),
            9_000,
        );
        assert!(!result.passed);
    }

    #[test]
    fn test_custom_heuristic_recognize_existing() {
        let goal = Goal::new("recognize-existing-patient", GoalType::Custom);
        let mut ctx = GoalContext::default();
        assert!(!evaluate_goal(&goal, &ctx, None, &[]).passed);
        ctx.transfer_initiated = true;
        assert!(evaluate_goal(&goal, &ctx, None, &[]).passed);
    }

    #[test]
    fn test_custom_forward_progress_fallback() {
        let goal = Goal::new("mystery-goal", GoalType::Custom);
        let mut ctx = GoalContext::default();
        ctx.turn_count = 1;
        assert!(!evaluate_goal(&goal, &ctx, None, &[]).passed);
        ctx.turn_count = 5;
        assert!(evaluate_goal(&goal, &ctx, None, &[]).passed);
    }

    #[test]
    fn test_conversation_ended_via_last_intent() {
        let goal = Goal::conversation_ended("clean-end");
        let ctx = GoalContext::default();
        let result = evaluate_goal(&goal, &ctx, Some(LegacyIntent::SayingGoodbye), &[]);
        assert!(result.passed);
    }
}
