//! Conversation runner
//!
//! Owns the turn loop: classify the agent's utterance, update both
//! trackers, synthesize the caller's reply, and hand it back to the agent
//! under test. Stops on a terminal classification, the turn budget, or an
//! external stop signal, then runs the goal evaluator once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use callsim_classifier::ResponseClassifier;
use callsim_config::Settings;
use callsim_core::{
    CallerPersona, ClassificationResult, DataField, Error, GoalTestResult, Result, Transcript,
    Turn,
};
use callsim_responder::{persona_value, ResponseContext, ResponseStrategyEngine};
use callsim_tracker::{
    Anomaly, ContextTracker, GoalEvaluator, ProgressState, ProgressTracker,
};

use crate::report::FailureReport;
use crate::test_case::TestCase;

/// The agent under test, seen from the caller's side of the line
#[async_trait]
pub trait DialogueAgent: Send {
    /// The agent's opening utterance
    async fn open(&mut self) -> Result<String>;

    /// The agent's reply to the caller's line
    async fn respond(&mut self, caller_line: &str) -> Result<String>;
}

/// Everything one conversation produced
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    pub result: GoalTestResult,
    pub report: FailureReport,
    pub transcript: Transcript,
    pub final_state: ProgressState,
    pub anomalies: Vec<Anomaly>,
    pub session_id: String,
}

/// Drives one conversation per `run` call
///
/// All conversation state is created inside `run`, so a single runner can
/// drive many conversations concurrently; only the classifier's result
/// cache is shared.
pub struct ConversationRunner {
    settings: Settings,
    classifier: Arc<ResponseClassifier>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl ConversationRunner {
    /// Runner with a deterministic-only classifier
    pub fn new(settings: Settings) -> Self {
        let classifier = Arc::new(ResponseClassifier::new(settings.classifier.clone()));
        Self {
            settings,
            classifier,
            stop_flag: None,
        }
    }

    /// Runner sharing a pre-built classifier (e.g. with an LLM tier)
    pub fn with_classifier(settings: Settings, classifier: Arc<ResponseClassifier>) -> Self {
        Self {
            settings,
            classifier,
            stop_flag: None,
        }
    }

    /// External stop signal checked between turns
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    /// Run one conversation to completion and evaluate it
    pub async fn run(
        &self,
        agent: &mut dyn DialogueAgent,
        test_case: &TestCase,
    ) -> Result<ConversationOutcome> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let persona = &test_case.persona;

        let context_tracker = ContextTracker::new(session_id.clone(), self.settings.tracker.clone());
        let progress = ProgressTracker::new(test_case.goals.clone(), self.settings.tracker.clone());
        let engine = ResponseStrategyEngine::new(self.settings.responder.clone());

        let mut transcript = Transcript::new();
        let start = Instant::now();

        let mut utterance = agent
            .open()
            .await
            .map_err(|e| Error::Harness(format!("agent failed to open: {e}")))?;

        for turn in 1..=test_case.max_turns {
            if self.stopped() {
                tracing::info!(%session_id, turn, "external stop signal");
                break;
            }

            let classification = self
                .classifier
                .classify(&utterance, &transcript, persona)
                .await;

            tracing::debug!(
                %session_id,
                turn,
                category = classification.category.as_str(),
                confidence = classification.confidence,
                terminal = classification.terminal_state.as_str(),
                "agent turn classified"
            );

            transcript.push(Turn::agent(utterance.as_str()).with_classification(classification.clone()));
            context_tracker.record_agent_turn(turn, &classification);

            let booking_completed =
                progress.state().booking_confirmed || classification.confirmed_this_turn;
            if classification.confirmed_this_turn {
                context_tracker.mark_child_booked();
            }

            let response_context = ResponseContext::new(utterance.as_str())
                .booking_completed(booking_completed)
                .active_child(context_tracker.context().active_child);
            let reply = engine.generate_response(&classification, persona, &response_context);

            progress.update_progress(&classification, &reply, turn);
            let provided = Self::provided_fields(&classification, persona, &response_context);
            context_tracker.record_user_turn(turn, &reply, &provided);

            transcript.push(Turn::caller(reply.as_str()));

            if classification.terminal_state.is_terminal() {
                tracing::info!(
                    %session_id,
                    terminal = classification.terminal_state.as_str(),
                    "conversation reached terminal state"
                );
                break;
            }

            utterance = agent
                .respond(&reply)
                .await
                .map_err(|e| Error::Harness(format!("agent failed to respond: {e}")))?;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let final_state = progress.state();

        let result = GoalEvaluator::evaluate_test(
            &test_case.goals,
            &test_case.constraints,
            &final_state.goal_context(),
            &final_state.completed_goals,
            final_state.last_intent(),
            &transcript,
            duration_ms,
        );

        let anomalies = context_tracker.anomalies();
        let report = FailureReport::build(
            &test_case.name,
            &result,
            &final_state,
            anomalies.clone(),
            transcript.len(),
        );

        Ok(ConversationOutcome {
            result,
            report,
            transcript,
            final_state,
            anomalies,
            session_id,
        })
    }

    fn stopped(&self) -> bool {
        self.stop_flag
            .as_ref()
            .map(|f| f.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Which fields did the caller's reply actually provide? The engine
    /// answers from the persona inventory, so the requested fields that
    /// resolve there are the ones handed over.
    fn provided_fields(
        classification: &ClassificationResult,
        persona: &CallerPersona,
        context: &ResponseContext,
    ) -> Vec<(DataField, String)> {
        classification
            .requested_fields
            .iter()
            .filter(|f| **f != DataField::Unknown)
            .filter_map(|f| {
                persona_value(persona, *f, context.active_child).map(|value| (*f, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callsim_core::{Constraint, Goal, PersonaTemplates, Severity};
    use std::collections::VecDeque;

    /// Agent that replays a fixed script of utterances
    struct ScriptedAgent {
        lines: VecDeque<String>,
    }

    impl ScriptedAgent {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn next_line(&mut self) -> Result<String> {
            self.lines
                .pop_front()
                .ok_or_else(|| Error::Harness("script exhausted".to_string()))
        }
    }

    #[async_trait]
    impl DialogueAgent for ScriptedAgent {
        async fn open(&mut self) -> Result<String> {
            self.next_line()
        }

        async fn respond(&mut self, _caller_line: &str) -> Result<String> {
            self.next_line()
        }
    }

    fn runner() -> ConversationRunner {
        ConversationRunner::new(Settings::default())
    }

    #[tokio::test]
    async fn test_happy_path_booking() {
        let mut agent = ScriptedAgent::new(&[
            "Thank you for calling, how can I help you today?",
            "Of course. May I have your full name?",
            "And the best phone number to reach you?",
            "What is your child's name?",
            "And their date of birth?",
            "Would you prefer morning or afternoon?",
            "Your appointment has been successfully scheduled for Monday at 9am.",
        ]);

        let case = TestCase::new(
            "happy-path",
            PersonaTemplates::new_patient_parent(),
        )
        .with_goal(Goal::data_collection(
            "basics",
            vec![
                DataField::ParentName,
                DataField::ParentPhone,
                DataField::ChildName,
                DataField::ChildDob,
            ],
        ))
        .with_goal(Goal::booking_confirmed("booked"))
        .with_max_turns(10);

        let outcome = runner().run(&mut agent, &case).await.unwrap();

        assert!(outcome.result.passed, "summary: {}", outcome.result.summary);
        assert!(outcome.final_state.booking_confirmed);
        assert!(outcome.final_state.collected.len() >= 4);
        // terminal turn stops the loop before the script runs dry
        assert_eq!(outcome.final_state.turn, 7);
    }

    #[tokio::test]
    async fn test_scenario_c_overrun() {
        // Agent loops on the same two questions and never books.
        let mut lines = vec!["How can I help you?".to_string()];
        for _ in 0..12 {
            lines.push("And the best phone number to reach you?".to_string());
            lines.push("Let me check availability for you.".to_string());
        }
        let lines: Vec<&str> = lines.iter().map(|s| s.as_str()).collect();
        let mut agent = ScriptedAgent::new(&lines);

        let case = TestCase::new("overrun", PersonaTemplates::new_patient_parent())
            .with_goal(Goal::data_collection(
                "collect-basics",
                vec![DataField::ParentPhone, DataField::ChildName],
            ))
            .with_constraint(Constraint::max_turns("turn-budget", 10, Severity::Critical))
            .with_max_turns(12);

        let outcome = runner().run(&mut agent, &case).await.unwrap();

        assert!(!outcome.result.passed);
        assert!(outcome
            .result
            .violations
            .iter()
            .any(|v| v.constraint_id == "turn-budget"));
        let failed = outcome
            .result
            .goal_results
            .iter()
            .find(|r| r.goal_id == "collect-basics")
            .unwrap();
        assert!(!failed.passed);
        assert!(failed.missing_fields.contains(&DataField::ChildName));
        assert!(outcome.report.render().contains("turn-budget"));
    }

    #[tokio::test]
    async fn test_external_stop() {
        let mut agent = ScriptedAgent::new(&[
            "How can I help you?",
            "May I have your full name?",
            "And the best phone number?",
        ]);

        let flag = Arc::new(AtomicBool::new(true));
        let runner = ConversationRunner::new(Settings::default()).with_stop_flag(flag);

        let case = TestCase::new("stopped", PersonaTemplates::new_patient_parent())
            .with_goal(Goal::booking_confirmed("booked"));

        let outcome = runner.run(&mut agent, &case).await.unwrap();
        // stopped before any turn was processed
        assert_eq!(outcome.final_state.turn, 0);
        assert!(!outcome.result.passed);
    }

    #[tokio::test]
    async fn test_transfer_terminates() {
        let mut agent = ScriptedAgent::new(&[
            "How can I help you?",
            "I see, let me transfer you to our treatment coordinator.",
        ]);

        let case = TestCase::new("transfer", PersonaTemplates::returning_family())
            .with_goal(Goal::transfer_initiated("handoff"))
            .with_max_turns(6);

        let outcome = runner().run(&mut agent, &case).await.unwrap();
        assert!(outcome.result.passed);
        assert!(outcome.final_state.transfer_initiated);
        assert_eq!(outcome.final_state.turn, 2);
    }

    #[tokio::test]
    async fn test_goodbye_after_booking_keeps_flag() {
        let mut agent = ScriptedAgent::new(&[
            "How can I help you?",
            "May I have your full name?",
            "Your appointment has been booked. Anything else I can help with?",
            "Perfect. Goodbye, have a great day!",
        ]);

        let case = TestCase::new("goodbye", PersonaTemplates::new_patient_parent())
            .with_goal(Goal::booking_confirmed("booked"))
            .with_max_turns(6);

        let outcome = runner().run(&mut agent, &case).await.unwrap();
        assert!(outcome.result.passed, "summary: {}", outcome.result.summary);
        assert!(outcome.final_state.booking_confirmed);
        // the caller closed the call after the follow-up question
        let closing = outcome
            .transcript
            .turns
            .iter()
            .rev()
            .find(|t| t.role == callsim_core::TurnRole::Caller)
            .unwrap();
        assert!(!closing.content.is_empty());
    }
}
