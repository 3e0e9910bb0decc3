//! Test case declaration

use callsim_core::{CallerPersona, Constraint, Goal};

/// One declared conversation test: who is calling, what success looks
/// like, and what must not happen along the way
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Test name for reports
    pub name: String,
    /// The simulated caller
    pub persona: CallerPersona,
    /// Declared success conditions
    pub goals: Vec<Goal>,
    /// Declared invariants
    pub constraints: Vec<Constraint>,
    /// Hard stop after this many agent turns
    pub max_turns: u32,
}

impl TestCase {
    pub fn new(name: impl Into<String>, persona: CallerPersona) -> Self {
        Self {
            name: name.into(),
            persona,
            goals: Vec::new(),
            constraints: Vec::new(),
            max_turns: 20,
        }
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goals.push(goal);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }
}
