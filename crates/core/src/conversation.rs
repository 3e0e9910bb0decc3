//! Conversation turns and transcripts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::ClassificationResult;

/// Role in a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// The simulated caller
    Caller,
    /// The agent under test
    Agent,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::Caller => "caller",
            TurnRole::Agent => "agent",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single turn in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Role of the speaker
    pub role: TurnRole,
    /// Content of the turn
    pub content: String,
    /// When the turn occurred
    pub timestamp: DateTime<Utc>,
    /// Classification of this turn (agent turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            classification: None,
        }
    }

    /// Create a caller turn
    pub fn caller(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Caller, content)
    }

    /// Create an agent turn
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Agent, content)
    }

    pub fn with_classification(mut self, classification: ClassificationResult) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Ordered record of everything said in one conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last `n` turns in chronological order
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Most recent caller turn, if any
    pub fn last_caller_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == TurnRole::Caller)
    }

    /// Number of agent turns so far
    pub fn agent_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.role == TurnRole::Agent).count()
    }
}
