use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub answer: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    /// False when the round had already been resolved (or none was running).
    pub accepted: bool,
    pub correct: bool,
    pub outcome: Option<RoundOutcome>,
    pub correct_answer: Option<u32>,
    pub score_awarded: u32,
    pub total_score: u32,
    pub correct_count: u32,
    pub rounds_played: u32,
    pub feedback: Option<String>,
    /// How long the client should show feedback before asking to advance.
    pub feedback_delay_ms: u64,
}

/// How a single round was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Correct,
    Incorrect,
    TimedOut,
}

impl RoundOutcome {
    pub fn is_correct(self) -> bool {
        matches!(self, RoundOutcome::Correct)
    }

    /// Pause the presentation layer holds the feedback modal before the next round.
    pub fn feedback_delay(self) -> Duration {
        match self {
            RoundOutcome::Correct | RoundOutcome::Incorrect => Duration::from_millis(2500),
            RoundOutcome::TimedOut => Duration::from_millis(2000),
        }
    }

    pub fn feedback(self, correct_answer: u32) -> String {
        match self {
            RoundOutcome::Correct => "Great Job! You got it right!".to_string(),
            RoundOutcome::Incorrect => format!("Try Again! The correct answer was: {}", correct_answer),
            RoundOutcome::TimedOut => format!("Time's up! The correct answer was: {}", correct_answer),
        }
    }
}
