use serde::{Deserialize, Serialize};

use super::answer::RoundOutcome;
use super::{DifficultyTier, NewGameStats, Operator, Question};
use crate::utils::time::format_elapsed;

/// Final statistics of a match, handed to the stats service and shown to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub tier: DifficultyTier,
    pub score: u32,
    pub correct_count: u32,
    pub rounds_played: u32,
    pub elapsed_seconds: u64,
    pub accuracy_percent: u32,
}

impl MatchSummary {
    pub fn new(
        tier: DifficultyTier,
        score: u32,
        correct_count: u32,
        rounds_played: u32,
        elapsed_seconds: u64,
    ) -> Self {
        Self {
            tier,
            score,
            correct_count,
            rounds_played,
            elapsed_seconds,
            accuracy_percent: accuracy_percent(correct_count, rounds_played),
        }
    }

    /// The persisted shape drops elapsed time and accuracy.
    pub fn to_game_stats(&self) -> NewGameStats {
        NewGameStats {
            score: self.score,
            correct_answers: self.correct_count,
            total_questions: self.rounds_played,
        }
    }

    pub fn formatted_time(&self) -> String {
        format_elapsed(self.elapsed_seconds)
    }

    pub fn result_message(&self) -> String {
        format!(
            "You got {} out of {} questions correct!",
            self.correct_count, self.rounds_played
        )
    }
}

/// `round(correct / rounds * 100)`, or 0 when nothing was played.
pub fn accuracy_percent(correct_count: u32, rounds_played: u32) -> u32 {
    if rounds_played == 0 {
        return 0;
    }
    (f64::from(correct_count) / f64::from(rounds_played) * 100.0).round() as u32
}

/// What the client sees of a question while the round is still open.
/// The correct answer and its slot are withheld until the round resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub display: String,
    pub operands: [u32; 2],
    pub operator: Operator,
    pub options: [u32; 2],
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            display: question.display.clone(),
            operands: question.operands,
            operator: question.operator,
            options: question.options,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    Playing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundSnapshot {
    pub number: u32,
    pub question: QuestionView,
    /// Present while the countdown is running.
    pub time_remaining: Option<u32>,
    /// Present once the round is resolved.
    pub outcome: Option<RoundOutcome>,
    /// Revealed once the round is resolved.
    pub correct_answer: Option<u32>,
}

/// Point-in-time view of a match controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSnapshot {
    pub phase: PhaseKind,
    pub tier: DifficultyTier,
    pub score: u32,
    pub correct_count: u32,
    pub rounds_played: u32,
    pub current_round: Option<RoundSnapshot>,
    pub summary: Option<MatchSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartMatchRequest {
    #[serde(default)]
    pub tier: DifficultyTier,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    pub match_id: String,
    #[serde(flatten)]
    pub snapshot: MatchSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MatchResponse {
    pub fn new(match_id: impl Into<String>, snapshot: MatchSnapshot) -> Self {
        let (formatted_time, message) = match &snapshot.summary {
            Some(summary) => (Some(summary.formatted_time()), Some(summary.result_message())),
            None => (None, None),
        };
        Self {
            match_id: match_id.into(),
            snapshot,
            formatted_time,
            message,
        }
    }
}
