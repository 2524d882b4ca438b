use serde::{Deserialize, Serialize};
use std::fmt;

pub mod answer;
pub mod game_stats;
pub mod matches;
pub mod timer;

pub use game_stats::{GameStats, HighScoreResponse, NewGameStats};
pub use matches::{MatchSummary, QuestionView};

/// Question-generation rules a match is played with.
///
/// On the wire a tier is the plain integer level the client picked (1 or 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DifficultyTier {
    /// Single-digit operands.
    #[default]
    Basic,
    /// Tens (10..=50) combined with a single digit.
    Advanced,
}

impl DifficultyTier {
    pub fn level(self) -> u8 {
        match self {
            DifficultyTier::Basic => 1,
            DifficultyTier::Advanced => 2,
        }
    }
}

impl TryFrom<u8> for DifficultyTier {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(DifficultyTier::Basic),
            2 => Ok(DifficultyTier::Advanced),
            other => Err(format!("unknown difficulty tier {}, expected 1 or 2", other)),
        }
    }
}

impl From<DifficultyTier> for u8 {
    fn from(tier: DifficultyTier) -> Self {
        tier.level()
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier-{}", self.level())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Subtract,
}

impl Operator {
    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
        }
    }

    /// Returns `None` when the result would leave the non-negative range.
    #[cfg(test)]
    pub(crate) fn apply(self, lhs: u32, rhs: u32) -> Option<u32> {
        match self {
            Operator::Add => lhs.checked_add(rhs),
            Operator::Subtract => lhs.checked_sub(rhs),
        }
    }
}

/// One round's arithmetic problem. Built once by the question generator and
/// never mutated afterwards; `options[correct_index] == correct_answer` always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub display: String,
    pub operands: [u32; 2],
    pub operator: Operator,
    pub correct_answer: u32,
    pub options: [u32; 2],
    pub correct_index: usize,
}

impl Question {
    pub fn distractor(&self) -> u32 {
        self.options[1 - self.correct_index]
    }

    pub fn is_correct(&self, selected: i64) -> bool {
        selected == i64::from(self.correct_answer)
    }
}
