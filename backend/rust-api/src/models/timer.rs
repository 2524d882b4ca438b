use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answer::RoundOutcome;
use super::matches::{MatchSummary, QuestionView};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatchEvent {
    RoundStarted(RoundStarted),
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    RoundResolved(RoundResolved),
    MatchComplete(MatchComplete),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoundStarted {
    pub match_id: String,
    pub round: u32,
    pub question: QuestionView,
    pub time_remaining: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerTick {
    pub match_id: String,
    pub round: u32,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimeExpired {
    pub match_id: String,
    pub round: u32,
    pub correct_answer: u32,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoundResolved {
    pub match_id: String,
    pub round: u32,
    pub outcome: RoundOutcome,
    pub correct_answer: u32,
    pub score: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MatchComplete {
    pub match_id: String,
    pub summary: MatchSummary,
    pub timestamp: DateTime<Utc>,
}

impl MatchEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            MatchEvent::RoundStarted(_) => "round-started",
            MatchEvent::TimerTick(_) => "timer-tick",
            MatchEvent::TimeExpired(_) => "time-expired",
            MatchEvent::RoundResolved(_) => "round-resolved",
            MatchEvent::MatchComplete(_) => "match-complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchEvent::MatchComplete(_))
    }
}
