//! Round lifecycle for a single match.
//!
//! ```text
//! Idle --start_match--> Playing(round Running)
//!   Running --submit_answer / timer expiry--> Resolved
//!   Resolved --advance_or_complete--> Running (next round) | Complete
//! Playing --end_match--> Complete
//! any --start_match--> Playing (fresh match)
//! ```
//!
//! The controller is synchronous and expects every stimulus (answers, ticks,
//! advance requests) to be serialized by its owner.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};

use super::countdown::{Countdown, CountdownId, Ticker};
use super::question_generator;
use crate::models::answer::RoundOutcome;
use crate::models::matches::{MatchSnapshot, PhaseKind, RoundSnapshot};
use crate::models::{DifficultyTier, MatchSummary, Question, QuestionView};
use crate::utils::time::elapsed_seconds;

/// Seconds a player gets per question.
pub const ROUND_TIME_SECONDS: u32 = 5;
/// Points added for each correct answer.
pub const POINTS_PER_CORRECT: u32 = 10;
/// Rounds in a complete match.
pub const MATCH_LENGTH: u32 = 10;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Receives finished matches. Fire-and-forget: the controller neither waits
/// for nor retries the hand-off.
pub trait StatsSink: Send + Sync {
    fn persist(&self, summary: &MatchSummary);
}

/// Sink that drops every summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl StatsSink for DiscardSink {
    fn persist(&self, _summary: &MatchSummary) {}
}

/// Running counters of a match in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub tier: DifficultyTier,
    pub score: u32,
    pub correct_count: u32,
    pub rounds_played: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
pub enum RoundStatus {
    Running {
        time_remaining: u32,
        countdown: Countdown,
    },
    Resolved(RoundOutcome),
}

#[derive(Debug)]
pub struct Round {
    pub number: u32,
    pub question: Question,
    pub status: RoundStatus,
}

impl Round {
    pub fn is_running(&self) -> bool {
        matches!(self.status, RoundStatus::Running { .. })
    }
}

#[derive(Debug)]
pub enum MatchPhase {
    Idle,
    Playing { tally: Tally, round: Round },
    Complete(MatchSummary),
}

/// Result of [`MatchController::submit_answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Scored {
        outcome: RoundOutcome,
        correct_answer: u32,
    },
    /// No round was running; nothing changed.
    Ignored,
}

impl Submission {
    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            Submission::Scored {
                outcome: RoundOutcome::Correct,
                ..
            }
        )
    }
}

/// Result of feeding one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick belongs to a countdown that is no longer running.
    Stale,
    Ticking { round: u32, remaining: u32 },
    Expired { round: u32, correct_answer: u32 },
}

/// Result of [`MatchController::advance_or_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    NextRound { number: u32 },
    Complete(MatchSummary),
    /// Nothing to advance from: idle, complete, or the round is still running.
    Ignored,
}

pub struct MatchController {
    phase: MatchPhase,
    tier: DifficultyTier,
    last_started_at: Option<DateTime<Utc>>,
    next_countdown: CountdownId,
    ticker: Box<dyn Ticker>,
    sink: Arc<dyn StatsSink>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
}

impl MatchController {
    pub fn new(ticker: Box<dyn Ticker>, sink: Arc<dyn StatsSink>) -> Self {
        Self {
            phase: MatchPhase::Idle,
            tier: DifficultyTier::default(),
            last_started_at: None,
            next_countdown: 1,
            ticker,
            sink,
            clock: Arc::new(SystemClock),
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Resets every counter and opens round 1. Any match in progress is
    /// discarded without being persisted.
    pub fn start_match(&mut self, tier: DifficultyTier) -> Question {
        // Drop the old phase first so its countdown is cancelled before a new one is armed.
        self.phase = MatchPhase::Idle;
        self.tier = tier;

        let now = self.clock.now();
        let started_at = match self.last_started_at {
            Some(previous) if now <= previous => previous + ChronoDuration::microseconds(1),
            _ => now,
        };
        self.last_started_at = Some(started_at);

        let round = self.open_round(1, tier);
        let question = round.question.clone();
        tracing::info!(%tier, question = %question.display, "match started");

        self.phase = MatchPhase::Playing {
            tally: Tally {
                tier,
                score: 0,
                correct_count: 0,
                rounds_played: 1,
                started_at,
            },
            round,
        };

        question
    }

    /// Scores the running round. Stops its countdown. Does not advance.
    pub fn submit_answer(&mut self, selected: i64) -> Submission {
        let MatchPhase::Playing { tally, round } = &mut self.phase else {
            tracing::warn!(selected, "answer submitted with no match in progress");
            return Submission::Ignored;
        };
        if !round.is_running() {
            tracing::warn!(
                selected,
                round = round.number,
                "answer submitted for a round that is already resolved"
            );
            return Submission::Ignored;
        }

        let outcome = if round.question.is_correct(selected) {
            tally.score += POINTS_PER_CORRECT;
            tally.correct_count += 1;
            RoundOutcome::Correct
        } else {
            RoundOutcome::Incorrect
        };
        round.status = RoundStatus::Resolved(outcome);

        tracing::debug!(
            round = round.number,
            selected,
            ?outcome,
            score = tally.score,
            "round resolved by answer"
        );

        Submission::Scored {
            outcome,
            correct_answer: round.question.correct_answer,
        }
    }

    /// Applies one second of countdown. Ticks from any countdown other than
    /// the running one are discarded.
    pub fn on_tick(&mut self, countdown_id: CountdownId) -> TickOutcome {
        let (round_number, remaining) = match &mut self.phase {
            MatchPhase::Playing {
                round:
                    Round {
                        number,
                        status:
                            RoundStatus::Running {
                                time_remaining,
                                countdown,
                            },
                        ..
                    },
                ..
            } if countdown.id() == countdown_id => {
                *time_remaining = time_remaining.saturating_sub(1);
                (*number, *time_remaining)
            }
            _ => {
                tracing::debug!(countdown = countdown_id, "discarding stale countdown tick");
                return TickOutcome::Stale;
            }
        };

        if remaining > 0 {
            return TickOutcome::Ticking {
                round: round_number,
                remaining,
            };
        }

        match self.on_timer_expiry() {
            Some(correct_answer) => TickOutcome::Expired {
                round: round_number,
                correct_answer,
            },
            None => TickOutcome::Stale,
        }
    }

    /// Resolves the running round as timed out, exactly like a wrong answer.
    /// Returns the correct answer, or `None` when no round was running.
    pub fn on_timer_expiry(&mut self) -> Option<u32> {
        match &mut self.phase {
            MatchPhase::Playing { round, .. } if round.is_running() => {
                round.status = RoundStatus::Resolved(RoundOutcome::TimedOut);
                tracing::debug!(round = round.number, "round timed out");
                Some(round.question.correct_answer)
            }
            _ => None,
        }
    }

    /// After a round resolved: completes the match once `MATCH_LENGTH` rounds
    /// were played, otherwise opens the next round.
    pub fn advance_or_complete(&mut self) -> Advance {
        let (tally, number) = match &self.phase {
            MatchPhase::Playing { tally, round } if !round.is_running() => (*tally, round.number),
            MatchPhase::Playing { round, .. } => {
                tracing::warn!(round = round.number, "advance requested while round is running");
                return Advance::Ignored;
            }
            MatchPhase::Idle | MatchPhase::Complete(_) => {
                tracing::warn!("advance requested with no match in progress");
                return Advance::Ignored;
            }
        };

        if tally.rounds_played >= MATCH_LENGTH {
            return Advance::Complete(self.finish(tally));
        }

        let next = self.open_round(number + 1, tally.tier);
        if let MatchPhase::Playing { tally, round } = &mut self.phase {
            *round = next;
            tally.rounds_played += 1;
        }

        Advance::NextRound { number: number + 1 }
    }

    /// Early termination. A match in play has always opened round 1, so ending
    /// it always persists a summary. Idle and completed matches yield `None`.
    pub fn end_match(&mut self) -> Option<MatchSummary> {
        let tally = match &self.phase {
            MatchPhase::Playing { tally, .. } => *tally,
            MatchPhase::Idle | MatchPhase::Complete(_) => {
                tracing::debug!("end requested with no match in progress");
                return None;
            }
        };

        debug_assert!(tally.rounds_played >= 1, "a match in play has opened a round");
        Some(self.finish(tally))
    }

    pub fn tier(&self) -> DifficultyTier {
        self.tier
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, MatchPhase::Playing { .. })
    }

    pub fn current_question(&self) -> Option<&Question> {
        match &self.phase {
            MatchPhase::Playing { round, .. } => Some(&round.question),
            _ => None,
        }
    }

    pub fn current_round(&self) -> Option<u32> {
        match &self.phase {
            MatchPhase::Playing { round, .. } => Some(round.number),
            _ => None,
        }
    }

    pub fn time_remaining(&self) -> Option<u32> {
        match &self.phase {
            MatchPhase::Playing {
                round:
                    Round {
                        status: RoundStatus::Running { time_remaining, .. },
                        ..
                    },
                ..
            } => Some(*time_remaining),
            _ => None,
        }
    }

    /// Id of the countdown currently running, if any.
    pub fn running_countdown(&self) -> Option<CountdownId> {
        match &self.phase {
            MatchPhase::Playing {
                round:
                    Round {
                        status: RoundStatus::Running { countdown, .. },
                        ..
                    },
                ..
            } => Some(countdown.id()),
            _ => None,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.phase {
            MatchPhase::Playing { tally, .. } => Some(tally.started_at),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        match &self.phase {
            MatchPhase::Idle => MatchSnapshot {
                phase: PhaseKind::Idle,
                tier: self.tier,
                score: 0,
                correct_count: 0,
                rounds_played: 0,
                current_round: None,
                summary: None,
            },
            MatchPhase::Playing { tally, round } => {
                let (time_remaining, outcome, correct_answer) = match &round.status {
                    RoundStatus::Running { time_remaining, .. } => (Some(*time_remaining), None, None),
                    RoundStatus::Resolved(outcome) => {
                        (None, Some(*outcome), Some(round.question.correct_answer))
                    }
                };
                MatchSnapshot {
                    phase: PhaseKind::Playing,
                    tier: tally.tier,
                    score: tally.score,
                    correct_count: tally.correct_count,
                    rounds_played: tally.rounds_played,
                    current_round: Some(RoundSnapshot {
                        number: round.number,
                        question: QuestionView::from(&round.question),
                        time_remaining,
                        outcome,
                        correct_answer,
                    }),
                    summary: None,
                }
            }
            MatchPhase::Complete(summary) => MatchSnapshot {
                phase: PhaseKind::Complete,
                tier: summary.tier,
                score: summary.score,
                correct_count: summary.correct_count,
                rounds_played: summary.rounds_played,
                current_round: None,
                summary: Some(summary.clone()),
            },
        }
    }

    fn open_round(&mut self, number: u32, tier: DifficultyTier) -> Round {
        let question = question_generator::generate(tier, &mut self.rng);
        let id = self.next_countdown;
        self.next_countdown += 1;
        let countdown = self.ticker.arm(id, ROUND_TIME_SECONDS);

        Round {
            number,
            question,
            status: RoundStatus::Running {
                time_remaining: ROUND_TIME_SECONDS,
                countdown,
            },
        }
    }

    fn finish(&mut self, tally: Tally) -> MatchSummary {
        let elapsed = elapsed_seconds(tally.started_at, self.clock.now());
        let summary = MatchSummary::new(
            tally.tier,
            tally.score,
            tally.correct_count,
            tally.rounds_played,
            elapsed,
        );

        // Replacing the phase drops any countdown still attached to the round.
        self.phase = MatchPhase::Complete(summary.clone());

        tracing::info!(
            score = summary.score,
            correct = summary.correct_count,
            rounds = summary.rounds_played,
            elapsed_seconds = summary.elapsed_seconds,
            accuracy = summary.accuracy_percent,
            "match finished"
        );

        self.sink.persist(&summary);
        summary
    }
}
