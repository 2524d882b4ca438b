//! Hosts match controllers server-side.
//!
//! Every match runs as its own task that exclusively owns a
//! [`MatchController`]. Client requests and countdown ticks reach it through a
//! single command channel, so all transitions of one match are serialized.
//! Observers follow a match through a broadcast channel of [`MatchEvent`]s.
//!
//! A round that times out advances by itself once the timeout feedback delay
//! has passed. Answered rounds wait for the client to ask for the next one.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use super::countdown::{Countdown, CountdownId, IntervalTicker};
use super::match_controller::{
    Advance, MatchController, StatsSink, Submission, TickOutcome, ROUND_TIME_SECONDS,
};
use crate::metrics::{record_answer, MATCHES_ACTIVE, MATCHES_TOTAL, ROUNDS_TIMED_OUT_TOTAL};
use crate::models::answer::RoundOutcome;
use crate::models::matches::MatchSnapshot;
use crate::models::timer::{
    MatchComplete, MatchEvent, RoundResolved, RoundStarted, TimeExpired, TimerTick,
};
use crate::models::{DifficultyTier, MatchSummary, QuestionView};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("Match not found: {0}")]
    MatchNotFound(String),

    #[error("Match {0} is no longer running")]
    MatchClosed(String),
}

enum MatchCommand {
    Start {
        tier: DifficultyTier,
        reply: oneshot::Sender<MatchSnapshot>,
    },
    Submit {
        answer: i64,
        reply: oneshot::Sender<(Submission, MatchSnapshot)>,
    },
    Advance {
        reply: oneshot::Sender<(Advance, MatchSnapshot)>,
    },
    End {
        reply: oneshot::Sender<(Option<MatchSummary>, MatchSnapshot)>,
    },
    Snapshot {
        reply: oneshot::Sender<MatchSnapshot>,
    },
    Tick(CountdownId),
    /// Fired by the delay scheduled when `round` timed out.
    AutoAdvance {
        id: CountdownId,
        round: u32,
    },
}

#[derive(Clone)]
struct MatchHandle {
    commands: mpsc::UnboundedSender<MatchCommand>,
    events: broadcast::Sender<MatchEvent>,
    last_activity: Arc<Mutex<Instant>>,
}

impl MatchHandle {
    fn touch(&self) {
        let mut last = self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        let last = self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        last.elapsed()
    }
}

pub struct MatchService {
    matches: RwLock<HashMap<Uuid, MatchHandle>>,
    sink: Arc<dyn StatsSink>,
    tick_period: Duration,
    idle_ttl: Duration,
}

impl MatchService {
    pub fn new(sink: Arc<dyn StatsSink>, tick_period: Duration, idle_ttl: Duration) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            sink,
            tick_period,
            idle_ttl,
        }
    }

    /// Spawns a new match and starts its first round.
    pub async fn create_match(
        &self,
        tier: DifficultyTier,
    ) -> Result<(Uuid, MatchSnapshot), GameError> {
        let id = Uuid::new_v4();
        let handle = spawn_match(id, Arc::clone(&self.sink), self.tick_period);
        self.matches.write().await.insert(id, handle);
        MATCHES_ACTIVE.inc();

        tracing::info!(match_id = %id, %tier, "match created");

        let snapshot = self.start_match(id, tier).await?;
        Ok((id, snapshot))
    }

    /// Starts (or restarts) the match with fresh counters.
    pub async fn start_match(
        &self,
        id: Uuid,
        tier: DifficultyTier,
    ) -> Result<MatchSnapshot, GameError> {
        self.request(id, |reply| MatchCommand::Start { tier, reply })
            .await
    }

    pub async fn submit_answer(
        &self,
        id: Uuid,
        answer: i64,
    ) -> Result<(Submission, MatchSnapshot), GameError> {
        self.request(id, |reply| MatchCommand::Submit { answer, reply })
            .await
    }

    pub async fn advance(&self, id: Uuid) -> Result<(Advance, MatchSnapshot), GameError> {
        self.request(id, |reply| MatchCommand::Advance { reply })
            .await
    }

    pub async fn end_match(
        &self,
        id: Uuid,
    ) -> Result<(Option<MatchSummary>, MatchSnapshot), GameError> {
        self.request(id, |reply| MatchCommand::End { reply }).await
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<MatchSnapshot, GameError> {
        self.request(id, |reply| MatchCommand::Snapshot { reply })
            .await
    }

    pub async fn subscribe(&self, id: Uuid) -> Result<broadcast::Receiver<MatchEvent>, GameError> {
        let handle = self.handle(id).await?;
        Ok(handle.events.subscribe())
    }

    /// Drops the match. Its task stops once in-flight commands are handled,
    /// which also cancels any running countdown.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.matches.write().await.remove(&id).is_some();
        if removed {
            MATCHES_ACTIVE.dec();
            tracing::info!(match_id = %id, "match removed");
        }
        removed
    }

    pub async fn active_count(&self) -> usize {
        self.matches.read().await.len()
    }

    /// Removes matches nobody touched for longer than the idle TTL.
    pub async fn reap_idle(&self) -> usize {
        let mut matches = self.matches.write().await;
        let before = matches.len();
        matches.retain(|id, handle| {
            let keep = handle.idle_for() < self.idle_ttl;
            if !keep {
                tracing::info!(match_id = %id, "reaping idle match");
            }
            keep
        });
        let reaped = before - matches.len();
        if reaped > 0 {
            MATCHES_ACTIVE.sub(reaped as i64);
            MATCHES_TOTAL
                .with_label_values(&["reaped"])
                .inc_by(reaped as u64);
        }
        reaped
    }

    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let reaped = service.reap_idle().await;
                if reaped > 0 {
                    tracing::info!(reaped, "idle matches reaped");
                }
            }
        })
    }

    async fn handle(&self, id: Uuid) -> Result<MatchHandle, GameError> {
        self.matches
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| GameError::MatchNotFound(id.to_string()))
    }

    async fn request<T>(
        &self,
        id: Uuid,
        command: impl FnOnce(oneshot::Sender<T>) -> MatchCommand,
    ) -> Result<T, GameError> {
        let handle = self.handle(id).await?;
        handle.touch();

        let (reply, response) = oneshot::channel();
        handle
            .commands
            .send(command(reply))
            .map_err(|_| GameError::MatchClosed(id.to_string()))?;
        response
            .await
            .map_err(|_| GameError::MatchClosed(id.to_string()))
    }
}

fn spawn_match(id: Uuid, sink: Arc<dyn StatsSink>, tick_period: Duration) -> MatchHandle {
    let (commands, inbox) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(EVENT_BUFFER);

    // The ticker only holds a weak sender so that dropping the handle ends the task.
    let weak = commands.downgrade();
    let ticker = IntervalTicker::new(tick_period, move |countdown| match weak.upgrade() {
        Some(commands) => commands.send(MatchCommand::Tick(countdown)).is_ok(),
        None => false,
    });

    let actor = MatchActor {
        id,
        controller: MatchController::new(Box::new(ticker), sink),
        events: events.clone(),
        commands: commands.downgrade(),
        pending_advance: None,
        next_auto_advance: 1,
    };
    tokio::spawn(actor.run(inbox));

    MatchHandle {
        commands,
        events,
        last_activity: Arc::new(Mutex::new(Instant::now())),
    }
}

struct MatchActor {
    id: Uuid,
    controller: MatchController,
    events: broadcast::Sender<MatchEvent>,
    commands: mpsc::WeakUnboundedSender<MatchCommand>,
    /// Delayed advance after a timeout. Dropping it cancels the delay.
    pending_advance: Option<Countdown>,
    next_auto_advance: CountdownId,
}

impl MatchActor {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<MatchCommand>) {
        while let Some(command) = inbox.recv().await {
            self.handle(command);
        }
        if self.controller.is_active() {
            MATCHES_TOTAL.with_label_values(&["abandoned"]).inc();
        }
        tracing::debug!(match_id = %self.id, "match task stopped");
    }

    fn handle(&mut self, command: MatchCommand) {
        match command {
            MatchCommand::Start { tier, reply } => {
                self.pending_advance = None;
                self.controller.start_match(tier);
                MATCHES_TOTAL.with_label_values(&["started"]).inc();
                self.publish_round_started();
                let _ = reply.send(self.controller.snapshot());
            }
            MatchCommand::Submit { answer, reply } => {
                let submission = self.controller.submit_answer(answer);
                if let Submission::Scored {
                    outcome,
                    correct_answer,
                } = submission
                {
                    record_answer(outcome.is_correct());
                    self.publish_round_resolved(outcome, correct_answer);
                }
                let _ = reply.send((submission, self.controller.snapshot()));
            }
            MatchCommand::Tick(countdown) => self.on_tick(countdown),
            MatchCommand::Advance { reply } => {
                let advance = self.advance();
                let _ = reply.send((advance, self.controller.snapshot()));
            }
            MatchCommand::AutoAdvance { id, round } => {
                if self.pending_advance.as_ref().map(Countdown::id) != Some(id) {
                    tracing::debug!(match_id = %self.id, round, "discarding stale auto-advance");
                    return;
                }
                tracing::debug!(match_id = %self.id, round, "advancing after timeout");
                self.advance();
            }
            MatchCommand::End { reply } => {
                self.pending_advance = None;
                let summary = self.controller.end_match();
                if let Some(summary) = &summary {
                    MATCHES_TOTAL.with_label_values(&["ended"]).inc();
                    self.publish_match_complete(summary);
                }
                let _ = reply.send((summary, self.controller.snapshot()));
            }
            MatchCommand::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
        }
    }

    fn advance(&mut self) -> Advance {
        self.pending_advance = None;
        let advance = self.controller.advance_or_complete();
        match &advance {
            Advance::NextRound { .. } => self.publish_round_started(),
            Advance::Complete(summary) => {
                MATCHES_TOTAL.with_label_values(&["completed"]).inc();
                self.publish_match_complete(summary);
            }
            Advance::Ignored => {}
        }
        advance
    }

    /// Sends `AutoAdvance` to this match once the timeout feedback is over.
    fn schedule_auto_advance(&mut self, round: u32) {
        let id = self.next_auto_advance;
        self.next_auto_advance += 1;

        let commands = self.commands.clone();
        let delay = RoundOutcome::TimedOut.feedback_delay();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = commands.upgrade() {
                let _ = commands.send(MatchCommand::AutoAdvance { id, round });
            }
        });

        self.pending_advance = Some(Countdown::new(id, Some(task.abort_handle())));
    }

    fn on_tick(&mut self, countdown: CountdownId) {
        match self.controller.on_tick(countdown) {
            TickOutcome::Stale => {}
            TickOutcome::Ticking { round, remaining } => {
                self.publish(MatchEvent::TimerTick(TimerTick {
                    match_id: self.id.to_string(),
                    round,
                    remaining_seconds: remaining,
                    elapsed_seconds: ROUND_TIME_SECONDS - remaining,
                    total_seconds: ROUND_TIME_SECONDS,
                    timestamp: Utc::now(),
                }));
            }
            TickOutcome::Expired {
                round,
                correct_answer,
            } => {
                ROUNDS_TIMED_OUT_TOTAL.inc();
                tracing::info!(match_id = %self.id, round, "round timed out");
                self.publish(MatchEvent::TimeExpired(TimeExpired {
                    match_id: self.id.to_string(),
                    round,
                    correct_answer,
                    timestamp: Utc::now(),
                    message: "Time's up!".to_string(),
                }));
                self.publish_round_resolved(RoundOutcome::TimedOut, correct_answer);
                self.schedule_auto_advance(round);
            }
        }
    }

    fn publish_round_started(&self) {
        let (Some(round), Some(question)) = (
            self.controller.current_round(),
            self.controller.current_question(),
        ) else {
            return;
        };
        self.publish(MatchEvent::RoundStarted(RoundStarted {
            match_id: self.id.to_string(),
            round,
            question: QuestionView::from(question),
            time_remaining: self.controller.time_remaining().unwrap_or(ROUND_TIME_SECONDS),
            timestamp: Utc::now(),
        }));
    }

    fn publish_round_resolved(&self, outcome: RoundOutcome, correct_answer: u32) {
        let snapshot = self.controller.snapshot();
        self.publish(MatchEvent::RoundResolved(RoundResolved {
            match_id: self.id.to_string(),
            round: self.controller.current_round().unwrap_or(snapshot.rounds_played),
            outcome,
            correct_answer,
            score: snapshot.score,
            timestamp: Utc::now(),
        }));
    }

    fn publish_match_complete(&self, summary: &MatchSummary) {
        self.publish(MatchEvent::MatchComplete(MatchComplete {
            match_id: self.id.to_string(),
            summary: summary.clone(),
            timestamp: Utc::now(),
        }));
    }

    fn publish(&self, event: MatchEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
