use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use validator::Validate;

use super::match_controller::StatsSink;
use crate::metrics::{track_store_operation, STATS_SAVES_TOTAL};
use crate::models::{GameStats, MatchSummary, NewGameStats};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid game stats: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("stats store unavailable: {0}")]
    Unavailable(String),
}

/// Storage for finished-match statistics.
#[async_trait]
pub trait StatsStore: Send + Sync {
    async fn save_game_stats(&self, stats: NewGameStats) -> Result<GameStats, StatsError>;

    /// Highest score stored so far, 0 when nothing was stored.
    async fn get_high_score(&self) -> Result<u32, StatsError>;

    /// Most recent records first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<GameStats>, StatsError>;
}

#[derive(Default)]
struct MemInner {
    records: Vec<GameStats>,
    next_id: u64,
}

/// Process-local store. Ids start at 1 and increase by one per record.
#[derive(Default)]
pub struct MemStatsStore {
    inner: RwLock<MemInner>,
}

impl MemStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for MemStatsStore {
    async fn save_game_stats(&self, stats: NewGameStats) -> Result<GameStats, StatsError> {
        stats.validate()?;

        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let record = GameStats {
            id: inner.next_id,
            score: stats.score,
            correct_answers: stats.correct_answers,
            total_questions: stats.total_questions,
            created_at: Utc::now(),
        };
        inner.records.push(record.clone());

        tracing::debug!(id = record.id, score = record.score, "game stats stored");
        Ok(record)
    }

    async fn get_high_score(&self) -> Result<u32, StatsError> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().map(|r| r.score).max().unwrap_or(0))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<GameStats>, StatsError> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().rev().take(limit).cloned().collect())
    }
}

/// Forwards finished matches from a controller to a [`StatsStore`] on a
/// background task. Failures are logged and counted, never surfaced to the
/// match outcome.
pub struct StoreSink {
    store: Arc<dyn StatsStore>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn StatsStore>) -> Self {
        Self { store }
    }
}

impl StatsSink for StoreSink {
    fn persist(&self, summary: &MatchSummary) {
        let stats = summary.to_game_stats();
        let store = Arc::clone(&self.store);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            STATS_SAVES_TOTAL.with_label_values(&["failed"]).inc();
            tracing::warn!(score = stats.score, "stats not saved: no async runtime available");
            return;
        };

        runtime.spawn(async move {
            match track_store_operation("save", store.save_game_stats(stats)).await {
                Ok(record) => {
                    STATS_SAVES_TOTAL.with_label_values(&["saved"]).inc();
                    tracing::info!(id = record.id, score = record.score, "match stats saved");
                }
                Err(e) => {
                    STATS_SAVES_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::warn!("stats not saved: {}", e);
                }
            }
        });
    }
}
