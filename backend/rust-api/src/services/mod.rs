use crate::config::Config;
use std::sync::Arc;

use match_service::MatchService;
use stats_service::{MemStatsStore, StatsStore, StoreSink};

pub struct AppState {
    pub config: Config,
    pub matches: Arc<MatchService>,
    pub stats: Arc<dyn StatsStore>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        tracing::info!("Using in-memory stats store");
        Self::with_store(config, Arc::new(MemStatsStore::new()))
    }

    /// Builds the state around an existing stats store. Finished matches are
    /// forwarded to the same store the stats endpoints read from.
    pub fn with_store(config: Config, stats: Arc<dyn StatsStore>) -> anyhow::Result<Self> {
        if config.tick_interval_ms == 0 {
            anyhow::bail!("tick interval must be positive");
        }

        let sink = Arc::new(StoreSink::new(Arc::clone(&stats)));
        let matches = Arc::new(MatchService::new(
            sink,
            config.tick_interval(),
            config.match_idle_ttl(),
        ));

        tracing::info!(
            tick_interval_ms = config.tick_interval_ms,
            idle_ttl_seconds = config.match_idle_ttl_seconds,
            "Match service ready"
        );

        Ok(Self {
            config,
            matches,
            stats,
        })
    }
}

pub mod countdown;
pub mod match_controller;
pub mod match_service;
pub mod question_generator;
pub mod stats_service;
