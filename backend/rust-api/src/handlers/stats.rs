use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    metrics::track_store_operation,
    models::{HighScoreResponse, NewGameStats},
    services::{stats_service::StatsError, AppState},
};

#[derive(Debug)]
pub enum StatsApiError {
    InvalidData,
    SaveFailed,
    HighScoreFailed,
}

impl IntoResponse for StatsApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            StatsApiError::InvalidData => (StatusCode::BAD_REQUEST, "Invalid game stats data"),
            StatsApiError::SaveFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save game stats")
            }
            StatsApiError::HighScoreFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to get high score")
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// POST /api/game-stats
pub async fn save_game_stats(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewGameStats>, JsonRejection>,
) -> Result<impl IntoResponse, StatsApiError> {
    let Json(stats) = payload.map_err(|rejection| {
        tracing::warn!("Rejected game stats body: {}", rejection.body_text());
        StatsApiError::InvalidData
    })?;

    match track_store_operation("save", state.stats.save_game_stats(stats)).await {
        Ok(record) => Ok(Json(record)),
        Err(StatsError::Invalid(e)) => {
            tracing::warn!("Invalid game stats: {}", e);
            Err(StatsApiError::InvalidData)
        }
        Err(e) => {
            tracing::error!("Failed to save game stats: {}", e);
            Err(StatsApiError::SaveFailed)
        }
    }
}

/// GET /api/high-score
pub async fn get_high_score(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, StatsApiError> {
    let high_score = track_store_operation("high_score", state.stats.get_high_score())
        .await
        .map_err(|e| {
            tracing::error!("Failed to get high score: {}", e);
            StatsApiError::HighScoreFailed
        })?;

    Ok(Json(HighScoreResponse { high_score }))
}
