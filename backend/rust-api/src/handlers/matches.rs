use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    extractors::AppJson,
    models::{
        answer::{SubmitAnswerRequest, SubmitAnswerResponse},
        matches::{MatchResponse, MatchSnapshot, PhaseKind, StartMatchRequest},
    },
    services::{
        match_controller::{Advance, Submission, POINTS_PER_CORRECT},
        match_service::GameError,
        AppState,
    },
};

#[derive(Debug)]
pub enum MatchApiError {
    NotFound(String),
    Conflict(String),
    Gone(String),
}

impl From<GameError> for MatchApiError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::MatchNotFound(_) => MatchApiError::NotFound("Match not found".to_string()),
            GameError::MatchClosed(_) => MatchApiError::Gone(err.to_string()),
        }
    }
}

impl IntoResponse for MatchApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            MatchApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            MatchApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            MatchApiError::Gone(message) => (StatusCode::GONE, message),
        };
        let json_response = serde_json::json!({
            "message": message,
            "status": status.as_u16()
        });
        (status, Json(json_response)).into_response()
    }
}

/// Match ids are UUIDs; anything else cannot name a match.
pub(crate) fn parse_match_id(raw: &str) -> Result<Uuid, MatchApiError> {
    Uuid::parse_str(raw).map_err(|_| MatchApiError::NotFound("Match not found".to_string()))
}

/// POST /api/v1/matches
pub async fn create_match(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<StartMatchRequest>,
) -> Result<impl IntoResponse, MatchApiError> {
    let (id, snapshot) = state.matches.create_match(req.tier).await?;
    tracing::info!(match_id = %id, tier = %req.tier, "match started");

    Ok((
        StatusCode::CREATED,
        Json(MatchResponse::new(id.to_string(), snapshot)),
    ))
}

/// GET /api/v1/matches/{id}
pub async fn get_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> Result<impl IntoResponse, MatchApiError> {
    let id = parse_match_id(&match_id)?;
    let snapshot = state.matches.snapshot(id).await?;
    Ok(Json(MatchResponse::new(match_id, snapshot)))
}

/// POST /api/v1/matches/{id}/answers
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, MatchApiError> {
    let id = parse_match_id(&match_id)?;
    tracing::debug!(match_id = %id, answer = req.answer, "answer submitted");

    let (submission, snapshot) = state.matches.submit_answer(id, req.answer).await?;
    Ok(Json(answer_response(&submission, &snapshot)))
}

/// POST /api/v1/matches/{id}/advance
pub async fn advance_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> Result<impl IntoResponse, MatchApiError> {
    let id = parse_match_id(&match_id)?;
    let (advance, snapshot) = state.matches.advance(id).await?;

    match advance {
        Advance::NextRound { .. } | Advance::Complete(_) => {
            Ok(Json(MatchResponse::new(match_id, snapshot)))
        }
        Advance::Ignored => Err(advance_conflict(snapshot.phase)),
    }
}

fn advance_conflict(phase: PhaseKind) -> MatchApiError {
    let message = match phase {
        PhaseKind::Playing => "Current round is not resolved yet",
        PhaseKind::Complete => "Match is already complete",
        PhaseKind::Idle => "Match has not started",
    };
    MatchApiError::Conflict(message.to_string())
}

/// POST /api/v1/matches/{id}/end
pub async fn end_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> Result<axum::response::Response, MatchApiError> {
    let id = parse_match_id(&match_id)?;
    let (summary, snapshot) = state.matches.end_match(id).await?;

    match summary {
        Some(_) => Ok(Json(MatchResponse::new(match_id, snapshot)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /api/v1/matches/{id}/restart
pub async fn restart_match(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
    AppJson(req): AppJson<StartMatchRequest>,
) -> Result<impl IntoResponse, MatchApiError> {
    let id = parse_match_id(&match_id)?;
    let snapshot = state.matches.start_match(id, req.tier).await?;
    tracing::info!(match_id = %id, tier = %req.tier, "match restarted");

    Ok(Json(MatchResponse::new(match_id, snapshot)))
}

fn answer_response(submission: &Submission, snapshot: &MatchSnapshot) -> SubmitAnswerResponse {
    match *submission {
        Submission::Scored {
            outcome,
            correct_answer,
        } => SubmitAnswerResponse {
            accepted: true,
            correct: outcome.is_correct(),
            outcome: Some(outcome),
            correct_answer: Some(correct_answer),
            score_awarded: if outcome.is_correct() {
                POINTS_PER_CORRECT
            } else {
                0
            },
            total_score: snapshot.score,
            correct_count: snapshot.correct_count,
            rounds_played: snapshot.rounds_played,
            feedback: Some(outcome.feedback(correct_answer)),
            feedback_delay_ms: outcome.feedback_delay().as_millis() as u64,
        },
        // A late or duplicate answer still reports how the round ended.
        Submission::Ignored => {
            let round = snapshot.current_round.as_ref();
            SubmitAnswerResponse {
                accepted: false,
                correct: false,
                outcome: round.and_then(|r| r.outcome),
                correct_answer: round.and_then(|r| r.correct_answer),
                score_awarded: 0,
                total_score: snapshot.score,
                correct_count: snapshot.correct_count,
                rounds_played: snapshot.rounds_played,
                feedback: None,
                feedback_delay_ms: 0,
            }
        }
    }
}
