use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use super::matches::{parse_match_id, MatchApiError};
use crate::{metrics::SSE_CONNECTIONS_ACTIVE, models::timer::MatchEvent, services::AppState};

/// SSE endpoint for match events
/// GET /api/v1/matches/{id}/stream
pub async fn match_stream(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> Result<impl IntoResponse, MatchApiError> {
    let id = parse_match_id(&match_id)?;
    let events = state.matches.subscribe(id).await?;

    tracing::info!("Client connected to SSE stream: match={}", match_id);

    Ok(Sse::new(create_event_stream(match_id, events)).keep_alive(KeepAlive::default()))
}

/// Keeps the connection gauge in step with the stream's lifetime.
struct ConnectionGuard {
    match_id: String,
}

impl ConnectionGuard {
    fn new(match_id: String) -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self { match_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
        tracing::info!("SSE stream closed: match={}", self.match_id);
    }
}

/// Forwards match events until the match completes or its task goes away.
fn create_event_stream(
    match_id: String,
    events: broadcast::Receiver<MatchEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = ConnectionGuard::new(match_id);

    stream::unfold(
        (guard, events, false),
        |(guard, mut events, finished)| async move {
            if finished {
                return None;
            }

            loop {
                match events.recv().await {
                    Ok(match_event) => {
                        let event = Event::default()
                            .event(match_event.event_name())
                            .data(match_event.to_sse_data());
                        let finished = match_event.is_terminal();
                        return Some((Ok(event), (guard, events, finished)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "SSE subscriber lagging: match={}, skipped={}",
                            guard.match_id,
                            skipped
                        );
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    )
}
