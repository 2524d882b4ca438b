#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use quickmath_api::{
    config::Config,
    create_router,
    services::{stats_service::StatsStore, AppState},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const METRICS_USER: &str = "metrics:secret";

pub async fn create_test_app() -> Router {
    create_test_app_with_tick(1000).await.0
}

/// Builds a router around fresh in-memory state. The state is returned too so
/// tests can inspect the match registry directly.
pub async fn create_test_app_with_tick(tick_interval_ms: u64) -> (Router, Arc<AppState>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config {
        tick_interval_ms,
        metrics_auth: METRICS_USER.to_string(),
        ..Config::default()
    };

    let app_state = Arc::new(
        AppState::new(config)
            .await
            .expect("Failed to initialize test app state"),
    );

    (create_router(app_state.clone()), app_state)
}

/// Builds a router whose finished matches and stats requests go to `store`.
pub fn create_test_app_with_store(store: Arc<dyn StatsStore>) -> Router {
    let config = Config {
        metrics_auth: METRICS_USER.to_string(),
        ..Config::default()
    };
    let app_state =
        Arc::new(AppState::with_store(config, store).expect("Failed to initialize test app state"));
    create_router(app_state)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            panic!(
                "non-JSON body for {} {}: {}",
                method,
                uri,
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, json)
}

/// Creates a match and returns its id together with the creation response.
pub async fn start_match(app: &Router, tier: u8) -> (String, Value) {
    let (status, json) = send(
        app,
        "POST",
        "/api/v1/matches",
        Some(serde_json::json!({ "tier": tier })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", json);
    let id = json["matchId"].as_str().unwrap().to_string();
    (id, json)
}

/// Works out the answer from the displayed operands.
pub fn solve(round: &Value) -> i64 {
    let question = &round["question"];
    let lhs = question["operands"][0].as_i64().unwrap();
    let rhs = question["operands"][1].as_i64().unwrap();
    match question["operator"].as_str().unwrap() {
        "add" => lhs + rhs,
        "subtract" => lhs - rhs,
        other => panic!("unexpected operator {}", other),
    }
}

/// The option that is not the answer.
pub fn wrong_option(round: &Value) -> i64 {
    let answer = solve(round);
    round["question"]["options"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .find(|v| *v != answer)
        .unwrap()
}

/// Polls the high score until it reaches `expected`; stats are saved in the background.
pub async fn wait_for_high_score(app: &Router, expected: u64) -> Value {
    let mut last = Value::Null;
    for _ in 0..100 {
        let (_, json) = send(app, "GET", "/api/high-score", None).await;
        if json["highScore"].as_u64() == Some(expected) {
            return json;
        }
        last = json;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("high score never reached {}: {}", expected, last);
}
