use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use http_body_util::BodyExt;
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

#[tokio::test]
async fn test_create_match_opens_first_round_without_answer() {
    let app = common::create_test_app().await;

    let (id, json) = common::start_match(&app, 1).await;

    assert!(Uuid::parse_str(&id).is_ok());
    assert_eq!(json["phase"], "playing");
    assert_eq!(json["tier"], 1);
    assert_eq!(json["score"], 0);
    assert_eq!(json["roundsPlayed"], 1);

    let round = &json["currentRound"];
    assert_eq!(round["number"], 1);
    assert_eq!(round["timeRemaining"], 5);
    assert!(round["outcome"].is_null());
    assert!(round["correctAnswer"].is_null());
    assert!(round["question"].get("correctAnswer").is_none());
    assert!(round["question"].get("correctIndex").is_none());

    let options = round["question"]["options"].as_array().unwrap();
    assert_eq!(options.len(), 2);
    assert!(options.contains(&json!(common::solve(round))));
}

#[tokio::test]
async fn test_tier_defaults_to_basic_and_unknown_tier_is_rejected() {
    let app = common::create_test_app().await;

    let (status, json) = common::send(&app, "POST", "/api/v1/matches", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["tier"], 1);

    let (status, json) =
        common::send(&app, "POST", "/api/v1/matches", Some(json!({ "tier": 3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_full_match_of_correct_answers_scores_one_hundred() {
    let app = common::create_test_app().await;
    let (id, mut json) = common::start_match(&app, 2).await;

    for round in 1..=10 {
        let answer = common::solve(&json["currentRound"]);
        let (status, result) = common::send(
            &app,
            "POST",
            &format!("/api/v1/matches/{}/answers", id),
            Some(json!({ "answer": answer })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["accepted"], true);
        assert_eq!(result["correct"], true);
        assert_eq!(result["outcome"], "correct");
        assert_eq!(result["scoreAwarded"], 10);
        assert_eq!(result["totalScore"], round * 10);
        assert_eq!(result["feedback"], "Great Job! You got it right!");
        assert_eq!(result["feedbackDelayMs"], 2500);

        let (status, next) = common::send(
            &app,
            "POST",
            &format!("/api/v1/matches/{}/advance", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json = next;

        if round < 10 {
            assert_eq!(json["phase"], "playing");
            assert_eq!(json["currentRound"]["number"], round + 1);
            assert_eq!(json["roundsPlayed"], round + 1);
        }
    }

    assert_eq!(json["phase"], "complete");
    assert!(json["currentRound"].is_null());
    assert_eq!(json["summary"]["score"], 100);
    assert_eq!(json["summary"]["correctCount"], 10);
    assert_eq!(json["summary"]["roundsPlayed"], 10);
    assert_eq!(json["summary"]["accuracyPercent"], 100);
    assert_eq!(json["summary"]["tier"], 2);
    assert_eq!(json["message"], "You got 10 out of 10 questions correct!");
    assert!(json["formattedTime"].is_string());

    common::wait_for_high_score(&app, 100).await;
}

#[tokio::test]
async fn test_wrong_answer_reveals_correct_answer() {
    let app = common::create_test_app().await;
    let (id, json) = common::start_match(&app, 1).await;
    let round = &json["currentRound"];
    let expected = common::solve(round);

    let (status, result) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/answers", id),
        Some(json!({ "answer": common::wrong_option(round) })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["correct"], false);
    assert_eq!(result["outcome"], "incorrect");
    assert_eq!(result["correctAnswer"], expected);
    assert_eq!(result["scoreAwarded"], 0);
    assert_eq!(
        result["feedback"],
        format!("Try Again! The correct answer was: {}", expected)
    );

    // A second answer for the same round is not scored again.
    let (_, again) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/answers", id),
        Some(json!({ "answer": expected })),
    )
    .await;
    assert_eq!(again["accepted"], false);
    assert_eq!(again["outcome"], "incorrect");
    assert_eq!(again["totalScore"], 0);
}

#[tokio::test]
async fn test_advance_while_round_running_conflicts() {
    let app = common::create_test_app().await;
    let (id, _) = common::start_match(&app, 1).await;

    let (status, json) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/advance", id),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["status"], 409);
    assert_eq!(json["message"], "Current round is not resolved yet");

    let (_, snapshot) = common::send(&app, "GET", &format!("/api/v1/matches/{}", id), None).await;
    assert_eq!(snapshot["currentRound"]["number"], 1);
}

#[tokio::test]
async fn test_advance_after_match_ended_reports_completion() {
    let app = common::create_test_app().await;
    let (id, _) = common::start_match(&app, 1).await;

    let (status, _) =
        common::send(&app, "POST", &format!("/api/v1/matches/{}/end", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/advance", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Match is already complete");
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_round_times_out() {
    let (app, _) = common::create_test_app_with_tick(1000).await;
    let (id, _) = common::start_match(&app, 1).await;

    tokio::time::sleep(Duration::from_millis(5500)).await;

    let (status, json) = common::send(&app, "GET", &format!("/api/v1/matches/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let round = &json["currentRound"];
    assert_eq!(round["outcome"], "timed_out");
    assert!(round["timeRemaining"].is_null());
    assert_eq!(round["correctAnswer"], common::solve(round));
    assert_eq!(json["score"], 0);

    let (_, late) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/answers", id),
        Some(json!({ "answer": common::solve(round) })),
    )
    .await;
    assert_eq!(late["accepted"], false);
    assert_eq!(late["outcome"], "timed_out");

    let (status, next) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/advance", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next["currentRound"]["number"], 2);
    assert_eq!(next["currentRound"]["timeRemaining"], 5);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_round_advances_on_its_own() {
    let (app, _) = common::create_test_app_with_tick(1000).await;
    let (id, _) = common::start_match(&app, 1).await;

    // 5 s countdown plus 2 s of timeout feedback.
    tokio::time::sleep(Duration::from_millis(7500)).await;

    let (status, json) = common::send(&app, "GET", &format!("/api/v1/matches/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["currentRound"]["number"], 2);
    assert!(json["currentRound"]["outcome"].is_null());
    assert_eq!(json["roundsPlayed"], 2);
    assert_eq!(json["score"], 0);
}

#[tokio::test]
async fn test_end_match_early_returns_summary_then_no_content() {
    let app = common::create_test_app().await;
    let (id, json) = common::start_match(&app, 1).await;
    let answer = common::solve(&json["currentRound"]);
    common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/answers", id),
        Some(json!({ "answer": answer })),
    )
    .await;

    let (status, json) =
        common::send(&app, "POST", &format!("/api/v1/matches/{}/end", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["phase"], "complete");
    assert_eq!(json["summary"]["score"], 10);
    assert_eq!(json["summary"]["roundsPlayed"], 1);
    assert_eq!(json["message"], "You got 1 out of 1 questions correct!");

    let (status, json) =
        common::send(&app, "POST", &format!("/api/v1/matches/{}/end", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(json.is_null());

    common::wait_for_high_score(&app, 10).await;
}

#[tokio::test]
async fn test_restart_resets_counters_and_switches_tier() {
    let app = common::create_test_app().await;
    let (id, json) = common::start_match(&app, 1).await;
    let answer = common::solve(&json["currentRound"]);
    common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/answers", id),
        Some(json!({ "answer": answer })),
    )
    .await;

    let (status, json) = common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/restart", id),
        Some(json!({ "tier": 2 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["matchId"], id);
    assert_eq!(json["phase"], "playing");
    assert_eq!(json["tier"], 2);
    assert_eq!(json["score"], 0);
    assert_eq!(json["correctCount"], 0);
    assert_eq!(json["roundsPlayed"], 1);
    assert_eq!(json["currentRound"]["number"], 1);
}

#[tokio::test]
async fn test_unknown_and_malformed_match_ids_are_not_found() {
    let app = common::create_test_app().await;

    let (status, json) = common::send(
        &app,
        "GET",
        &format!("/api/v1/matches/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Match not found");

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/v1/matches/not-a-match/answers",
        Some(json!({ "answer": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_match_stream_delivers_round_events() {
    let (app, state) = common::create_test_app_with_tick(60_000).await;
    let (id, json) = common::start_match(&app, 1).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/matches/{}/stream", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let answer = common::solve(&json["currentRound"]);
    common::send(
        &app,
        "POST",
        &format!("/api/v1/matches/{}/answers", id),
        Some(json!({ "answer": answer })),
    )
    .await;

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("no SSE frame")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();

    assert!(text.contains("event: round-resolved"), "got {}", text);
    assert!(text.contains("\"outcome\":\"correct\""), "got {}", text);

    assert_eq!(state.matches.active_count().await, 1);
}

#[tokio::test]
async fn test_stream_for_unknown_match_is_not_found() {
    let app = common::create_test_app().await;

    let (status, _) = common::send(
        &app,
        "GET",
        &format!("/api/v1/matches/{}/stream", Uuid::new_v4()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_active_matches() {
    let app = common::create_test_app().await;
    common::start_match(&app, 1).await;

    let (status, json) = common::send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["activeMatches"], 1);
}

#[tokio::test]
async fn test_metrics_require_basic_auth() {
    let app = common::create_test_app().await;
    common::start_match(&app, 1).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode(common::METRICS_USER);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("matches_active"));
}

#[tokio::test]
async fn test_responses_carry_trace_id() {
    let app = common::create_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-trace-id").unwrap(), "trace-42");
}
