//! Lifecycle laws end to end: timeout, cancel, capacity, identity, shutdown.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use axum::http::StatusCode;
use common::{
    body_json, generate, post_json, scratch_path, sh, snapshot, spawn_app, spawn_app_with,
    spawn_app_with_cli_auth, stream, test_config, wait_for_terminal,
};
use inkwell_core::OrchestratorConfig;
use serde_json::json;

#[tokio::test]
async fn job_exceeding_timeout_fails_with_timeout() {
    let app = spawn_app_with(
        sh("printf 'thinking'; sleep 30"),
        OrchestratorConfig {
            job_timeout: Duration::from_millis(300),
            ..test_config()
        },
    );

    let id = generate(&app, "generate-chapter").await;
    let text = tokio::time::timeout(Duration::from_secs(5), stream(&app, &id))
        .await
        .expect("stream did not end after timeout");
    assert_eq!(text, "thinking");

    let job = wait_for_terminal(&app, &id).await;
    assert_eq!(job["state"], "failed");
    assert_eq!(job["exitReason"], "timeout");
    assert_eq!(app.service.active_jobs().await, 0);
}

#[tokio::test]
async fn cancel_mid_stream_kills_process_and_ends_stream() {
    let marker = scratch_path("cancel-marker");
    let _ = std::fs::remove_file(&marker);
    let app = spawn_app(&format!(
        "printf 'start '; sleep 1; touch '{}'; printf 'end'",
        marker.display()
    ));

    let id = generate(&app, "generate-chapter").await;
    let reader = {
        let app = app.clone();
        let id = id.clone();
        tokio::spawn(async move { stream(&app, &id).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = post_json(&app, &format!("/api/generation/generations/{id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["state"], "cancelled");

    let text = tokio::time::timeout(Duration::from_secs(2), reader)
        .await
        .expect("stream did not end after cancel")
        .unwrap();
    assert!(!text.contains("end"));

    // The process group is gone, so the script never reaches its marker
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!marker.exists());

    let job = snapshot(&app, &id).await;
    assert_eq!(job["state"], "cancelled");
    assert_eq!(job["exitReason"], "cancelled");

    // Repeated cancel is a no-op
    let again = post_json(&app, &format!("/api/generation/generations/{id}/cancel"), json!({})).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body_json(again).await["state"], "cancelled");
}

#[tokio::test]
async fn cancel_after_completion_keeps_completed_state() {
    let app = spawn_app("printf done");
    let id = generate(&app, "suggest-titles").await;
    wait_for_terminal(&app, &id).await;

    let response = post_json(&app, &format!("/api/generation/generations/{id}/cancel"), json!({})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["state"], "completed");
}

#[tokio::test]
async fn active_jobs_never_exceed_capacity() {
    let app = spawn_app_with(
        sh("sleep 30"),
        OrchestratorConfig {
            max_active_jobs: 2,
            ..test_config()
        },
    );

    let first = generate(&app, "generate-chapter").await;
    generate(&app, "generate-chapter").await;

    let response = post_json(&app, "/api/generation/generate", json!({"action": "generate-chapter"})).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(app.service.active_jobs().await, 2);

    post_json(&app, &format!("/api/generation/generations/{first}/cancel"), json!({})).await;
    generate(&app, "generate-chapter").await;
    assert_eq!(app.service.active_jobs().await, 2);

    app.service.shutdown(Duration::from_secs(2)).await;
    assert_eq!(app.service.active_jobs().await, 0);
}

#[tokio::test]
async fn concurrent_submissions_get_unique_ids() {
    let app = spawn_app("printf ok");

    let mut submissions = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let app = app.clone();
        submissions.spawn(async move { generate(&app, "suggest-titles").await });
    }
    let mut ids = Vec::new();
    while let Some(id) = submissions.join_next().await {
        ids.push(id.unwrap());
    }

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    for id in &ids {
        assert_eq!(wait_for_terminal(&app, id).await["state"], "completed");
    }
}

#[tokio::test]
async fn shutdown_cancels_every_running_job() {
    let app = spawn_app("printf 'working'; sleep 30");
    let a = generate(&app, "generate-chapter").await;
    let b = generate(&app, "suggest-titles").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stopped = app.service.shutdown(Duration::from_secs(2)).await;
    assert_eq!(stopped, 2);

    for id in [a, b] {
        let job = snapshot(&app, &id).await;
        assert_eq!(job["state"], "cancelled");
        assert_eq!(job["exitReason"], "cancelled");
    }
}

#[tokio::test]
async fn cli_auth_check_gates_generation() {
    let app = spawn_app_with_cli_auth(
        sh("printf never").with_auth_check_args(vec!["-c".to_string(), "exit 1".to_string()]),
    );

    let response = post_json(&app, "/api/generation/generate", json!({"action": "generate-chapter"})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let status = body_json(common::get(&app, "/api/generation/status").await).await;
    assert_eq!(status["authenticated"], false);
    assert_eq!(status["canUseAI"], false);
}

#[tokio::test]
async fn cli_auth_check_success_allows_generation() {
    let app = spawn_app_with_cli_auth(
        sh("printf hello").with_auth_check_args(vec!["-c".to_string(), "exit 0".to_string()]),
    );

    let id = generate(&app, "generate-chapter").await;
    assert_eq!(stream(&app, &id).await, "hello");
}
