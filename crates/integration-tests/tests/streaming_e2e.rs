//! End-to-end streaming through the HTTP router with real `sh` children.

mod common;

use axum::http::StatusCode;
use common::{generate, spawn_app, stream, wait_for_terminal};

#[tokio::test]
async fn output_arrives_in_order_then_job_completes() {
    let app = spawn_app("printf 'Chapter 1\\n'; sleep 0.05; printf 'It was '; sleep 0.05; printf 'a dark night.'");

    let id = generate(&app, "generate-chapter").await;
    let text = stream(&app, &id).await;
    assert_eq!(text, "Chapter 1\nIt was a dark night.");

    let job = wait_for_terminal(&app, &id).await;
    assert_eq!(job["state"], "completed");
    assert_eq!(job["exitReason"], "normal");
    assert!(job["startedAt"].is_i64());
    assert!(job["finishedAt"].is_i64());
}

#[tokio::test]
async fn request_is_delivered_on_stdin() {
    let app = spawn_app("cat");

    let id = generate(&app, "suggest-titles").await;
    let text = stream(&app, &id).await;

    let echoed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(echoed["action"], "suggest-titles");
    assert_eq!(echoed["context"]["projectId"], "p1");
}

#[tokio::test]
async fn multibyte_character_split_across_writes_is_preserved() {
    // U+270D written as two separate writes: E2 9C | 8D
    let app = spawn_app("printf '\\342\\234'; sleep 0.1; printf '\\215 done'");

    let id = generate(&app, "generate-chapter").await;
    assert_eq!(stream(&app, &id).await, "\u{270D} done");
}

#[tokio::test]
async fn nonzero_exit_fails_with_process_error_after_partial_output() {
    let app = spawn_app("printf 'partial'; echo 'model overloaded' >&2; exit 3");

    let id = generate(&app, "generate-chapter").await;
    let text = stream(&app, &id).await;
    assert_eq!(text, "partial");
    assert!(!text.contains("overloaded"));

    let job = wait_for_terminal(&app, &id).await;
    assert_eq!(job["state"], "failed");
    assert_eq!(job["exitReason"], "process-error");
}

#[tokio::test]
async fn several_subscribers_see_the_same_output() {
    let app = spawn_app("sleep 0.1; printf 'one '; sleep 0.05; printf 'two'");
    let id = generate(&app, "generate-chapter").await;

    let (a, b) = tokio::join!(stream(&app, &id), stream(&app, &id));
    assert_eq!(a, "one two");
    assert_eq!(b, "one two");
}

#[tokio::test]
async fn stream_after_completion_replays_buffered_output() {
    let app = spawn_app("printf 'a'; printf 'b'; printf 'c'");
    let id = generate(&app, "suggest-titles").await;
    wait_for_terminal(&app, &id).await;

    assert_eq!(stream(&app, &id).await, "abc");
}

#[tokio::test]
async fn missing_program_marks_job_failed() {
    let app = common::spawn_app_with(
        inkwell_infra_system::CliCommandConfig::new("inkwell-no-such-tool", vec![]),
        common::test_config(),
    );

    let id = generate(&app, "generate-chapter").await;
    assert_eq!(stream(&app, &id).await, "");

    let job = wait_for_terminal(&app, &id).await;
    assert_eq!(job["state"], "failed");
    assert_eq!(job["exitReason"], "process-error");
}

#[tokio::test]
async fn stream_for_unknown_id_is_404() {
    let app = spawn_app("printf x");
    let response = common::get(&app, "/api/generation/stream/does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
