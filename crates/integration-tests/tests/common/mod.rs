#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use inkwell_api_http::{build_router, AppState, GatewayConfig, JsonShapeValidator};
use inkwell_core::application::{GenerationPorts, GenerationService};
use inkwell_core::port::auth_probe::mocks::StaticAuthProbe;
use inkwell_core::port::auth_probe::AuthProbe;
use inkwell_core::port::id_provider::UuidProvider;
use inkwell_core::port::time_provider::SystemTimeProvider;
use inkwell_core::OrchestratorConfig;
use inkwell_infra_system::{CliAuthProbe, CliCommandConfig, CliProcessSpawner};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Real `sh` children behind the full router
#[derive(Clone)]
pub struct E2eApp {
    pub router: Router,
    pub service: Arc<GenerationService>,
}

/// `sh -c <script>` as the generation tool
pub fn sh(script: &str) -> CliCommandConfig {
    CliCommandConfig::new("sh", vec!["-c".to_string(), script.to_string()])
}

pub fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        kill_grace: Duration::from_millis(200),
        ..OrchestratorConfig::default()
    }
}

pub fn spawn_app(script: &str) -> E2eApp {
    spawn_app_with(sh(script), test_config())
}

pub fn spawn_app_with(command: CliCommandConfig, config: OrchestratorConfig) -> E2eApp {
    build(command, Arc::new(StaticAuthProbe::new(true)), config)
}

/// Authentication is decided by running `command`'s auth check
pub fn spawn_app_with_cli_auth(command: CliCommandConfig) -> E2eApp {
    let probe = Arc::new(CliAuthProbe::new(command.clone()));
    build(command, probe, test_config())
}

fn build(
    command: CliCommandConfig,
    auth_probe: Arc<dyn AuthProbe>,
    config: OrchestratorConfig,
) -> E2eApp {
    let service = Arc::new(GenerationService::new(
        &config,
        GenerationPorts {
            validator: Arc::new(JsonShapeValidator),
            spawner: Arc::new(CliProcessSpawner::new(command)),
            auth_probe,
            id_provider: Arc::new(UuidProvider),
            time_provider: Arc::new(SystemTimeProvider),
        },
    ));
    let router = build_router(AppState::new(service.clone(), GatewayConfig::default()));
    E2eApp { router, service }
}

/// A path no other test uses
pub fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("inkwell-e2e-{}-{}", std::process::id(), name))
}

pub async fn get(app: &E2eApp, uri: &str) -> Response<Body> {
    app.router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &E2eApp, uri: &str, body: Value) -> Response<Body> {
    app.router
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Submit a generation and return its id
pub async fn generate(app: &E2eApp, action: &str) -> String {
    let response = post_json(
        app,
        "/api/generation/generate",
        json!({"action": action, "context": {"projectId": "p1"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string()
}

pub async fn stream(app: &E2eApp, id: &str) -> String {
    let response = get(app, &format!("/api/generation/stream/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

pub async fn snapshot(app: &E2eApp, id: &str) -> Value {
    let response = get(app, &format!("/api/generation/generations/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

/// Poll until the job is completed, failed or cancelled
pub async fn wait_for_terminal(app: &E2eApp, id: &str) -> Value {
    for _ in 0..500 {
        let job = snapshot(app, id).await;
        if matches!(
            job["state"].as_str(),
            Some("completed" | "failed" | "cancelled")
        ) {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached a terminal state");
}
