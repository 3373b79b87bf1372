#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use inkwell_api_http::{build_router, AppState, GatewayConfig, JsonShapeValidator};
use inkwell_core::application::{GenerationPorts, GenerationService};
use inkwell_core::port::auth_probe::mocks::StaticAuthProbe;
use inkwell_core::port::id_provider::mocks::SequentialIdProvider;
use inkwell_core::port::process_spawner::mocks::{Script, ScriptedSpawner};
use inkwell_core::port::time_provider::SystemTimeProvider;
use inkwell_core::OrchestratorConfig;
use serde_json::Value;
use tower::ServiceExt;

/// Router plus handles on the test doubles behind it
pub struct TestApp {
    pub router: Router,
    pub service: Arc<GenerationService>,
    pub spawner: Arc<ScriptedSpawner>,
    pub auth: Arc<StaticAuthProbe>,
}

pub fn build_test_app(script: Script) -> TestApp {
    build_test_app_with(script, OrchestratorConfig::default())
}

pub fn build_test_app_with(script: Script, config: OrchestratorConfig) -> TestApp {
    let spawner = Arc::new(ScriptedSpawner::new(script));
    let auth = Arc::new(StaticAuthProbe::new(true));
    let config = OrchestratorConfig {
        kill_grace: Duration::from_millis(10),
        ..config
    };

    let service = Arc::new(GenerationService::new(
        &config,
        GenerationPorts {
            validator: Arc::new(JsonShapeValidator),
            spawner: spawner.clone(),
            auth_probe: auth.clone(),
            id_provider: Arc::new(SequentialIdProvider::default()),
            time_provider: Arc::new(SystemTimeProvider),
        },
    ));
    let router = build_router(AppState::new(service.clone(), GatewayConfig::default()));

    TestApp {
        router,
        service,
        spawner,
        auth,
    }
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    app.router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: &TestApp, uri: &str, body: Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: &TestApp, uri: &str, body: String) -> Response<Body> {
    app.router
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body))
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

/// Poll the snapshot route until the job reports `state`
pub async fn wait_for_state(app: &TestApp, id: &str, state: &str) -> Value {
    for _ in 0..200 {
        let response = get(app, &format!("/api/generation/generations/{id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["state"] == state {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {state}");
}
