//! 설정 및 와이어링 통합 테스트.
//!
//! 설정 파일 → 어댑터 생성, 토큰 저장소 → 제어 클라이언트 헤더 전달 검증.

use std::sync::Arc;
use swarmboard_core::config::AppConfig;
use swarmboard_core::config_manager::ConfigManager;
use swarmboard_core::models::auth::TokenResponse;
use swarmboard_core::ports::control_client::ControlClient;
use swarmboard_core::ports::runner::LoadRunner;
use swarmboard_core::token_store::{StoredToken, TokenStore};
use swarmboard_network::auth::AuthClient;
use swarmboard_network::http_client::HttpControlClient;
use swarmboard_network::ws_client::MetricsStreamClient;
use swarmboard_runner::LocustProcessRunner;
use swarmboard_web::WebServer;
use tempfile::TempDir;

#[test]
fn config_defaults_are_valid() {
    let config = AppConfig::default_config();
    assert!(config.validate().is_ok());

    assert_eq!(config.server.base_url, "http://localhost:8000");
    assert!(config.server.request_timeout_ms > 0);
    assert!(config.server.stream_max_retry_secs > 0);

    assert_eq!(config.web.port, 8000);
    assert!(!config.web.allow_external);

    assert_eq!(config.stream.window_capacity, 100);
    assert!(config.stream.event_channel_capacity > 0);

    assert_eq!(config.runner.program, "locust");
    assert!(config.defaults.validate().is_ok());
}

#[test]
fn config_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let manager = ConfigManager::with_path(path.clone()).unwrap();
    assert!(path.exists());

    manager
        .update_with(|config| {
            config.server.base_url = "http://relay.internal:9000".to_string();
            config.stream.window_capacity = 30;
            config.defaults.users = 200;
        })
        .unwrap();

    let reopened = ConfigManager::with_path(path).unwrap().get();
    assert_eq!(reopened.server.base_url, "http://relay.internal:9000");
    assert_eq!(reopened.stream.window_capacity, 30);
    assert_eq!(reopened.defaults.users, 200);
}

#[test]
fn invalid_update_is_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("config.json")).unwrap();

    let mut broken = manager.get();
    broken.stream.window_capacity = 0;
    assert!(manager.update(broken).is_err());
    assert_eq!(manager.get().stream.window_capacity, 100);
}

#[tokio::test]
async fn all_adapters_instantiate_from_config() {
    let dir = TempDir::new().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("config.json")).unwrap();
    let config = manager.get();

    let _control =
        HttpControlClient::new(&config.server.base_url, config.request_timeout()).unwrap();
    let _auth = AuthClient::new(
        &config.server.base_url,
        config.request_timeout(),
        TokenStore::beside(manager.config_path()),
    )
    .unwrap();

    let stream =
        MetricsStreamClient::new(&config.server.base_url, config.server.stream_max_retry_secs)
            .unwrap();
    assert_eq!(stream.url(), "ws://localhost:8000/ws");

    let runner = Arc::new(LocustProcessRunner::new(config.runner.clone()));
    assert!(!runner.status().await.is_active());

    let _server = WebServer::new(config.web.clone(), &config.stream, runner);
}

#[tokio::test]
async fn stored_token_is_sent_by_control_client() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    let store = TokenStore::beside(&config_path);
    store
        .save(&StoredToken::new(
            TokenResponse {
                access_token: "saved-jwt".to_string(),
                token_type: "bearer".to_string(),
            },
            "ops@example.com",
        ))
        .unwrap();
    assert_eq!(store.path(), dir.path().join("token.json"));

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/run/status")
        .match_header("authorization", "Bearer saved-jwt")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"state":"idle","run":null,"elapsed_secs":0,"elapsed_display":"0m 0s"}"#,
        )
        .create_async()
        .await;

    let token = TokenStore::beside(&config_path)
        .load()
        .map(|t| t.access_token);
    let client = HttpControlClient::new(&server.url(), std::time::Duration::from_secs(5))
        .unwrap()
        .with_token(token);

    let status = client.run_status().await.unwrap();
    assert!(!status.is_active());
    mock.assert_async().await;
}
