//! 릴레이 서버 ↔ 클라이언트 통합 테스트.
//!
//! 실제 axum 서버를 임시 포트에 띄우고 REST 제어 클라이언트와
//! WebSocket 스트림 클라이언트로 구동한다.


use scripted_relay::TestRelay;
use serde_json::json;
use std::time::Duration;
use swarmboard_core::models::run::{RunRequest, RunState, STATUS_EXITED, STATUS_STARTED};
use swarmboard_core::ports::control_client::ControlClient;
use swarmboard_core::ports::runner::LoadRunner;
use swarmboard_network::http_client::HttpControlClient;
use swarmboard_network::live_window::LiveWindow;
use swarmboard_network::ws_client::{MetricsStreamClient, StreamMessage};
use tokio::sync::mpsc;

fn client(relay: &TestRelay) -> HttpControlClient {
    HttpControlClient::new(&relay.base_url, Duration::from_secs(5))
        .unwrap()
        .with_max_retries(0)
}

/// 다음 메시지 (시간 제한)
async fn next(rx: &mut mpsc::Receiver<StreamMessage>) -> StreamMessage {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("stream message timed out")
        .expect("stream channel closed")
}

#[tokio::test]
async fn start_stop_cycle() {
    let relay = TestRelay::start(10).await;
    let client = client(&relay);

    let started = client.start_run(&RunRequest::default()).await.unwrap();
    assert!(started.is_started());
    assert!(started.run_id.is_some());

    let status = client.run_status().await.unwrap();
    assert_eq!(status.state, RunState::Running);
    assert_eq!(status.run.unwrap().request.users, 10);

    let err = client.start_run(&RunRequest::default()).await.unwrap_err();
    assert_eq!(err.user_message(), "Locust already running.");

    let stopped = client.stop_run().await.unwrap();
    assert!(stopped.is_stopped());
    assert!(!client.run_status().await.unwrap().is_active());

    let err = client.stop_run().await.unwrap_err();
    assert_eq!(err.user_message(), "Locust is not running.");

    relay.shutdown().await;
}

#[tokio::test]
async fn server_rejects_invalid_run_request() {
    let relay = TestRelay::start(10).await;
    let request = RunRequest {
        users: 0,
        ..RunRequest::default()
    };

    let err = client(&relay).start_run(&request).await.unwrap_err();
    assert!(err.user_message().contains("users"));
    assert!(!relay.runner.status().await.is_active());

    relay.shutdown().await;
}

#[tokio::test]
async fn ingest_query_and_clear() {
    let relay = TestRelay::start(2).await;
    let client = client(&relay);

    for ts in 1..=3 {
        let status = relay
            .ingest(json!({"timestamp": ts, "users": ts * 5, "rps": 1.5, "p95": null}))
            .await;
        assert!(status.is_success());
    }

    let current = client.current_metrics().await.unwrap();
    assert_eq!(current.capacity, 2);
    assert_eq!(current.summary.sample_count, 2);
    assert_eq!(current.latest.unwrap().timestamp, 3);
    assert_eq!(current.summary.peak_users, 15);

    let history = client.metrics_history(Some(1)).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].timestamp, 3);

    let all = client.metrics_history(None).await.unwrap();
    assert_eq!(
        all.iter().map(|s| s.timestamp).collect::<Vec<_>>(),
        vec![2, 3]
    );

    client.clear_metrics().await.unwrap();
    assert!(client.metrics_history(None).await.unwrap().is_empty());
    assert!(client.current_metrics().await.unwrap().latest.is_none());

    relay.shutdown().await;
}

#[tokio::test]
async fn stream_relays_samples_and_run_notices() {
    let relay = TestRelay::start(10).await;
    let control = client(&relay);

    let stream = MetricsStreamClient::new(&relay.base_url, 1).unwrap();
    let (task, mut rx) = stream.spawn();
    assert_eq!(next(&mut rx).await, StreamMessage::Connected);
    relay.wait_for_subscribers(1).await;

    let mut live = LiveWindow::new(5);
    live.apply(&StreamMessage::Connected);

    relay
        .ingest(json!({"timestamp": 42, "users": 8, "custom_field": "kept"}))
        .await;
    let message = next(&mut rx).await;
    match &message {
        StreamMessage::Sample(sample) => {
            assert_eq!(sample.timestamp, 42);
            assert_eq!(sample.users, 8);
            assert_eq!(sample.extra["custom_field"], "kept");
        }
        other => panic!("expected sample, got {other:?}"),
    }
    live.apply(&message);

    let started = control.start_run(&RunRequest::default()).await.unwrap();
    let message = next(&mut rx).await;
    assert_eq!(
        message,
        StreamMessage::Run {
            status: STATUS_STARTED.to_string(),
            run_id: started.run_id,
        }
    );
    live.apply(&message);
    assert!(live.is_running());

    relay.runner.finish(0).await;
    let message = next(&mut rx).await;
    assert!(matches!(
        &message,
        StreamMessage::Run { status, .. } if status == STATUS_EXITED
    ));
    live.apply(&message);
    assert!(!live.is_running());
    assert_eq!(live.len(), 1);
    assert!(live.is_connected());

    drop(rx);
    task.abort();
    relay.shutdown().await;
}
