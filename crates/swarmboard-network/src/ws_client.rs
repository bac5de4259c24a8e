//! 실시간 메트릭 WebSocket 클라이언트.
//!
//! `tokio-tungstenite` 기반 수신 전용. 연결이 끊기면 exponential backoff로 재연결한다.

use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use swarmboard_core::error::CoreError;
use swarmboard_core::models::run::{STATUS_EXITED, STATUS_STARTED, STATUS_STOPPED};
use swarmboard_core::models::sample::{MetricsSample, SAMPLE_FIELDS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 수신 채널 용량
const CHANNEL_CAPACITY: usize = 256;

/// 스트림에서 받은 메시지
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// 메트릭 샘플
    Sample(MetricsSample),
    /// 실행 상태 알림 ("Locust started" 등)
    Run { status: String, run_id: Option<Uuid> },
    /// 연결 수립
    Connected,
    /// 연결 끊김, `retry_in_secs` 후 재연결
    Disconnected { retry_in_secs: u64 },
}

impl StreamMessage {
    /// 텍스트 프레임 파싱
    ///
    /// 알려진 실행 상태 문자열이거나 샘플 필드가 하나도 없을 때만 실행 알림으로 본다.
    /// 샘플에 붙은 임의의 `status` 키는 그대로 샘플로 남는다.
    pub fn parse(text: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(text).ok()?;
        let object = value.as_object()?;
        if let Some(status) = object.get("status").and_then(Value::as_str) {
            let known = [STATUS_STARTED, STATUS_STOPPED, STATUS_EXITED].contains(&status);
            let has_sample_fields = SAMPLE_FIELDS.iter().any(|field| object.contains_key(*field));
            if known || !has_sample_fields {
                let run_id = object
                    .get("run_id")
                    .and_then(Value::as_str)
                    .and_then(|id| Uuid::parse_str(id).ok());
                return Some(StreamMessage::Run {
                    status: status.to_string(),
                    run_id,
                });
            }
        }
        MetricsSample::from_value(value)
            .ok()
            .map(StreamMessage::Sample)
    }
}

/// `http(s)://host` → `ws(s)://host/ws`
pub fn stream_url(base_url: &str) -> Result<String, CoreError> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        return Err(CoreError::Config(format!(
            "지원하지 않는 서버 URL: {base_url}"
        )));
    };
    Ok(format!("{ws_base}/ws"))
}

/// 실시간 메트릭 스트림 클라이언트
#[derive(Debug, Clone)]
pub struct MetricsStreamClient {
    url: String,
    max_retry_secs: u64,
}

impl MetricsStreamClient {
    /// 새 클라이언트 생성
    pub fn new(base_url: &str, max_retry_secs: u64) -> Result<Self, CoreError> {
        Ok(Self {
            url: stream_url(base_url)?,
            max_retry_secs: max_retry_secs.max(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// 백그라운드 태스크로 연결하고 수신 채널 반환
    pub fn spawn(self) -> (JoinHandle<()>, mpsc::Receiver<StreamMessage>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let handle = tokio::spawn(async move { self.connect(tx).await });
        (handle, rx)
    }

    /// 연결 후 수신 루프 (재연결 포함)
    ///
    /// 수신 측(`tx`의 상대편)이 닫히면 반환한다.
    pub async fn connect(&self, tx: mpsc::Sender<StreamMessage>) {
        let mut retry_delay = 1u64;

        loop {
            match tokio_tungstenite::connect_async(self.url.as_str()).await {
                Ok((mut ws_stream, _)) => {
                    info!("메트릭 스트림 연결: {}", self.url);
                    retry_delay = 1;
                    if tx.send(StreamMessage::Connected).await.is_err() {
                        return;
                    }

                    while let Some(msg) = ws_stream.next().await {
                        match msg {
                            Ok(Message::Text(text)) => match StreamMessage::parse(text.as_str()) {
                                Some(message) => {
                                    if tx.send(message).await.is_err() {
                                        info!("스트림 수신 채널 닫힘, 연결 종료");
                                        return;
                                    }
                                }
                                None => debug!("해석할 수 없는 프레임 무시: {text}"),
                            },
                            Ok(Message::Close(_)) => {
                                info!("서버가 스트림을 닫음");
                                break;
                            }
                            Ok(_) => {} // Ping/Pong/Binary
                            Err(e) => {
                                warn!("스트림 수신 에러: {e}");
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!("메트릭 스트림 연결 실패: {e}"),
            }

            if tx
                .send(StreamMessage::Disconnected {
                    retry_in_secs: retry_delay,
                })
                .await
                .is_err()
            {
                return;
            }

            info!("{retry_delay}초 후 재연결...");
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(retry_delay)) => {}
                _ = tx.closed() => return,
            }
            retry_delay = (retry_delay * 2).min(self.max_retry_secs);
        }
    }
}
