//! SSE 실시간 스트림 핸들러.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use serde_json::value::RawValue;
use std::convert::Infallible;
use std::time::Duration;
use swarmboard_core::models::run::RunEvent;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::AppState;

/// 실시간 이벤트 타입
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// 새 메트릭 샘플 (수신한 JSON 원문)
    Sample(Box<RawValue>),
    /// 실행 상태 변경
    Run(RunNotice),
}

/// 실행 상태 알림
///
/// `/ws`에는 이 객체가 그대로 나간다. 대시보드는 `status` 키로 샘플과 구분한다.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunNotice {
    pub status: String,
    pub run_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl From<&RunEvent> for RunNotice {
    fn from(event: &RunEvent) -> Self {
        let exit_code = match event {
            RunEvent::Started(_) => None,
            RunEvent::Stopped { exit_code, .. } | RunEvent::Exited { exit_code, .. } => *exit_code,
        };
        Self {
            status: event.status_text().to_string(),
            run_id: event.run_id(),
            exit_code,
        }
    }
}

impl StreamEvent {
    /// WebSocket 프레임 본문 (태그 없는 원본 JSON)
    pub fn ws_payload(&self) -> Result<String, serde_json::Error> {
        match self {
            StreamEvent::Sample(raw) => Ok(raw.get().to_string()),
            StreamEvent::Run(notice) => serde_json::to_string(notice),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StreamEvent::Sample(_) => "sample",
            StreamEvent::Run(_) => "run",
        }
    }
}

/// SSE 스트림 엔드포인트
///
/// GET /api/stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_tx.subscribe());

    // 채널 지연(lagged) 시 밀린 이벤트는 건너뛴다
    let sse_stream = stream.filter_map(|result| {
        let event = result.ok()?;
        let json = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event(event.name()).data(json)))
    });

    Sse::new(sse_stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.keep_alive_secs.max(1)))
            .text("ping"),
    )
}
