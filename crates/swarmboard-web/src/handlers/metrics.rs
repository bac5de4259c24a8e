//! 메트릭 수집/조회 핸들러.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use swarmboard_core::models::sample::MetricsSample;
use swarmboard_core::ports::control_client::CurrentMetrics;
use tracing::{debug, info};

use super::{HistoryQuery, StatusResponse};
use crate::error::ApiError;
use crate::handlers::stream::StreamEvent;
use crate::AppState;

/// 윈도우 비우기 응답
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub status: &'static str,
    /// 삭제된 샘플 수
    pub cleared: usize,
}

/// 샘플 수집
///
/// POST /api/metrics
///
/// Locust 이벤트 훅이 1초마다 호출한다. JSON 객체면 무엇이든 받는다.
/// 윈도우에는 해석한 샘플을 넣고, 구독자에게는 수신한 본문을 그대로 보낸다.
pub async fn ingest_sample(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    let raw: Box<RawValue> = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    let value: Value = serde_json::from_str(raw.get())
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    let sample = MetricsSample::from_value(value)?;

    state.window.write().await.push(sample);

    // 구독자가 없으면 send가 실패하지만 윈도우에는 이미 반영됐다
    let receivers = state.event_tx.send(StreamEvent::Sample(raw)).unwrap_or(0);
    debug!("샘플 수신, {receivers}명에게 전달");

    Ok(Json(StatusResponse::ok()))
}

/// 현재 메트릭
///
/// GET /api/metrics
pub async fn current_metrics(State(state): State<AppState>) -> Json<CurrentMetrics> {
    let window = state.window.read().await;
    Json(CurrentMetrics {
        latest: window.latest().cloned(),
        summary: window.summary(),
        capacity: window.capacity(),
    })
}

/// 최근 샘플
///
/// GET /api/metrics/history?limit=
pub async fn metrics_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Json<Vec<MetricsSample>> {
    let window = state.window.read().await;
    let samples = match params.limit {
        Some(limit) => window.recent(limit),
        None => window.to_vec(),
    };
    Json(samples)
}

/// 윈도우 비우기
///
/// DELETE /api/metrics
pub async fn clear_metrics(State(state): State<AppState>) -> Json<ClearResponse> {
    let mut window = state.window.write().await;
    let cleared = window.len();
    window.clear();
    info!("메트릭 윈도우 초기화 ({cleared}개 삭제)");
    Json(ClearResponse {
        status: "ok",
        cleared,
    })
}
