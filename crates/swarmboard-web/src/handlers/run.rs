//! 부하 테스트 시작/중지 핸들러.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use swarmboard_core::models::run::{ControlResponse, RunEvent, RunRequest, RunStatus};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

/// 부하 테스트 시작
///
/// POST /start-locust
///
/// 본문이 비어 있거나 필드가 빠지면 기본값(10명, 2/s, 10m)을 쓴다.
pub async fn start_locust(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ControlResponse>, ApiError> {
    let request = parse_run_request(&body)?;
    let info = state.runner.start(&request).await?;
    info!(run_id = %info.run_id, "부하 테스트 시작 요청 처리");

    Ok(Json(ControlResponse {
        status: RunEvent::Started(info.clone()).status_text().to_string(),
        run_id: Some(info.run_id),
    }))
}

/// 부하 테스트 중지
///
/// POST /stop-locust
pub async fn stop_locust(State(state): State<AppState>) -> Result<Json<ControlResponse>, ApiError> {
    let event = state.runner.stop().await?;
    Ok(Json(ControlResponse {
        status: event.status_text().to_string(),
        run_id: Some(event.run_id()),
    }))
}

/// 실행 상태
///
/// GET /api/run/status
pub async fn run_status(State(state): State<AppState>) -> Json<RunStatus> {
    Json(state.runner.status().await)
}

fn parse_run_request(body: &[u8]) -> Result<RunRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid run request: {e}")))
}
