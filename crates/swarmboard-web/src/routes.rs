//! 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::AppState;

/// `/api` 하위 라우트
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // 메트릭 수집/조회
        .route(
            "/metrics",
            get(handlers::metrics::current_metrics)
                .post(handlers::metrics::ingest_sample)
                .delete(handlers::metrics::clear_metrics),
        )
        .route("/metrics/history", get(handlers::metrics::metrics_history))
        // 실시간 스트림 (SSE)
        .route("/stream", get(handlers::stream::event_stream))
        // 실행 상태
        .route("/run/status", get(handlers::run::run_status))
        .route("/health", get(handlers::health::health))
}

/// 대시보드가 직접 호출하는 최상위 라우트
pub fn root_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(handlers::socket::ws_handler))
        .route("/start-locust", post(handlers::run::start_locust))
        .route("/stop-locust", post(handlers::run::stop_locust))
}
