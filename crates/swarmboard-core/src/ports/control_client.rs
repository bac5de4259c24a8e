//! 릴레이 서버 제어 클라이언트 포트.
//!
//! 구현: `swarmboard-network` crate (reqwest)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::run::{ControlResponse, RunRequest, RunStatus};
use crate::models::sample::MetricsSample;
use crate::window::WindowSummary;

/// 현재 메트릭 응답 (`GET /api/metrics`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentMetrics {
    /// 가장 최근 샘플 (없으면 null)
    pub latest: Option<MetricsSample>,
    /// 윈도우 집계
    pub summary: WindowSummary,
    /// 서버 윈도우 크기
    pub capacity: usize,
}

/// HTTP 제어 클라이언트
#[async_trait]
pub trait ControlClient: Send + Sync {
    /// 부하 테스트 시작
    async fn start_run(&self, request: &RunRequest) -> Result<ControlResponse, CoreError>;

    /// 부하 테스트 중지
    async fn stop_run(&self) -> Result<ControlResponse, CoreError>;

    /// 실행 상태 조회
    async fn run_status(&self) -> Result<RunStatus, CoreError>;

    /// 현재 메트릭 조회
    async fn current_metrics(&self) -> Result<CurrentMetrics, CoreError>;

    /// 최근 샘플 조회 (`limit` 없으면 서버 윈도우 전체)
    async fn metrics_history(&self, limit: Option<usize>)
        -> Result<Vec<MetricsSample>, CoreError>;

    /// 서버 윈도우 비우기
    async fn clear_metrics(&self) -> Result<(), CoreError>;
}
