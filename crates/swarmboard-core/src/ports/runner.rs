//! 부하 테스트 실행기 포트.
//!
//! 구현: `swarmboard-runner` crate (Locust 자식 프로세스 감독)

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::models::run::{RunEvent, RunInfo, RunRequest, RunStatus};

/// 부하 테스트 실행기
///
/// 동시에 하나의 실행만 허용한다.
#[async_trait]
pub trait LoadRunner: Send + Sync {
    /// 부하 테스트 시작
    ///
    /// 이미 실행 중이면 `CoreError::Conflict`.
    async fn start(&self, request: &RunRequest) -> Result<RunInfo, CoreError>;

    /// 실행 중인 부하 테스트 중지
    ///
    /// 프로세스 종료까지 기다린 뒤 `RunEvent::Stopped`를 반환한다.
    /// 실행 중이 아니면 `CoreError::Conflict`.
    async fn stop(&self) -> Result<RunEvent, CoreError>;

    /// 현재 실행 상태
    async fn status(&self) -> RunStatus;

    /// 상태 변경 이벤트 구독
    fn subscribe(&self) -> broadcast::Receiver<RunEvent>;
}
