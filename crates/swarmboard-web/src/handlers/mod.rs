//! API 핸들러 모듈.

pub mod health;
pub mod metrics;
pub mod run;
pub mod socket;
pub mod stream;

use serde::{Deserialize, Serialize};

/// 최근 샘플 조회 쿼리
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// 최대 개수 (없으면 윈도우 전체)
    pub limit: Option<usize>,
}

/// 단순 상태 응답 (`{"status": "ok"}`)
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self { status: "ok" }
    }
}
