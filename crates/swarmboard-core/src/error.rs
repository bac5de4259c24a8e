//! swarmboard 핵심 에러 타입.
//!
//! 모든 어댑터 crate는 자체 에러 타입에서 `CoreError`를 변환하거나 그대로 전파한다.

use thiserror::Error;

/// 코어 레이어 에러.
/// 직렬화, 설정, 유효성 검증, 네트워크, 프로세스 제어 등 도메인 공통 에러를 정의한다.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// 필드 유효성 검증 실패
    #[error("유효성 검증 실패 — {field}: {message}")]
    Validation {
        /// 검증 실패한 필드명
        field: String,
        /// 실패 사유
        message: String,
    },

    /// 인증 실패 (자격증명 오류, 토큰 없음 등)
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 리소스를 찾을 수 없음
    #[error("{resource_type} 미발견: {id}")]
    NotFound {
        /// 리소스 종류 (예: "Run", "API")
        resource_type: String,
        /// 리소스 식별자
        id: String,
    },

    /// 현재 상태와 충돌하는 요청 (이미 실행 중, 실행 중 아님)
    #[error("{0}")]
    Conflict(String),

    /// 내부 에러 (예상치 못한 상황)
    #[error("내부 에러: {0}")]
    Internal(String),

    /// 네트워크 에러 (연결 실패, 타임아웃)
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// Rate Limit 초과 (429)
    #[error("요청 한도 초과, {retry_after_secs}초 후 재시도")]
    RateLimit {
        /// 재시도 대기 시간 (초)
        retry_after_secs: u64,
    },

    /// 서비스 일시 불가 (503)
    #[error("서비스 일시 불가: {0}")]
    ServiceUnavailable(String),

    /// 부하 테스트 프로세스 실행/종료 실패
    #[error("프로세스 에러: {0}")]
    Process(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// 유효성 검증 에러 생성 헬퍼
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 사용자에게 그대로 보여줄 짧은 메시지
    ///
    /// 서버가 돌려준 사유와 연결 실패 문구는 접두어 없이 노출한다.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Conflict(msg) => msg.clone(),
            CoreError::Validation { message, .. } => message.clone(),
            CoreError::Auth(msg) | CoreError::Network(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
