//! 부하 테스트 실행 모델.
//!
//! 실행 요청(사용자 수, 스폰 속도, 실행 시간, 대상 호스트), 실행 상태,
//! 상태 변경 이벤트를 정의한다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::CoreError;

/// `status` 문자열 — 대시보드가 이 값으로 실행 여부를 판단한다
pub const STATUS_STARTED: &str = "Locust started";
/// 운영자 요청으로 종료됨
pub const STATUS_STOPPED: &str = "Locust stopped";
/// 실행 시간 만료 등으로 스스로 종료됨
pub const STATUS_EXITED: &str = "Locust exited";

/// 부하 테스트 실행 요청
///
/// 누락된 필드는 대시보드 폼의 기본값으로 채운다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// 동시 가상 사용자 수 (`-u`)
    #[serde(default = "default_users")]
    pub users: u32,
    /// 초당 스폰 속도 (`-r`)
    #[serde(default = "default_rate")]
    pub rate: f64,
    /// 실행 시간 (`-t`, 예: "10m", "1h30m", "90s")
    #[serde(default = "default_time")]
    pub time: String,
    /// 대상 호스트 (`--host`)
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            users: default_users(),
            rate: default_rate(),
            time: default_time(),
            host: default_host(),
        }
    }
}

fn default_users() -> u32 {
    10
}

fn default_rate() -> f64 {
    2.0
}

fn default_time() -> String {
    "10m".to_string()
}

fn default_host() -> String {
    "https://example.com".to_string()
}

impl RunRequest {
    /// 요청 필드 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.users == 0 {
            return Err(CoreError::validation("users", "users must be at least 1"));
        }
        if !(self.rate.is_finite() && self.rate > 0.0) {
            return Err(CoreError::validation(
                "rate",
                "spawn rate must be a positive number",
            ));
        }
        parse_run_time(&self.time)?;

        let url = url::Url::parse(&self.host).map_err(|e| {
            CoreError::validation("host", format!("invalid host URL '{}': {e}", self.host))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(CoreError::validation(
                "host",
                format!("host must be an http(s) URL: {}", self.host),
            ));
        }
        Ok(())
    }
}

/// Locust `--run-time` 형식 파싱
///
/// 정수만 있으면 초 단위. 그 외에는 `h`, `m`, `s` 그룹이 이 순서로 하나 이상.
pub fn parse_run_time(input: &str) -> Result<Duration, CoreError> {
    let text = input.trim();
    let invalid = || {
        CoreError::validation(
            "time",
            format!("invalid run time '{input}' (expected e.g. 90s, 10m, 1h30m)"),
        )
    };

    if text.is_empty() {
        return Err(invalid());
    }

    let total_secs = if let Ok(secs) = text.parse::<u64>() {
        secs
    } else {
        let mut total: u64 = 0;
        let mut digits = String::new();
        // 단위는 h → m → s 순서로 한 번씩만
        let mut last_rank = 0u8;

        for ch in text.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            let (rank, factor) = match ch.to_ascii_lowercase() {
                'h' => (1, 3600),
                'm' => (2, 60),
                's' => (3, 1),
                _ => return Err(invalid()),
            };
            if digits.is_empty() || rank <= last_rank {
                return Err(invalid());
            }
            let value: u64 = digits.parse().map_err(|_| invalid())?;
            total = value
                .checked_mul(factor)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(invalid)?;
            digits.clear();
            last_rank = rank;
        }

        if !digits.is_empty() {
            return Err(invalid());
        }
        total
    };

    if total_secs == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total_secs))
}

/// 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// 실행 중인 부하 테스트 없음
    Idle,
    /// 실행 중
    Running,
    /// 종료 신호를 보낸 뒤 프로세스 종료 대기 중
    Stopping,
}

/// 실행 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// 실행 ID
    pub run_id: Uuid,
    /// 실행 요청 파라미터
    pub request: RunRequest,
    /// 시작 시각
    pub started_at: DateTime<Utc>,
    /// 자식 프로세스 PID
    #[serde(default)]
    pub pid: Option<u32>,
}

impl RunInfo {
    /// 새 실행 정보 생성 (시작 시각 = 현재)
    pub fn new(request: RunRequest, pid: Option<u32>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request,
            started_at: Utc::now(),
            pid,
        }
    }

    /// 시작 후 경과 시간 (초)
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.started_at).num_seconds().max(0) as u64
    }
}

/// 실행 상태 조회 응답
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// 현재 상태
    pub state: RunState,
    /// 진행 중인 실행 정보
    pub run: Option<RunInfo>,
    /// 경과 시간 (초)
    pub elapsed_secs: u64,
    /// 경과 시간 표시 문자열 ("3m 12s")
    pub elapsed_display: String,
}

impl RunStatus {
    /// 유휴 상태
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            run: None,
            elapsed_secs: 0,
            elapsed_display: format_elapsed(0),
        }
    }

    /// 실행 정보로부터 상태 생성
    pub fn from_run(state: RunState, run: RunInfo) -> Self {
        let elapsed_secs = run.elapsed_secs(Utc::now());
        Self {
            state,
            run: Some(run),
            elapsed_secs,
            elapsed_display: format_elapsed(elapsed_secs),
        }
    }

    /// 실행 중 여부 (종료 대기 포함)
    pub fn is_active(&self) -> bool {
        self.state != RunState::Idle
    }
}

/// 실행 상태 변경 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// 실행 시작
    Started(RunInfo),
    /// 운영자 요청으로 종료
    Stopped {
        run_id: Uuid,
        exit_code: Option<i32>,
    },
    /// 프로세스가 스스로 종료 (실행 시간 만료, 크래시)
    Exited {
        run_id: Uuid,
        exit_code: Option<i32>,
    },
}

impl RunEvent {
    /// 대시보드 호환 상태 문자열
    pub fn status_text(&self) -> &'static str {
        match self {
            RunEvent::Started(_) => STATUS_STARTED,
            RunEvent::Stopped { .. } => STATUS_STOPPED,
            RunEvent::Exited { .. } => STATUS_EXITED,
        }
    }

    /// 대상 실행 ID
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::Started(info) => info.run_id,
            RunEvent::Stopped { run_id, .. } | RunEvent::Exited { run_id, .. } => *run_id,
        }
    }
}

/// 시작/중지 성공 응답 본문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    /// "Locust started" / "Locust stopped"
    pub status: String,
    /// 대상 실행 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl ControlResponse {
    /// 시작 성공 여부 (대소문자 무시 부분 일치)
    pub fn is_started(&self) -> bool {
        self.status
            .to_lowercase()
            .contains(&STATUS_STARTED.to_lowercase())
    }

    /// 중지 성공 여부
    pub fn is_stopped(&self) -> bool {
        self.status == STATUS_STOPPED || self.status == "stopped"
    }
}

/// 경과 시간을 "{분}m {초}s" 형식으로
pub fn format_elapsed(secs: u64) -> String {
    format!("{}m {}s", secs / 60, secs % 60)
}
