//! 애플리케이션 설정 구조체.
//!
//! 릴레이 서버 URL, 웹 서버 포트, Locust 실행 설정, 스트림 윈도우 크기,
//! 실행 요청 기본값 등 런타임 설정을 정의한다.
//! `ConfigManager`를 통해 JSON 파일에서 로드하며 CLI 인자로 덮어쓴다.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;
use crate::models::run::RunRequest;
use crate::window::DEFAULT_WINDOW_CAPACITY;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 릴레이 서버 연결 설정 (클라이언트 명령용)
    pub server: ServerConfig,
    /// 릴레이 웹 서버 설정
    #[serde(default)]
    pub web: WebConfig,
    /// Locust 프로세스 실행 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 실시간 스트림 설정
    #[serde(default)]
    pub stream: StreamConfig,
    /// `start` 명령 기본값
    #[serde(default)]
    pub defaults: RunRequest,
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            web: WebConfig::default(),
            runner: RunnerConfig::default(),
            stream: StreamConfig::default(),
            defaults: RunRequest::default(),
        }
    }

    /// 서버 요청 타임아웃을 Duration으로 반환
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    /// Locust 정상 종료 대기 시간
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.runner.stop_timeout_secs)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        url::Url::parse(&self.server.base_url).map_err(|e| {
            CoreError::Config(format!(
                "server.base_url 파싱 실패 '{}': {e}",
                self.server.base_url
            ))
        })?;
        if self.server.request_timeout_ms == 0 {
            return Err(CoreError::Config(
                "server.request_timeout_ms는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.stream.window_capacity == 0 {
            return Err(CoreError::Config(
                "stream.window_capacity는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.stream.event_channel_capacity == 0 {
            return Err(CoreError::Config(
                "stream.event_channel_capacity는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.runner.program.trim().is_empty() {
            return Err(CoreError::Config("runner.program이 비어 있습니다".to_string()));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// 릴레이 서버 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 릴레이 서버 기본 URL (예: "http://localhost:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 스트림 재연결 최대 지연 (초)
    #[serde(default = "default_stream_max_retry_secs")]
    pub stream_max_retry_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            stream_max_retry_secs: default_stream_max_retry_secs(),
        }
    }
}

/// 릴레이 웹 서버 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// 웹 서버 포트 (기본: 8000)
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// 외부 접근 허용 여부 (false: 127.0.0.1 only)
    #[serde(default)]
    pub allow_external: bool,
    /// 모든 Origin 허용 (브라우저 대시보드가 다른 도메인에서 접근)
    #[serde(default = "default_true")]
    pub cors_allow_any: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            allow_external: false,
            cors_allow_any: true,
        }
    }
}

/// Locust 프로세스 실행 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// 실행 파일 (기본: "locust")
    #[serde(default = "default_program")]
    pub program: String,
    /// locustfile 경로 (`-f`)
    #[serde(default = "default_locustfile")]
    pub locustfile: String,
    /// 작업 디렉토리 (None이면 현재 디렉토리)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// `-f` 앞에 붙는 추가 인자
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// SIGINT 후 강제 종료까지 대기 (초)
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// 상태 이벤트 채널 용량
    #[serde(default = "default_runner_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            locustfile: default_locustfile(),
            working_dir: None,
            extra_args: Vec::new(),
            stop_timeout_secs: default_stop_timeout_secs(),
            event_capacity: default_runner_event_capacity(),
        }
    }
}

/// 실시간 스트림 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 보관할 최근 샘플 수
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// SSE keep-alive 주기 (초)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// 실시간 이벤트 브로드캐스트 채널 용량
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            keep_alive_secs: default_keep_alive_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_stream_max_retry_secs() -> u64 {
    30
}

fn default_web_port() -> u16 {
    8000
}

fn default_program() -> String {
    "locust".to_string()
}

fn default_locustfile() -> String {
    "locustfile.py".to_string()
}

fn default_stop_timeout_secs() -> u64 {
    10
}

fn default_runner_event_capacity() -> usize {
    32
}

fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_event_channel_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"server": {"base_url": "http://relay:9000"}}"#).unwrap();
        assert_eq!(config.server.base_url, "http://relay:9000");
        assert_eq!(config.server.request_timeout_ms, 30_000);
        assert_eq!(config.web.port, 8000);
        assert!(config.web.cors_allow_any);
        assert_eq!(config.runner.locustfile, "locustfile.py");
        assert_eq!(config.stream.keep_alive_secs, 15);
        assert_eq!(config.defaults.time, "10m");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = AppConfig::default_config();
        config.stream.window_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default_config();
        config.server.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default_config();
        config.runner.program = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn duration_helpers() {
        let config = AppConfig::default_config();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.stop_timeout(), Duration::from_secs(10));
    }
}
