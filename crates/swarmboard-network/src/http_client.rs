//! 릴레이 서버 HTTP 클라이언트.
//!
//! `ControlClient` 포트 구현. bearer 토큰 주입 + 재시도 로직.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use swarmboard_core::error::CoreError;
use swarmboard_core::models::run::{ControlResponse, RunRequest, RunStatus};
use swarmboard_core::models::sample::MetricsSample;
use swarmboard_core::ports::control_client::{ControlClient, CurrentMetrics};
use tracing::{debug, warn};

/// 기본 재시도 횟수
const DEFAULT_MAX_RETRIES: u32 = 3;

/// 재시도 간격 상한
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Retry-After 헤더가 없을 때 대기 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 연결 실패 메시지
pub(crate) const UNREACHABLE: &str = "Network error: cannot reach server";

/// 재시도 가능한 에러인지 판별
fn is_retryable(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_) | CoreError::ServiceUnavailable(_) | CoreError::RateLimit { .. }
    )
}

/// 연결/타임아웃 에러 매핑
pub(crate) fn map_transport_error(err: reqwest::Error) -> CoreError {
    if err.is_connect() || err.is_timeout() {
        debug!("전송 실패: {err}");
        CoreError::Network(UNREACHABLE.to_string())
    } else {
        CoreError::Network(format!("{UNREACHABLE} ({err})"))
    }
}

/// 에러 응답 본문에서 사람이 읽을 메시지 추출
///
/// 릴레이 서버의 `{"error": ...}`, 인증 API의 `{"detail": ...}`
/// (문자열 또는 검증 에러 배열), `{"message": ...}` 형식을 처리한다.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    fn join_items(items: &[Value]) -> String {
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other
                    .get("msg")
                    .or_else(|| other.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Invalid input")
                    .to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    match &value {
        Value::Array(items) => Some(join_items(items)),
        Value::Object(map) => {
            for key in ["error", "detail", "message"] {
                match map.get(key) {
                    Some(Value::String(s)) => return Some(s.clone()),
                    Some(Value::Array(items)) => return Some(join_items(items)),
                    _ => {}
                }
            }
            None
        }
        _ => None,
    }
}

/// 릴레이 서버 REST 클라이언트 — `ControlClient` 포트 구현
pub struct HttpControlClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpControlClient {
    /// 새 HTTP 클라이언트 생성
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
        })
    }

    /// bearer 토큰 설정
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// 재시도 횟수 설정
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 첫 재시도 대기 시간 (이후 2배씩, 최대 30초)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.request(method, &url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// 응답 상태 코드 확인 및 에러 매핑
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!("응답 본문 읽기 실패: {e}");
            String::new()
        });
        let message = extract_error_message(&text).unwrap_or_else(|| text.clone());

        match status.as_u16() {
            400 => Err(CoreError::validation("request", message)),
            401 => Err(CoreError::Auth(format!("인증 실패: {message}"))),
            404 => Err(CoreError::NotFound {
                resource_type: "API".to_string(),
                id: message,
            }),
            429 => Err(CoreError::RateLimit {
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            }),
            503 => Err(CoreError::ServiceUnavailable(message)),
            _ => Err(CoreError::Internal(format!("API 에러 ({status}): {message}"))),
        }
    }

    /// 요청 1회 실행 후 JSON 파싱
    async fn send_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, CoreError> {
        let resp = req.send().await.map_err(map_transport_error)?;
        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| CoreError::Internal(format!("응답 파싱 실패: {e}")))
    }

    /// 재시도가 포함된 요청 실행
    ///
    /// exponential backoff: 1s → 2s → 4s … (최대 30초)
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !is_retryable(&e) || attempt >= self.max_retries => return Err(e),
                Err(e) => {
                    attempt += 1;
                    // RateLimit은 서버 지정 대기 시간 사용
                    let wait = match &e {
                        CoreError::RateLimit { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).min(MAX_RETRY_DELAY)
                        }
                        _ => delay,
                    };
                    warn!(
                        "요청 실패 (시도 {attempt}/{}): {e}, {wait:?} 후 재시도",
                        self.max_retries + 1
                    );
                    tokio::time::sleep(wait).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }
}

#[async_trait]
impl ControlClient for HttpControlClient {
    async fn start_run(&self, request: &RunRequest) -> Result<ControlResponse, CoreError> {
        debug!("부하 테스트 시작 요청: users={} rate={}", request.users, request.rate);
        // 멱등이 아니므로 재시도하지 않는다
        self.send_json(self.request(Method::POST, "/start-locust").json(request))
            .await
    }

    async fn stop_run(&self) -> Result<ControlResponse, CoreError> {
        debug!("부하 테스트 중지 요청");
        self.send_json(self.request(Method::POST, "/stop-locust"))
            .await
    }

    async fn run_status(&self) -> Result<RunStatus, CoreError> {
        self.execute_with_retry(|| self.send_json(self.request(Method::GET, "/api/run/status")))
            .await
    }

    async fn current_metrics(&self) -> Result<CurrentMetrics, CoreError> {
        self.execute_with_retry(|| self.send_json(self.request(Method::GET, "/api/metrics")))
            .await
    }

    async fn metrics_history(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<MetricsSample>, CoreError> {
        let path = match limit {
            Some(limit) => format!("/api/metrics/history?limit={limit}"),
            None => "/api/metrics/history".to_string(),
        };
        self.execute_with_retry(|| self.send_json(self.request(Method::GET, &path)))
            .await
    }

    async fn clear_metrics(&self) -> Result<(), CoreError> {
        self.execute_with_retry(|| async {
            let resp = self
                .request(Method::DELETE, "/api/metrics")
                .send()
                .await
                .map_err(map_transport_error)?;
            Self::check_response(resp).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(server: &mockito::ServerGuard) -> HttpControlClient {
        HttpControlClient::new(&server.url(), Duration::from_secs(5))
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    #[test]
    fn http_client_creation() {
        let client =
            HttpControlClient::new("http://localhost:8000/", Duration::from_secs(30)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn is_retryable_errors() {
        assert!(is_retryable(&CoreError::Network("test".to_string())));
        assert!(is_retryable(&CoreError::ServiceUnavailable(
            "test".to_string()
        )));
        assert!(is_retryable(&CoreError::RateLimit {
            retry_after_secs: 60
        }));
        assert!(!is_retryable(&CoreError::Auth("test".to_string())));
        assert!(!is_retryable(&CoreError::Conflict("test".to_string())));
    }

    #[test]
    fn error_message_formats() {
        assert_eq!(
            extract_error_message(r#"{"error":"Locust already running."}"#).as_deref(),
            Some("Locust already running.")
        );
        assert_eq!(
            extract_error_message(r#"{"detail":"Email already registered"}"#).as_deref(),
            Some("Email already registered")
        );
        assert_eq!(
            extract_error_message(
                r#"{"detail":[{"msg":"field required"},{"msg":"value is not a valid email"}]}"#
            )
            .as_deref(),
            Some("field required, value is not a valid email")
        );
        assert_eq!(extract_error_message("<html>").as_deref(), None);
        assert_eq!(extract_error_message(r#"{"other":1}"#).as_deref(), None);
    }

    #[tokio::test]
    async fn start_run_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/start-locust")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "users": 20,
                "host": "https://example.com"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"Locust started"}"#)
            .create_async()
            .await;

        let request = RunRequest {
            users: 20,
            ..Default::default()
        };
        let resp = client(&server).start_run(&request).await.unwrap();
        assert!(resp.is_started());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_conflict_surfaces_server_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/start-locust")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"Locust already running."}"#)
            .expect(1)
            .create_async()
            .await;

        let err = client(&server)
            .start_run(&RunRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Locust already running.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/start-locust")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let err = client(&server)
            .start_run(&RunRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ServiceUnavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn reads_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/run/status")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let err = client(&server)
            .with_max_retries(2)
            .run_status()
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ServiceUnavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn history_with_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                mockito::Matcher::Regex("^/api/metrics/history".to_string()),
            )
            .match_query(mockito::Matcher::UrlEncoded(
                "limit".to_string(),
                "2".to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"timestamp":1,"rps":3.5},{"timestamp":2,"p95":null}]"#)
            .create_async()
            .await;

        let samples = client(&server).metrics_history(Some(2)).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].rps, 3.5);
        assert_eq!(samples[1].p95, 0.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/api/metrics")
            .match_header("authorization", "Bearer abc123")
            .with_status(200)
            .with_body(r#"{"status":"ok","cleared":3}"#)
            .create_async()
            .await;

        client(&server)
            .with_token(Some("abc123".to_string()))
            .clear_metrics()
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/metrics")
            .with_status(401)
            .with_body(r#"{"detail":"Not authenticated"}"#)
            .create_async()
            .await;

        let err = client(&server).current_metrics().await.unwrap_err();
        assert!(matches!(err, CoreError::Auth(ref msg) if msg.contains("Not authenticated")));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        // 바인드 후 바로 닫은 포트
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpControlClient::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2))
            .unwrap()
            .with_max_retries(0);

        let err = client.stop_run().await.unwrap_err();
        assert!(matches!(err, CoreError::Network(ref msg) if msg.starts_with(UNREACHABLE)));
    }
}
