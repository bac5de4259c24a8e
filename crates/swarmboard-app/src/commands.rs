//! 서브커맨드 실행.
//!
//! 각 명령은 `anyhow::Result`를 반환하고, 사용자에게 보일 실패 메시지는
//! `"<동작> 실패 문구: <서버/코어 메시지>"` 형태로 만든다.

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarmboard_core::config::AppConfig;
use swarmboard_core::error::CoreError;
use swarmboard_core::models::run::{RunRequest, STATUS_EXITED, STATUS_STARTED, STATUS_STOPPED};
use swarmboard_core::ports::control_client::ControlClient;
use swarmboard_core::ports::runner::LoadRunner;
use swarmboard_network::auth::AuthClient;
use swarmboard_network::live_window::{self, LiveWindow};
use swarmboard_network::ws_client::{MetricsStreamClient, StreamMessage};
use swarmboard_runner::LocustProcessRunner;
use swarmboard_web::WebServer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::lifecycle::LifecycleManager;
use crate::render;

/// 종료 신호 후 서버 정리 대기 한도
const SERVER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn failed(action: &str, err: CoreError) -> anyhow::Error {
    anyhow!("{action}: {}", err.user_message())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

/// 시그널 감시 태스크 시작
fn spawn_signal_watch() -> Arc<LifecycleManager> {
    let lifecycle = Arc::new(LifecycleManager::new());
    let watcher = lifecycle.clone();
    tokio::spawn(async move { watcher.wait_for_signal().await });
    lifecycle
}

/// `serve` — 릴레이 서버 실행
///
/// 종료 신호를 받으면 실행 중인 부하 테스트를 먼저 멈춘 뒤 서버를 내린다.
pub async fn serve(config: AppConfig) -> Result<()> {
    let runner = Arc::new(LocustProcessRunner::new(config.runner.clone()));
    let server = WebServer::new(config.web.clone(), &config.stream, runner.clone());

    let listener = server.bind().await?;
    let addr = listener.local_addr()?;
    println!("✅ swarmboard 릴레이 서버: http://{addr}");
    println!("   Locust 이미터 전송 주소: http://{addr}/api/metrics");
    println!("   실시간 스트림: ws://{addr}/ws");

    let lifecycle = spawn_signal_watch();
    let mut server_task = tokio::spawn(server.serve(listener, lifecycle.subscribe()));

    let mut shutdown_rx = lifecycle.subscribe();
    tokio::select! {
        result = &mut server_task => {
            // 신호 없이 서버가 먼저 끝난 경우
            stop_active_run(runner.as_ref()).await;
            return match result {
                Ok(served) => served.map_err(Into::into),
                Err(e) => Err(anyhow!("서버 태스크 실패: {e}")),
            };
        }
        _ = shutdown_rx.wait_for(|stop| *stop) => {}
    }

    println!("종료 중...");
    stop_active_run(runner.as_ref()).await;

    match tokio::time::timeout(SERVER_SHUTDOWN_GRACE, &mut server_task).await {
        Ok(Ok(served)) => served?,
        Ok(Err(e)) => error!("서버 태스크 실패: {e}"),
        Err(_) => {
            // 열린 WebSocket 연결이 graceful shutdown을 붙잡고 있는 경우
            warn!("서버 종료 대기 시간 초과, 강제 종료");
            server_task.abort();
        }
    }
    println!("✅ 종료 완료");
    Ok(())
}

async fn stop_active_run(runner: &dyn LoadRunner) {
    if !runner.status().await.is_active() {
        return;
    }
    info!("실행 중인 부하 테스트 중지");
    match runner.stop().await {
        Ok(event) => info!("부하 테스트 중지 완료: {}", event.status_text()),
        Err(e) => warn!("부하 테스트 중지 실패: {e}"),
    }
}

/// `start`
pub async fn start(client: &dyn ControlClient, request: RunRequest) -> Result<()> {
    request
        .validate()
        .map_err(|e| failed("Failed to start Locust", e))?;
    let resp = client
        .start_run(&request)
        .await
        .map_err(|e| failed("Failed to start Locust", e))?;

    println!("✅ {}", resp.status);
    if let Some(run_id) = resp.run_id {
        println!("   실행 ID: {run_id}");
    }
    println!(
        "   사용자 {} / 스폰 {}/s / 시간 {} / 대상 {}",
        request.users, request.rate, request.time, request.host
    );
    Ok(())
}

/// `stop`
pub async fn stop(client: &dyn ControlClient) -> Result<()> {
    let resp = client
        .stop_run()
        .await
        .map_err(|e| failed("Failed to stop Locust", e))?;
    println!("✅ {}", resp.status);
    Ok(())
}

/// `status`
pub async fn status(client: &dyn ControlClient) -> Result<()> {
    let status = client
        .run_status()
        .await
        .map_err(|e| failed("Failed to fetch status", e))?;
    print_lines(render::status_lines(&status));
    Ok(())
}

/// `metrics [--history N] [--json]`
pub async fn metrics(client: &dyn ControlClient, history: Option<usize>, json: bool) -> Result<()> {
    match history {
        Some(limit) => {
            let samples = client
                .metrics_history(Some(limit))
                .await
                .map_err(|e| failed("Failed to fetch metrics", e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&samples)?);
            } else {
                print_lines(render::history_table(&samples));
            }
        }
        None => {
            let current = client
                .current_metrics()
                .await
                .map_err(|e| failed("Failed to fetch metrics", e))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&current)?);
            } else {
                print_lines(render::current_report(&current));
            }
        }
    }
    Ok(())
}

/// `clear`
pub async fn clear(client: &dyn ControlClient) -> Result<()> {
    client
        .clear_metrics()
        .await
        .map_err(|e| failed("Failed to clear metrics", e))?;
    println!("✅ 메트릭 윈도우를 비웠습니다.");
    Ok(())
}

/// 실행 시작 이후 경과 시간 (대시보드 업타임 카드)
#[derive(Debug, Default)]
pub struct UptimeClock {
    started: Option<Instant>,
    run_id: Option<Uuid>,
}

impl UptimeClock {
    /// 이미 진행 중인 실행에 합류
    pub fn resume(&mut self, elapsed_secs: u64, run_id: Option<Uuid>) {
        let now = Instant::now();
        self.started = Some(
            now.checked_sub(Duration::from_secs(elapsed_secs))
                .unwrap_or(now),
        );
        self.run_id = run_id;
    }

    /// 실행 상태 알림 반영
    ///
    /// 다른 실행의 종료 알림은 무시한다.
    pub fn on_status(&mut self, status: &str, run_id: Option<Uuid>) {
        if status == STATUS_STARTED {
            self.started = Some(Instant::now());
            self.run_id = run_id;
        } else if status == STATUS_STOPPED || status == STATUS_EXITED {
            if live_window::is_stale(run_id, self.run_id) {
                return;
            }
            self.started = None;
            self.run_id = None;
        }
    }

    pub fn elapsed_secs(&self) -> Option<u64> {
        self.started.map(|started| started.elapsed().as_secs())
    }
}

/// `watch` — 실시간 스트림 출력
///
/// Ctrl+C까지 샘플마다 통계 한 줄을 찍고, 끝나면 윈도우 요약을 출력한다.
pub async fn watch(
    client: &dyn ControlClient,
    stream: MetricsStreamClient,
    capacity: usize,
) -> Result<()> {
    let mut live = LiveWindow::new(capacity);
    let mut clock = UptimeClock::default();

    match client.run_status().await {
        Ok(status) if status.is_active() => {
            let run_id = status.run.as_ref().map(|run| run.run_id);
            live.set_running(true, run_id);
            clock.resume(status.elapsed_secs, run_id);
        }
        Ok(_) => {}
        Err(e) => warn!("실행 상태 조회 실패: {e}"),
    }

    println!("📡 {} 수신 중 (Ctrl+C로 종료)", stream.url());
    let lifecycle = spawn_signal_watch();
    let mut shutdown_rx = lifecycle.subscribe();
    let (task, mut rx) = stream.spawn();

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some(message) = message else { break };
                live.apply(&message);
                match &message {
                    StreamMessage::Sample(sample) => {
                        println!("{}", render::stat_line(sample, clock.elapsed_secs()));
                    }
                    StreamMessage::Run { status, run_id } => {
                        clock.on_status(status, *run_id);
                        println!("▶ {status}");
                    }
                    StreamMessage::Connected => println!("🔌 연결됨"),
                    StreamMessage::Disconnected { retry_in_secs } => {
                        eprintln!("⚠️  연결 끊김, {retry_in_secs}초 후 재연결");
                    }
                }
            }
            _ = shutdown_rx.wait_for(|stop| *stop) => break,
        }
    }

    drop(rx);
    task.abort();

    println!();
    println!(
        "실행 상태: {}",
        if live.is_running() { "running" } else { "idle" }
    );
    print_lines(render::summary_lines(&live.summary(), capacity));
    Ok(())
}

/// `login`
pub async fn login(auth: &AuthClient, email: &str, password: Option<String>) -> Result<()> {
    let password = require_password(password)?;
    let token = auth
        .login(email, &password)
        .await
        .map_err(|e| failed("Login failed", e))?;
    println!("✅ {} 로그인 완료", token.email);
    Ok(())
}

/// `signup`
pub async fn signup(
    auth: &AuthClient,
    email: &str,
    password: Option<String>,
    full_name: Option<String>,
) -> Result<()> {
    let password = require_password(password)?;
    let token = auth
        .signup(email, &password, full_name)
        .await
        .map_err(|e| failed("Signup failed", e))?;
    println!("✅ {} 가입 및 로그인 완료", token.email);
    Ok(())
}

fn require_password(password: Option<String>) -> Result<String> {
    password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("Password required (--password or SWARMBOARD_PASSWORD)"))
}

/// `logout`
pub fn logout(auth: &AuthClient) -> Result<()> {
    auth.logout().map_err(|e| failed("Logout failed", e))?;
    println!("✅ 로그아웃 완료");
    Ok(())
}

/// `whoami`
pub async fn whoami(auth: &AuthClient) -> Result<()> {
    let profile = auth
        .me()
        .await
        .map_err(|e| failed("Failed to fetch profile", e))?;
    match profile.full_name {
        Some(name) => println!("{name} <{}>", profile.email),
        None => println!("{}", profile.email),
    }
    Ok(())
}

/// 설정의 기본 실행 요청에 CLI 값 덮어쓰기
pub fn run_request(
    config: &AppConfig,
    users: Option<u32>,
    rate: Option<f64>,
    time: Option<String>,
    host: Option<String>,
) -> RunRequest {
    let defaults = config.defaults.clone();
    RunRequest {
        users: users.unwrap_or(defaults.users),
        rate: rate.unwrap_or(defaults.rate),
        time: time.unwrap_or(defaults.time),
        host: host.unwrap_or(defaults.host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use swarmboard_core::models::run::{ControlResponse, RunStatus};
    use swarmboard_core::models::sample::MetricsSample;
    use swarmboard_core::ports::control_client::CurrentMetrics;

    /// 항상 같은 에러를 돌려주는 클라이언트
    struct Refusing(fn() -> CoreError);

    #[async_trait]
    impl ControlClient for Refusing {
        async fn start_run(&self, _: &RunRequest) -> Result<ControlResponse, CoreError> {
            Err((self.0)())
        }
        async fn stop_run(&self) -> Result<ControlResponse, CoreError> {
            Err((self.0)())
        }
        async fn run_status(&self) -> Result<RunStatus, CoreError> {
            Err((self.0)())
        }
        async fn current_metrics(&self) -> Result<CurrentMetrics, CoreError> {
            Err((self.0)())
        }
        async fn metrics_history(
            &self,
            _: Option<usize>,
        ) -> Result<Vec<MetricsSample>, CoreError> {
            Err((self.0)())
        }
        async fn clear_metrics(&self) -> Result<(), CoreError> {
            Err((self.0)())
        }
    }

    fn already_running() -> CoreError {
        CoreError::validation("request", "Locust already running.")
    }

    fn not_running() -> CoreError {
        CoreError::validation("request", "Locust is not running.")
    }

    #[tokio::test]
    async fn start_failure_message() {
        let err = start(&Refusing(already_running), RunRequest::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to start Locust: Locust already running."
        );
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_server() {
        let request = RunRequest {
            time: "soon".to_string(),
            ..RunRequest::default()
        };
        // 서버에 닿았다면 "already running"이 나온다
        let err = start(&Refusing(already_running), request)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to start Locust: invalid run time"));
    }

    #[tokio::test]
    async fn stop_failure_message() {
        let err = stop(&Refusing(not_running)).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to stop Locust: Locust is not running.");
    }

    #[test]
    fn password_is_required() {
        assert!(require_password(None).is_err());
        assert!(require_password(Some(String::new())).is_err());
        assert_eq!(require_password(Some("pw".to_string())).unwrap(), "pw");
    }

    #[test]
    fn cli_values_override_defaults() {
        let config = AppConfig::default_config();
        let request = run_request(&config, Some(50), None, Some("1h".to_string()), None);
        assert_eq!(request.users, 50);
        assert_eq!(request.rate, config.defaults.rate);
        assert_eq!(request.time, "1h");
        assert_eq!(request.host, "https://example.com");
    }

    #[test]
    fn uptime_follows_run_notices() {
        let mut clock = UptimeClock::default();
        assert_eq!(clock.elapsed_secs(), None);

        clock.on_status(STATUS_STARTED, None);
        assert_eq!(clock.elapsed_secs(), Some(0));

        clock.on_status(STATUS_EXITED, None);
        assert_eq!(clock.elapsed_secs(), None);

        clock.resume(75, None);
        assert!(clock.elapsed_secs().unwrap() >= 75);

        clock.on_status(STATUS_STOPPED, None);
        assert_eq!(clock.elapsed_secs(), None);
    }

    #[test]
    fn uptime_ignores_other_runs_exit() {
        let previous = Uuid::new_v4();
        let current = Uuid::new_v4();
        let mut clock = UptimeClock::default();

        clock.resume(30, Some(current));
        clock.on_status(STATUS_EXITED, Some(previous));
        assert!(clock.elapsed_secs().unwrap() >= 30);

        clock.on_status(STATUS_STOPPED, Some(current));
        assert_eq!(clock.elapsed_secs(), None);

        clock.on_status(STATUS_STARTED, Some(previous));
        clock.on_status(STATUS_EXITED, None);
        assert_eq!(clock.elapsed_secs(), None);
    }
}
