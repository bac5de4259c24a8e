//! # swarmboard-web
//!
//! Locust 메트릭 릴레이 서버.
//! Axum 기반 REST API + WebSocket + SSE.
//!
//! ## 기능
//! - 메트릭 샘플 수집 (`POST /api/metrics`) 및 최근 N개 보관
//! - 실시간 피드 (`/ws`, `/api/stream`)
//! - 부하 테스트 시작/중지 (`/start-locust`, `/stop-locust`)
//! - 실행 상태, 헬스 체크

pub mod error;
pub mod handlers;
pub mod routes;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use swarmboard_core::config::{StreamConfig, WebConfig};
use swarmboard_core::ports::runner::LoadRunner;
use swarmboard_core::window::SampleWindow;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub use handlers::stream::{RunNotice, StreamEvent};

/// 포트 바인드 최대 시도 횟수
const MAX_PORT_ATTEMPTS: u16 = 10;

/// 웹 서버 애플리케이션 상태
#[derive(Clone)]
pub struct AppState {
    /// 최근 메트릭 샘플
    pub window: Arc<RwLock<SampleWindow>>,
    /// 실시간 이벤트 송신 채널
    pub event_tx: broadcast::Sender<StreamEvent>,
    /// 부하 테스트 실행기
    pub runner: Arc<dyn LoadRunner>,
    /// 서버 시작 시각
    pub started_at: Instant,
    /// SSE keep-alive 주기 (초)
    pub keep_alive_secs: u64,
}

impl AppState {
    pub fn new(runner: Arc<dyn LoadRunner>, stream: &StreamConfig) -> Self {
        let (event_tx, _) = broadcast::channel(stream.event_channel_capacity.max(1));
        Self {
            window: Arc::new(RwLock::new(SampleWindow::new(stream.window_capacity))),
            event_tx,
            runner,
            started_at: Instant::now(),
            keep_alive_secs: stream.keep_alive_secs,
        }
    }
}

/// 전체 라우터 구성
pub fn build_router(state: AppState, cors_allow_any: bool) -> Router {
    let router = Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::root_routes())
        .layer(TraceLayer::new_for_http());

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// 실행기 이벤트를 실시간 피드로 전달
///
/// 실행기 채널이 닫히면 종료한다.
pub fn spawn_run_event_forwarder(
    mut rx: broadcast::Receiver<swarmboard_core::models::run::RunEvent>,
    event_tx: broadcast::Sender<StreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!("실행 이벤트 전달: {}", event.status_text());
                    let _ = event_tx.send(StreamEvent::Run(RunNotice::from(&event)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("실행 이벤트 {skipped}개 누락");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// 메트릭 릴레이 서버
pub struct WebServer {
    config: WebConfig,
    state: AppState,
}

impl WebServer {
    /// 새 웹 서버 생성
    pub fn new(config: WebConfig, stream: &StreamConfig, runner: Arc<dyn LoadRunner>) -> Self {
        Self {
            config,
            state: AppState::new(runner, stream),
        }
    }

    /// 포트 바인드
    ///
    /// 설정 포트부터 시작해 이미 사용 중이면 다음 포트를 시도한다 (최대 10개).
    pub async fn bind(&self) -> Result<TcpListener, std::io::Error> {
        let host = if self.config.allow_external {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let base_port = self.config.port;
        let mut last_error = None;

        for attempt in 0..MAX_PORT_ATTEMPTS {
            let port = match base_port.checked_add(attempt) {
                Some(port) => port,
                None => break,
            };

            let addr: SocketAddr = match format!("{host}:{port}").parse() {
                Ok(a) => a,
                Err(e) => {
                    error!("잘못된 주소 {host}:{port}: {e}");
                    continue;
                }
            };

            match TcpListener::bind(addr).await {
                Ok(listener) => {
                    if attempt > 0 {
                        warn!("포트 {base_port} 사용 불가, 대체 포트 {port} 사용");
                    }
                    return Ok(listener);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                    warn!("포트 {port} 이미 사용 중, 다음 포트 시도...");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                format!(
                    "포트 {}-{} 모두 사용 불가",
                    base_port,
                    base_port.saturating_add(MAX_PORT_ATTEMPTS - 1)
                ),
            )
        }))
    }

    /// 바인드된 리스너로 서버 실행
    ///
    /// `shutdown_rx`가 `true`가 되면 graceful shutdown.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), std::io::Error> {
        let forwarder =
            spawn_run_event_forwarder(self.state.runner.subscribe(), self.state.event_tx.clone());
        let app = build_router(self.state, self.config.cors_allow_any);

        info!("메트릭 릴레이 서버 시작: http://{}", listener.local_addr()?);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                loop {
                    if *shutdown_rx.borrow() {
                        info!("웹 서버 종료 신호 수신");
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await;

        forwarder.abort();
        info!("메트릭 릴레이 서버 종료");
        result
    }

    /// 바인드 후 실행
    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> Result<(), std::io::Error> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_rx).await
    }
}
