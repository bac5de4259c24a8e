//! # swarmboard-app
//!
//! swarmboard 바이너리 진입점.
//! 설정 로드, 어댑터 와이어링, 서브커맨드 디스패치.

mod commands;
mod lifecycle;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use swarmboard_core::config::AppConfig;
use swarmboard_core::config_manager::ConfigManager;
use swarmboard_core::token_store::TokenStore;
use swarmboard_network::auth::AuthClient;
use swarmboard_network::http_client::HttpControlClient;
use swarmboard_network::ws_client::MetricsStreamClient;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// swarmboard — Locust 부하 테스트 메트릭 릴레이
///
/// 릴레이 서버를 띄우거나, 원격 서버의 부하 테스트를 제어하고 실시간 메트릭을 본다.
#[derive(Parser, Debug)]
#[command(name = "swarmboard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 서버 URL 지정 (기본: 설정 파일, http://localhost:8000)
    #[arg(long, short = 's', global = true)]
    server: Option<String>,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 config.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error). 기본: serve는 info, 그 외 warn
    #[arg(long, short = 'l', global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 메트릭 릴레이 서버 실행
    Serve {
        /// 리스닝 포트 (사용 중이면 다음 포트)
        #[arg(long, short = 'p')]
        port: Option<u16>,
        /// 외부 접속 허용 (0.0.0.0 바인드)
        #[arg(long)]
        external: bool,
        /// 샘플 윈도우 크기
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// 부하 테스트 시작
    Start {
        /// 동시 사용자 수
        #[arg(long, short = 'u')]
        users: Option<u32>,
        /// 초당 스폰 속도
        #[arg(long, short = 'r')]
        rate: Option<f64>,
        /// 실행 시간 (예: 90s, 10m, 1h30m)
        #[arg(long, short = 't')]
        time: Option<String>,
        /// 대상 호스트 URL
        #[arg(long)]
        host: Option<String>,
    },
    /// 부하 테스트 중지
    Stop,
    /// 실행 상태 조회
    Status,
    /// 현재 메트릭 조회
    Metrics {
        /// 최근 N개 샘플 표 출력
        #[arg(long)]
        history: Option<usize>,
        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },
    /// 서버 샘플 윈도우 비우기
    Clear,
    /// 실시간 메트릭 스트림 보기
    Watch {
        /// 로컬 윈도우 크기
        #[arg(long)]
        capacity: Option<usize>,
    },
    /// 로그인
    Login {
        #[arg(long, short = 'e')]
        email: String,
        #[arg(long, env = "SWARMBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// 회원가입 후 로그인
    Signup {
        #[arg(long, short = 'e')]
        email: String,
        #[arg(long, env = "SWARMBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[arg(long)]
        full_name: Option<String>,
    },
    /// 저장된 토큰 삭제
    Logout,
    /// 현재 로그인 사용자
    Whoami,
}

/// 설정 로드 후 CLI 값 반영
fn load_config(args: &Args) -> Result<(AppConfig, PathBuf)> {
    let manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.get();
    if let Some(server) = &args.server {
        config.server.base_url = server.trim_end_matches('/').to_string();
    }
    debug!("설정 파일: {}", manager.config_path().display());
    Ok((config, manager.config_path().to_path_buf()))
}

fn control_client(config: &AppConfig, tokens: &TokenStore) -> Result<HttpControlClient> {
    let token = tokens.load().map(|t| t.access_token);
    Ok(HttpControlClient::new(&config.server.base_url, config.request_timeout())?.with_token(token))
}

async fn run(args: Args) -> Result<()> {
    let (mut config, config_path) = load_config(&args)?;
    let tokens = TokenStore::beside(&config_path);

    match args.command {
        Command::Serve {
            port,
            external,
            capacity,
        } => {
            if let Some(port) = port {
                config.web.port = port;
            }
            if external {
                config.web.allow_external = true;
            }
            if let Some(capacity) = capacity {
                config.stream.window_capacity = capacity;
            }
            config.validate()?;
            commands::serve(config).await
        }
        Command::Start {
            users,
            rate,
            time,
            host,
        } => {
            config.validate()?;
            let request = commands::run_request(&config, users, rate, time, host);
            commands::start(&control_client(&config, &tokens)?, request).await
        }
        Command::Stop => {
            config.validate()?;
            commands::stop(&control_client(&config, &tokens)?).await
        }
        Command::Status => {
            config.validate()?;
            commands::status(&control_client(&config, &tokens)?).await
        }
        Command::Metrics { history, json } => {
            config.validate()?;
            commands::metrics(&control_client(&config, &tokens)?, history, json).await
        }
        Command::Clear => {
            config.validate()?;
            commands::clear(&control_client(&config, &tokens)?).await
        }
        Command::Watch { capacity } => {
            if let Some(capacity) = capacity {
                config.stream.window_capacity = capacity;
            }
            config.validate()?;
            let stream = MetricsStreamClient::new(
                &config.server.base_url,
                config.server.stream_max_retry_secs,
            )?;
            commands::watch(
                &control_client(&config, &tokens)?,
                stream,
                config.stream.window_capacity,
            )
            .await
        }
        Command::Login { email, password } => {
            let auth = AuthClient::new(&config.server.base_url, config.request_timeout(), tokens)?;
            commands::login(&auth, &email, password).await
        }
        Command::Signup {
            email,
            password,
            full_name,
        } => {
            let auth = AuthClient::new(&config.server.base_url, config.request_timeout(), tokens)?;
            commands::signup(&auth, &email, password, full_name).await
        }
        Command::Logout => {
            let auth = AuthClient::new(&config.server.base_url, config.request_timeout(), tokens)?;
            commands::logout(&auth)
        }
        Command::Whoami => {
            let auth = AuthClient::new(&config.server.base_url, config.request_timeout(), tokens)?;
            commands::whoami(&auth).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = match args.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let log_filter = args.log_level.as_deref().unwrap_or(default_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}
