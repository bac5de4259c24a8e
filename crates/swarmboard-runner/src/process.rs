//! Locust 프로세스 감독.
//!
//! 한 번에 하나의 실행만 허용한다. 실행마다 감독 태스크가 자식 프로세스를
//! 소유하며, 자연 종료와 중지 요청 중 먼저 오는 쪽을 처리한다.

use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use swarmboard_core::config::RunnerConfig;
use swarmboard_core::error::CoreError;
use swarmboard_core::models::run::{RunEvent, RunInfo, RunRequest, RunState, RunStatus};
use swarmboard_core::ports::runner::LoadRunner;

/// 강제 종료 후 프로세스 회수 대기
const KILL_WAIT: Duration = Duration::from_secs(5);

const ALREADY_RUNNING: &str = "Locust already running.";
const NOT_RUNNING: &str = "Locust is not running.";

/// 중지 요청: 감독 태스크가 최종 이벤트를 돌려보낸다
type StopRequest = oneshot::Sender<RunEvent>;

/// 진행 중인 실행
struct ActiveRun {
    info: RunInfo,
    state: RunState,
    stop_tx: Option<oneshot::Sender<StopRequest>>,
}

/// Locust 자식 프로세스 실행기
pub struct LocustProcessRunner {
    config: RunnerConfig,
    active: Arc<Mutex<Option<ActiveRun>>>,
    event_tx: broadcast::Sender<RunEvent>,
}

impl LocustProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            active: Arc::new(Mutex::new(None)),
            event_tx,
        }
    }

    /// 실행 요청으로 명령 구성
    ///
    /// `program [extra_args…] -f <locustfile> --headless -u <users> -r <rate> -t <time> --host <host>`
    pub fn build_command(&self, request: &RunRequest) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.extra_args)
            .arg("-f")
            .arg(&self.config.locustfile)
            .arg("--headless")
            .arg("-u")
            .arg(request.users.to_string())
            .arg("-r")
            .arg(request.rate.to_string())
            .arg("-t")
            .arg(request.time.trim())
            .arg("--host")
            .arg(&request.host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.config.stop_timeout_secs)
    }
}

#[async_trait]
impl LoadRunner for LocustProcessRunner {
    async fn start(&self, request: &RunRequest) -> Result<RunInfo, CoreError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(CoreError::Conflict(ALREADY_RUNNING.to_string()));
        }
        request.validate()?;

        let mut child = self.build_command(request).spawn().map_err(|e| {
            error!("Locust 실행 실패 ({}): {e}", self.config.program);
            CoreError::Process(format!("failed to spawn '{}': {e}", self.config.program))
        })?;

        let info = RunInfo::new(request.clone(), child.id());
        forward_output(&mut child, info.run_id);

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(supervise(
            child,
            info.run_id,
            stop_rx,
            Arc::clone(&self.active),
            self.event_tx.clone(),
            self.stop_timeout(),
        ));

        *active = Some(ActiveRun {
            info: info.clone(),
            state: RunState::Running,
            stop_tx: Some(stop_tx),
        });
        // 잠금을 쥔 채 보내야 즉시 종료된 실행의 Exited보다 앞선다
        let _ = self.event_tx.send(RunEvent::Started(info.clone()));
        drop(active);

        info!(
            run_id = %info.run_id,
            pid = ?info.pid,
            users = request.users,
            rate = request.rate,
            time = %request.time,
            host = %request.host,
            "Locust 시작"
        );
        Ok(info)
    }

    async fn stop(&self) -> Result<RunEvent, CoreError> {
        let stop_tx = {
            let mut active = self.active.lock().await;
            let run = active
                .as_mut()
                .ok_or_else(|| CoreError::Conflict(NOT_RUNNING.to_string()))?;
            let stop_tx = run
                .stop_tx
                .take()
                .ok_or_else(|| CoreError::Conflict(NOT_RUNNING.to_string()))?;
            run.state = RunState::Stopping;
            info!(run_id = %run.info.run_id, "Locust 중지 요청");
            stop_tx
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        // 감독 태스크가 이미 자연 종료를 처리했다면 수신 측이 없다
        stop_tx
            .send(reply_tx)
            .map_err(|_| CoreError::Conflict(NOT_RUNNING.to_string()))?;
        reply_rx
            .await
            .map_err(|_| CoreError::Internal("runner supervisor dropped stop reply".to_string()))
    }

    async fn status(&self) -> RunStatus {
        match self.active.lock().await.as_ref() {
            Some(run) => RunStatus::from_run(run.state, run.info.clone()),
            None => RunStatus::idle(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.event_tx.subscribe()
    }
}

/// 실행 하나를 끝까지 감독
async fn supervise(
    mut child: Child,
    run_id: Uuid,
    mut stop_rx: oneshot::Receiver<StopRequest>,
    active: Arc<Mutex<Option<ActiveRun>>>,
    event_tx: broadcast::Sender<RunEvent>,
    stop_timeout: Duration,
) {
    let (event, reply) = tokio::select! {
        status = child.wait() => {
            let exit_code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(%run_id, "Locust 종료 대기 실패: {e}");
                    None
                }
            };
            info!(%run_id, ?exit_code, "Locust 종료");
            (RunEvent::Exited { run_id, exit_code }, None)
        }
        Ok(reply) = &mut stop_rx => {
            let exit_code = terminate(&mut child, stop_timeout)
                .await
                .and_then(|status| status.code());
            info!(%run_id, ?exit_code, "Locust 중지됨");
            (RunEvent::Stopped { run_id, exit_code }, Some(reply))
        }
    };

    {
        let mut active = active.lock().await;
        if active.as_ref().map(|run| run.info.run_id) == Some(run_id) {
            *active = None;
        }
        // 잠금 해제 전에 보내야 다음 실행의 Started보다 앞선다
        let _ = event_tx.send(event.clone());
    }

    if let Some(reply) = reply {
        let _ = reply.send(event);
    }
}

/// SIGINT 후 `grace` 동안 기다리고, 그래도 살아 있으면 강제 종료
async fn terminate(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
                warn!("SIGINT 전송 실패 (pid {pid}): {e}");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = child.start_kill() {
            warn!("프로세스 종료 요청 실패: {e}");
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => return Some(status),
        Ok(Err(e)) => error!("Locust 종료 대기 실패: {e}"),
        Err(_) => warn!("Locust가 {}초 안에 종료되지 않아 강제 종료", grace.as_secs()),
    }

    if let Err(e) = child.kill().await {
        error!("Locust 강제 종료 실패: {e}");
    }
    match tokio::time::timeout(KILL_WAIT, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        _ => None,
    }
}

/// 자식 stdout/stderr를 로그로 전달
fn forward_output(child: &mut Child, run_id: Uuid) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(log_lines(stdout, run_id, "stdout"));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(log_lines(stderr, run_id, "stderr"));
    }
}

async fn log_lines<R>(reader: R, run_id: Uuid, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => debug!(%run_id, stream, "{line}"),
            Ok(None) => break,
            Err(e) => {
                debug!(%run_id, stream, "출력 읽기 중단: {e}");
                break;
            }
        }
    }
}
