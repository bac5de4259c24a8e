//! 클라이언트 측 라이브 윈도우.
//!
//! 스트림 메시지를 받아 최근 샘플과 실행 여부를 유지한다.

use swarmboard_core::models::run::{STATUS_EXITED, STATUS_STARTED, STATUS_STOPPED};
use swarmboard_core::models::sample::MetricsSample;
use swarmboard_core::window::{SampleWindow, WindowSummary};
use uuid::Uuid;

use crate::ws_client::StreamMessage;

#[derive(Debug, Clone)]
pub struct LiveWindow {
    window: SampleWindow,
    running: bool,
    /// 마지막으로 시작된 실행
    current_run: Option<Uuid>,
    connected: bool,
    last_status: Option<String>,
}

impl LiveWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: SampleWindow::new(capacity),
            running: false,
            current_run: None,
            connected: false,
            last_status: None,
        }
    }

    /// 메시지 반영
    pub fn apply(&mut self, message: &StreamMessage) {
        match message {
            StreamMessage::Sample(sample) => {
                self.window.push(sample.clone());
            }
            StreamMessage::Run { status, run_id } => {
                if status == STATUS_STARTED {
                    self.running = true;
                    self.current_run = *run_id;
                } else if status == STATUS_STOPPED || status == STATUS_EXITED {
                    // 이전 실행의 늦은 종료 알림은 현재 실행을 끄지 않는다
                    if is_stale(*run_id, self.current_run) {
                        return;
                    }
                    self.running = false;
                    self.current_run = None;
                }
                self.last_status = Some(status.clone());
            }
            StreamMessage::Connected => self.connected = true,
            StreamMessage::Disconnected { .. } => self.connected = false,
        }
    }

    /// 실행 여부 초기값 (시작 시 서버 상태 조회 결과)
    pub fn set_running(&mut self, running: bool, run_id: Option<Uuid>) {
        self.running = running;
        self.current_run = if running { run_id } else { None };
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.window.latest()
    }

    pub fn summary(&self) -> WindowSummary {
        self.window.summary()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// 화면 "Clear" 버튼
    pub fn clear(&mut self) {
        self.window.clear();
    }
}

/// 두 실행 ID가 모두 알려져 있고 서로 다를 때
pub fn is_stale(notice: Option<Uuid>, current: Option<Uuid>) -> bool {
    matches!((notice, current), (Some(notice), Some(current)) if notice != current)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str) -> StreamMessage {
        StreamMessage::Run {
            status: status.to_string(),
            run_id: None,
        }
    }

    #[test]
    fn running_flag_follows_notices() {
        let mut live = LiveWindow::new(5);
        assert!(!live.is_running());

        live.apply(&run("Locust started"));
        assert!(live.is_running());

        live.apply(&run("Locust exited"));
        assert!(!live.is_running());
        assert_eq!(live.last_status(), Some("Locust exited"));

        live.set_running(true, None);
        live.apply(&run("Locust stopped"));
        assert!(!live.is_running());
    }

    #[test]
    fn late_exit_of_previous_run_is_ignored() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let notice = |status: &str, id: Uuid| StreamMessage::Run {
            status: status.to_string(),
            run_id: Some(id),
        };

        let mut live = LiveWindow::new(5);
        live.set_running(true, Some(second));
        live.apply(&notice("Locust exited", first));
        assert!(live.is_running());
        assert_eq!(live.last_status(), None);

        live.apply(&notice("Locust stopped", second));
        assert!(!live.is_running());

        live.apply(&notice("Locust started", first));
        live.apply(&notice("Locust exited", second));
        assert!(live.is_running());
        live.apply(&notice("Locust exited", first));
        assert!(!live.is_running());
    }

    #[test]
    fn samples_are_bounded() {
        let mut live = LiveWindow::new(2);
        for ts in 1..=4 {
            live.apply(&StreamMessage::Sample(MetricsSample {
                timestamp: ts,
                ..Default::default()
            }));
        }
        assert_eq!(live.len(), 2);
        assert_eq!(live.latest().unwrap().timestamp, 4);

        live.clear();
        assert!(live.is_empty());
    }

    #[test]
    fn connection_state() {
        let mut live = LiveWindow::new(2);
        live.apply(&StreamMessage::Connected);
        assert!(live.is_connected());
        live.apply(&StreamMessage::Disconnected { retry_in_secs: 2 });
        assert!(!live.is_connected());
    }
}
