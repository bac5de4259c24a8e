//! 터미널 출력 형식.

use swarmboard_core::models::run::{format_elapsed, RunState, RunStatus};
use swarmboard_core::models::sample::MetricsSample;
use swarmboard_core::ports::control_client::CurrentMetrics;
use swarmboard_core::window::WindowSummary;

/// 응답 시간 표시 (ms, 소수점 한 자리까지)
pub fn format_ms(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// 실시간 통계 한 줄
///
/// 대시보드 상단 카드(사용자, RPS, 요청, 실패, 응답 시간, 업타임)와 같은 항목.
pub fn stat_line(sample: &MetricsSample, uptime_secs: Option<u64>) -> String {
    let uptime = uptime_secs.map(format_elapsed).unwrap_or_else(|| "-".to_string());
    format!(
        "users {users:>4} | rps {rps:>7.2} | reqs {total:>7} | fail {failures:>5} ({rate:.1}%) | \
         avg {avg} med {med} min {min} max {max} p95 {p95} ms | up {uptime}",
        users = sample.users,
        rps = sample.rps,
        total = sample.total_requests,
        failures = sample.failures,
        rate = sample.error_rate() * 100.0,
        avg = format_ms(sample.avg_response_time),
        med = format_ms(sample.median_response_time),
        min = format_ms(sample.min_response_time),
        max = format_ms(sample.max_response_time),
        p95 = format_ms(sample.p95),
    )
}

/// 실행 상태 요약
pub fn status_lines(status: &RunStatus) -> Vec<String> {
    let state = match status.state {
        RunState::Idle => "idle",
        RunState::Running => "running",
        RunState::Stopping => "stopping",
    };
    let mut lines = vec![format!("상태: {state}")];

    if let Some(run) = &status.run {
        lines.push(format!("실행 ID: {}", run.run_id));
        lines.push(format!(
            "사용자 {} / 스폰 {}/s / 시간 {} / 대상 {}",
            run.request.users, run.request.rate, run.request.time, run.request.host
        ));
        if let Some(pid) = run.pid {
            lines.push(format!("PID: {pid}"));
        }
        lines.push(format!("업타임: {}", status.elapsed_display));
    }
    lines
}

/// 윈도우 집계 요약
pub fn summary_lines(summary: &WindowSummary, capacity: usize) -> Vec<String> {
    vec![
        format!("샘플: {}/{capacity}", summary.sample_count),
        format!("최대 RPS: {:.2}", summary.peak_rps),
        format!("최대 사용자: {}", summary.peak_users),
        format!("최대 응답 시간: {} ms", format_ms(summary.max_response_time)),
        format!(
            "평균 응답 시간: {} ms",
            format_ms(summary.mean_avg_response_time)
        ),
        format!("실패율: {:.1}%", summary.latest_error_rate * 100.0),
    ]
}

/// `metrics` 명령 출력
pub fn current_report(current: &CurrentMetrics) -> Vec<String> {
    let mut lines = match &current.latest {
        Some(sample) => vec![stat_line(sample, None)],
        None => vec!["아직 수신한 샘플이 없습니다.".to_string()],
    };
    lines.extend(summary_lines(&current.summary, current.capacity));
    lines
}

/// 최근 샘플 표
pub fn history_table(samples: &[MetricsSample]) -> Vec<String> {
    let mut lines = vec![format!(
        "{:>12} {:>6} {:>8} {:>8} {:>6} {:>8} {:>8}",
        "timestamp", "users", "rps", "reqs", "fail", "avg", "p95"
    )];
    for sample in samples {
        lines.push(format!(
            "{:>12} {:>6} {:>8.2} {:>8} {:>6} {:>8} {:>8}",
            sample.timestamp,
            sample.users,
            sample.rps,
            sample.total_requests,
            sample.failures,
            format_ms(sample.headline_latency()),
            format_ms(sample.p95),
        ));
    }
    lines
}
