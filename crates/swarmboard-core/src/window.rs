//! 롤링 샘플 윈도우.
//!
//! 최근 `capacity`개의 메트릭 샘플만 도착 순서대로 유지한다.
//! 가득 찬 상태에서 새 샘플이 들어오면 가장 오래된 샘플을 버린다.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::models::sample::MetricsSample;

/// 기본 윈도우 크기
pub const DEFAULT_WINDOW_CAPACITY: usize = 100;

/// 고정 크기 샘플 버퍼
///
/// 불변식: `len() <= capacity()`.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<MetricsSample>,
}

/// 윈도우 집계 요약
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    /// 윈도우 내 샘플 수
    pub sample_count: usize,
    /// 가장 최근 샘플
    pub latest: Option<MetricsSample>,
    /// 최대 RPS
    pub peak_rps: f64,
    /// 최대 동시 사용자 수
    pub peak_users: u64,
    /// 윈도우 내 최대 응답 시간 (ms)
    pub max_response_time: f64,
    /// 평균 응답 시간들의 평균 (ms)
    pub mean_avg_response_time: f64,
    /// 최신 샘플 기준 실패율
    pub latest_error_rate: f64,
}

impl SampleWindow {
    /// 새 윈도우 생성 (capacity는 최소 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// 샘플 추가
    ///
    /// 가득 차 있으면 가장 오래된 샘플을 제거해 반환한다.
    pub fn push(&mut self, sample: MetricsSample) -> Option<MetricsSample> {
        let evicted = if self.samples.len() >= self.capacity {
            self.samples.pop_front()
        } else {
            None
        };
        self.samples.push_back(sample);
        evicted
    }

    /// 최대 보관 개수
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 현재 샘플 수
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 가장 최근 샘플
    pub fn latest(&self) -> Option<&MetricsSample> {
        self.samples.back()
    }

    /// 전체 비우기
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// 도착 순서대로 순회
    pub fn iter(&self) -> impl Iterator<Item = &MetricsSample> {
        self.samples.iter()
    }

    /// 최근 `n`개 (도착 순서)
    pub fn recent(&self, n: usize) -> Vec<MetricsSample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).cloned().collect()
    }

    /// 전체 복제본 (도착 순서)
    pub fn to_vec(&self) -> Vec<MetricsSample> {
        self.samples.iter().cloned().collect()
    }

    /// 크기 변경. 줄어들면 오래된 샘플부터 버린다.
    pub fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// 윈도우 집계
    pub fn summary(&self) -> WindowSummary {
        if self.samples.is_empty() {
            return WindowSummary::default();
        }

        let count = self.samples.len();
        let mut summary = WindowSummary {
            sample_count: count,
            latest: self.samples.back().cloned(),
            ..Default::default()
        };

        let mut latency_sum = 0.0;
        for s in &self.samples {
            summary.peak_rps = summary.peak_rps.max(s.rps);
            summary.peak_users = summary.peak_users.max(s.users);
            summary.max_response_time = summary
                .max_response_time
                .max(s.max_response_time)
                .max(s.response_time.unwrap_or(0.0));
            latency_sum += s.headline_latency();
        }
        summary.mean_avg_response_time = latency_sum / count as f64;
        summary.latest_error_rate = summary
            .latest
            .as_ref()
            .map(MetricsSample::error_rate)
            .unwrap_or(0.0);

        summary
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
