//! 메트릭 샘플 모델.
//!
//! Locust 측 이벤트 훅이 1초마다 전송하는 집계 스냅샷.
//! 식별자는 없으며 도착 순서가 곧 순서다.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// 단일 메트릭 샘플
///
/// 모든 필드는 기본값을 가지므로 `{timestamp, response_time}` 같은
/// 축약 형태도 파싱된다. 숫자 필드는 정수/실수/`null`을 모두 받는다.
/// 알 수 없는 필드는 `extra`에 보존된다.
///
/// 윈도우 집계용 타입이다. 릴레이는 수신한 원본 JSON을 그대로 보낸다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// 측정 시각 (유닉스 초, 소수점 이하 버림)
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp: i64,
    /// 활성 가상 사용자 수
    #[serde(default, deserialize_with = "lenient_u64")]
    pub users: u64,
    /// 초당 요청 수
    #[serde(default, deserialize_with = "nullable_f64")]
    pub rps: f64,
    /// 누적 요청 수
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_requests: u64,
    /// 누적 실패 수
    #[serde(default, deserialize_with = "lenient_u64")]
    pub failures: u64,
    /// 평균 응답 시간 (ms)
    #[serde(default, deserialize_with = "nullable_f64")]
    pub avg_response_time: f64,
    /// 중앙값 응답 시간 (ms)
    #[serde(default, deserialize_with = "nullable_f64")]
    pub median_response_time: f64,
    /// 최소 응답 시간 (ms)
    #[serde(default, deserialize_with = "nullable_f64")]
    pub min_response_time: f64,
    /// 최대 응답 시간 (ms)
    #[serde(default, deserialize_with = "nullable_f64")]
    pub max_response_time: f64,
    /// 95 백분위 응답 시간 (ms)
    #[serde(default, deserialize_with = "nullable_f64")]
    pub p95: f64,
    /// 단일 요청 지연 (ms) — 요청 단위 이미터 형태
    #[serde(
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_time: Option<f64>,
    /// 그 외 필드 (그대로 전달)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 샘플을 구성하는 알려진 필드 이름
pub const SAMPLE_FIELDS: &[&str] = &[
    "timestamp",
    "users",
    "rps",
    "total_requests",
    "failures",
    "avg_response_time",
    "median_response_time",
    "min_response_time",
    "max_response_time",
    "p95",
    "response_time",
];

/// 숫자 또는 숫자 문자열만 값으로 본다. `null`과 그 외 타입은 `None`.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Locust는 요청이 없을 때 일부 통계를 `null`로 보낸다
fn nullable_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_f64(deserializer)?.unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(numeric(&value).filter(|v| v.is_finite()))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_i64() {
        Some(v) => v,
        None => numeric(&value)
            .filter(|v| v.is_finite())
            .map(|v| v.trunc() as i64)
            .unwrap_or(0),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_u64() {
        Some(v) => v,
        None => numeric(&value)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.trunc() as u64)
            .unwrap_or(0),
    })
}

impl MetricsSample {
    /// 수신한 JSON 값을 샘플로 변환
    ///
    /// JSON 객체만 허용한다. 배열/스칼라는 유효성 에러.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::validation(
                "sample",
                "metrics sample must be a JSON object",
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// 실패율 (0.0 ~ 1.0). 요청이 없으면 0.
    pub fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.failures as f64 / self.total_requests as f64
        }
    }

    /// 대표 지연값 (ms)
    ///
    /// 집계 형태면 평균 응답 시간, 요청 단위 형태면 `response_time`.
    pub fn headline_latency(&self) -> f64 {
        match self.response_time {
            Some(rt) if self.avg_response_time == 0.0 => rt,
            _ => self.avg_response_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_short_emitter_shape() {
        let sample: MetricsSample =
            serde_json::from_str(r#"{"timestamp": 1717000000, "response_time": 87}"#).unwrap();
        assert_eq!(sample.timestamp, 1_717_000_000);
        assert_eq!(sample.response_time, Some(87.0));
        assert_eq!(sample.headline_latency(), 87.0);
        assert_eq!(sample.total_requests, 0);
    }

    #[test]
    fn null_statistics_become_zero() {
        let sample: MetricsSample =
            serde_json::from_str(r#"{"timestamp": 1, "median_response_time": null, "p95": null}"#)
                .unwrap();
        assert_eq!(sample.median_response_time, 0.0);
        assert_eq!(sample.p95, 0.0);
    }

    #[test]
    fn unknown_fields_survive_relay() {
        let value = json!({"timestamp": 5, "rps": 3.5, "worker": "w-1"});
        let sample = MetricsSample::from_value(value).unwrap();
        assert_eq!(sample.extra.get("worker"), Some(&json!("w-1")));

        let relayed = serde_json::to_value(&sample).unwrap();
        assert_eq!(relayed["worker"], "w-1");
        assert_eq!(relayed["rps"], 3.5);
        assert!(relayed.get("response_time").is_none());
    }

    #[test]
    fn numeric_fields_are_lenient() {
        let sample = MetricsSample::from_value(json!({
            "timestamp": 1717000000.5,
            "users": null,
            "total_requests": 12.0,
            "failures": "3",
            "rps": "n/a",
            "response_time": null
        }))
        .unwrap();
        assert_eq!(sample.timestamp, 1_717_000_000);
        assert_eq!(sample.users, 0);
        assert_eq!(sample.total_requests, 12);
        assert_eq!(sample.failures, 3);
        assert_eq!(sample.rps, 0.0);
        assert_eq!(sample.response_time, None);
    }

    #[test]
    fn any_object_is_a_sample() {
        let sample = MetricsSample::from_value(json!({"users": -4, "p95": true})).unwrap();
        assert_eq!(sample.users, 0);
        assert_eq!(sample.p95, 0.0);
    }

    #[test]
    fn non_object_rejected() {
        let err = MetricsSample::from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn error_rate_without_requests() {
        let sample = MetricsSample {
            failures: 4,
            ..Default::default()
        };
        assert_eq!(sample.error_rate(), 0.0);
    }

    #[test]
    fn error_rate_with_requests() {
        let sample = MetricsSample {
            total_requests: 200,
            failures: 50,
            ..Default::default()
        };
        assert!((sample.error_rate() - 0.25).abs() < f64::EPSILON);
    }
}
