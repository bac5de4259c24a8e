//! # swarmboard-network
//!
//! 릴레이 서버 클라이언트 어댑터.
//! REST 제어/조회, 인증 API, WebSocket 실시간 스트림을 담당한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use swarmboard_network::http_client::HttpControlClient;
//! use swarmboard_network::ws_client::MetricsStreamClient;
//!
//! let client = HttpControlClient::new("http://localhost:8000", timeout)?;
//! let (_task, rx) = MetricsStreamClient::new("http://localhost:8000", 30)?.spawn();
//! ```

pub mod auth;
pub mod http_client;
pub mod live_window;
pub mod ws_client;
