//! # swarmboard-core
//!
//! swarmboard 도메인 모델, 포트(trait) 정의, 에러 타입.
//! 모든 크레이트가 공유하는 핵심 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`] — 메트릭 샘플, 부하 테스트 실행, 인증 DTO (serde Serialize/Deserialize)
//! - [`window`] — 최근 N개 샘플만 유지하는 롤링 윈도우
//! - [`ports`] — Hexagonal Architecture 포트 인터페이스 (async_trait)
//! - [`error`] — 핵심 에러 타입 (thiserror)
//! - [`config`] — 애플리케이션 설정 구조체
//! - [`config_manager`] — 설정 파일 관리 (로드/저장)
//! - [`token_store`] — 인증 토큰 로컬 저장

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
pub mod token_store;
pub mod window;
