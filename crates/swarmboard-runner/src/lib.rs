//! # swarmboard-runner
//!
//! [`LoadRunner`](swarmboard_core::ports::runner::LoadRunner) 포트 구현.
//! Locust를 headless 자식 프로세스로 실행하고, 감독 태스크가 종료/중지를 처리한다.

pub mod process;

pub use process::LocustProcessRunner;
