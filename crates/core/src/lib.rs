//! loghaul 공통 크레이트
//!
//! - [`config`]: `loghaul.toml` 파싱, 환경변수 오버라이드, 검증
//! - [`error`]: 최상위 에러 타입
//! - [`metrics`]: Prometheus 메트릭 이름 상수와 설명 등록
//! - [`pipeline`]: 데몬이 관리하는 모듈의 생명주기 trait

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, LoghaulError, PipelineError};

// 설정
pub use config::LoghaulConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};
