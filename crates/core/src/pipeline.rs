//! 파이프라인 trait -- 데몬이 관리하는 모듈의 생명주기 정의

use std::future::Future;

use serde::Serialize;

use crate::error::LoghaulError;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작은 하지만 주의 필요 (사유 포함)
    Degraded(String),
    /// 비정상 (사유 포함)
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 데몬이 start/stop/health_check 순서로 관리하는 모듈 trait
///
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
pub trait Pipeline: Send {
    /// 모듈을 시작합니다. 이미 실행 중이면 `PipelineError::AlreadyRunning`.
    fn start(&mut self) -> impl Future<Output = Result<(), LoghaulError>> + Send;

    /// 모듈을 정지합니다. 실행 중이 아니면 `PipelineError::NotRunning`.
    fn stop(&mut self) -> impl Future<Output = Result<(), LoghaulError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("queue".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("queue".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }
}
