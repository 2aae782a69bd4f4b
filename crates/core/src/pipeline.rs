//! 파이프라인 trait: 모듈 생명주기 정의

use std::fmt;
use std::future::Future;

use crate::error::TailstreamError;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작 중이지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 파이프라인 생명주기 trait
///
/// `tailstream-agent`는 이 trait을 통해 모듈을 시작/정지하고 상태를 조회합니다.
///
/// ```text
/// Initialized → start() → Running → stop() → Stopped
/// ```
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 스폰하고 처리를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), TailstreamError>> + Send;

    /// 모든 태스크를 정지하고 종료될 때까지 대기합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), TailstreamError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
