//! 로그 수집 모듈 -- 원시 라인을 읽어 정규화된 이벤트로 전달합니다.
//!
//! # 수집 소스
//! - [`FileTailer`]: 파일 하나를 `tail -f` 방식으로 추적 (로테이션 감지 포함)
//! - [`StdinCollector`]: 표준 입력에서 라인 수집
//!
//! # 아키텍처
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 라인을 읽는 즉시
//! [`Normalizer`](crate::parser::Normalizer)로 정규화한 뒤
//! `tokio::mpsc::Sender<Event>` 채널(스트림별 bounded 큐)로 전달합니다.
//! 큐가 가득 차면 수집기는 전송 태스크가 비울 때까지 대기합니다.

pub mod file;
pub mod file_id;
mod line;
pub mod stdin;

pub use file::{FileTailer, TailerConfig};
pub use file_id::FileId;
pub use stdin::StdinCollector;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Tailer 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailState {
    /// 아직 열지 않음
    Closed,
    /// 파일을 열고 읽는 중
    Open,
    /// 파일이 없거나 교체되어 재시도 대기 중
    Reconnecting,
    /// 취소되어 종료됨
    Terminated,
}

impl TailState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::Reconnecting => 2,
            Self::Terminated => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::Reconnecting,
            3 => Self::Terminated,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for TailState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Tailer 태스크 밖에서 상태를 조회하기 위한 공유 핸들
///
/// Tailer가 상태를 갱신하고, 파이프라인의 health check가 읽습니다.
#[derive(Debug)]
pub struct TailStatus {
    state: AtomicU8,
    lines: AtomicU64,
    rotations: AtomicU64,
}

impl TailStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(TailState::Closed.as_u8()),
            lines: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        })
    }

    /// 현재 상태
    pub fn state(&self) -> TailState {
        TailState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 지금까지 읽은 라인 수
    pub fn lines_read(&self) -> u64 {
        self.lines.load(Ordering::Relaxed)
    }

    /// 감지한 로테이션 수 (copy-truncate 포함)
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    pub(crate) fn set_state(&self, state: TailState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn record_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }
}
