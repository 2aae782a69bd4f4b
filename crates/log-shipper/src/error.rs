//! 로그 전송 파이프라인 에러 타입
//!
//! [`LogShipperError`]는 탐색, 테일링, 정규화, 전송 중 발생하는 에러를 표현합니다.
//! `From<LogShipperError> for TailstreamError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use tailstream_core::error::{PipelineError, TailstreamError};

/// 로그 전송 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogShipperError {
    /// 수집기 에러 (파일 I/O, stdin 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file, stdin)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 수집 서버가 2xx 이외의 상태로 응답
    #[error("ship rejected with status {status}: {body}")]
    Ship {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문 (최대 1 KiB)
        body: String,
    },

    /// 전송 계층 에러 (연결 실패, 타임아웃 등)
    #[error("transport error: {0}")]
    Transport(String),

    /// 이벤트 직렬화 실패
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<reqwest::Error> for LogShipperError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<LogShipperError> for TailstreamError {
    fn from(err: LogShipperError) -> Self {
        match err {
            LogShipperError::Io(e) => TailstreamError::Io(e),
            other => TailstreamError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}
