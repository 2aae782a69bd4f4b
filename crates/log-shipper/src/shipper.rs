//! 배치 전송 -- NDJSON 직렬화와 HTTP POST
//!
//! [`BatchSink`] trait이 전송 경계입니다. 운영 환경은 [`HttpShipper`]를 쓰고,
//! 테스트는 기록용 구현체로 교체합니다.
//!
//! # 요청 형식
//! ```text
//! POST {base}/api/ingest/{stream_id}      (또는 스트림 URL 오버라이드)
//! Content-Type: application/x-ndjson
//! Authorization: Bearer {key}             (키가 있을 때만)
//! User-Agent: tailstream-agent/{version} ({os}; {arch})
//!
//! {"a":1}
//! "raw text"
//! ```
//!
//! 실패한 배치는 재시도하지 않습니다. 호출자가 로그를 남기고 버립니다.

use std::future::Future;
use std::time::{Duration, Instant};

use metrics::histogram;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use tailstream_core::config::StreamConfig;
use tailstream_core::event::Event;
use tailstream_core::metrics as m;

use crate::error::LogShipperError;

/// NDJSON 콘텐츠 타입
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// 에러에 보관하는 응답 본문 최대 바이트
pub const MAX_ERROR_BODY_BYTES: usize = 1024;

/// 스트림 하나의 전송 대상 (URL + 인증 키)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipTarget {
    pub url: String,
    pub key: Option<String>,
}

impl ShipTarget {
    /// 스트림 설정에서 전송 대상을 결정합니다.
    ///
    /// - URL: 스트림 URL 오버라이드, 없으면 `{base}/api/ingest/{stream_id}`
    /// - 키: 스트림 전용 키, 없으면 공용 키, 둘 다 없으면 인증 없음
    ///
    /// 스트림 ID와 URL이 모두 비어 있으면 `None`.
    pub fn resolve(
        stream: &StreamConfig,
        base_url: &str,
        fallback_key: Option<&str>,
    ) -> Option<Self> {
        let url = match stream.url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => url.to_owned(),
            None if !stream.stream_id.is_empty() => ingest_url(base_url, &stream.stream_id),
            None => return None,
        };

        let key = stream
            .stream_key()
            .or(fallback_key.filter(|k| !k.is_empty()))
            .map(str::to_owned);

        Some(Self { url, key })
    }
}

/// `{base}/api/ingest/{stream_id}` (base 끝의 `/` 제거)
pub fn ingest_url(base_url: &str, stream_id: &str) -> String {
    format!("{}/api/ingest/{}", base_url.trim_end_matches('/'), stream_id)
}

/// 이벤트 배치를 NDJSON 본문으로 직렬화합니다 (마지막 줄도 개행으로 끝남).
pub fn encode_ndjson(events: &[Event]) -> Result<Vec<u8>, LogShipperError> {
    let mut body = Vec::with_capacity(events.len() * 128);
    for event in events {
        serde_json::to_writer(&mut body, event)?;
        body.push(b'\n');
    }
    Ok(body)
}

/// 에이전트 User-Agent 값
pub fn user_agent() -> String {
    format!(
        "tailstream-agent/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// 배치 전송 경계
pub trait BatchSink: Send + Sync + 'static {
    /// 배치 하나를 대상에 전송합니다. 한 번만 시도합니다.
    fn ship(
        &self,
        target: &ShipTarget,
        events: &[Event],
    ) -> impl Future<Output = Result<(), LogShipperError>> + Send;
}

/// HTTP NDJSON 전송기
#[derive(Debug, Clone)]
pub struct HttpShipper {
    client: reqwest::Client,
}

impl HttpShipper {
    /// 요청 전체에 `timeout`을 적용하는 전송기를 생성합니다.
    pub fn new(timeout: Duration) -> Result<Self, LogShipperError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()?;
        Ok(Self { client })
    }
}

impl BatchSink for HttpShipper {
    async fn ship(&self, target: &ShipTarget, events: &[Event]) -> Result<(), LogShipperError> {
        if events.is_empty() {
            return Ok(());
        }

        let body = encode_ndjson(events)?;
        let bytes = body.len();

        let mut request = self
            .client
            .post(&target.url)
            .header(CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .body(body);
        if let Some(key) = &target.key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let started = Instant::now();
        let response = request.send().await;
        histogram!(m::SHIPPER_REQUEST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        let response = response?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %target.url, events = events.len(), bytes, %status, "batch accepted");
            return Ok(());
        }

        Err(LogShipperError::Ship {
            status: status.as_u16(),
            body: read_error_body(response, MAX_ERROR_BODY_BYTES).await,
        })
    }
}

/// 응답 본문의 앞부분만 읽습니다. 읽기 실패는 본문 자리에 기록합니다.
async fn read_error_body(mut response: reqwest::Response, max: usize) -> String {
    let mut prefix = Vec::new();
    while prefix.len() < max {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let take = chunk.len().min(max - prefix.len());
                prefix.extend_from_slice(&chunk[..take]);
            }
            Ok(None) => break,
            Err(e) => {
                let read = String::from_utf8_lossy(&prefix).into_owned();
                let note = format!("{read}<failed to read body: {e}>");
                return truncate_body(note, max);
            }
        }
    }
    truncate_body(String::from_utf8_lossy(&prefix).into_owned(), max)
}

fn truncate_body(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}
