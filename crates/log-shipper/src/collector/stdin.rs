//! 표준 입력 수집기
//!
//! 파이프로 들어온 라인을 정규화해 스트림 하나로 보냅니다.
//! 입력이 끝나면(EOF) 종료하며, 송신측이 닫히므로 전송 태스크가 남은 배치를 비웁니다.

use std::sync::Arc;

use metrics::counter;
use tokio::io::{AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tailstream_core::event::{Event, LogLine};
use tailstream_core::metrics as m;

use super::line::LineBuffer;
use crate::error::LogShipperError;
use crate::parser::Normalizer;

/// 라인 출처로 기록되는 이름
pub const STDIN_SOURCE: &str = "stdin";

/// 표준 입력(또는 임의의 `AsyncRead`) 라인 수집기
pub struct StdinCollector<R> {
    reader: BufReader<R>,
    stream: String,
    normalizer: Arc<Normalizer>,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    max_line_bytes: usize,
}

impl<R: AsyncRead + Unpin> StdinCollector<R> {
    pub fn new(
        reader: R,
        stream: impl Into<String>,
        normalizer: Arc<Normalizer>,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
        max_line_bytes: usize,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            stream: stream.into(),
            normalizer,
            tx,
            cancel,
            max_line_bytes,
        }
    }

    /// EOF 또는 취소까지 라인을 수집합니다. 읽은 라인 수를 반환합니다.
    pub async fn run(mut self) -> Result<u64, LogShipperError> {
        info!(stream = %self.stream, "reading lines from stdin");
        let mut line = LineBuffer::new(self.max_line_bytes);
        let mut lines = 0u64;

        loop {
            let filled = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = line.read_from(&mut self.reader) => {
                    result.map_err(|e| LogShipperError::Collector {
                        source_type: STDIN_SOURCE.to_owned(),
                        reason: format!("read error: {e}"),
                    })?
                }
            };
            // EOF: 개행 없이 끝난 마지막 라인만 남음
            if !filled.complete && line.consumed() == 0 {
                debug!(stream = %self.stream, lines, "stdin closed");
                break;
            }

            let (buf, truncated) = line.take();
            if truncated {
                counter!(m::TAILER_LINES_TRUNCATED_TOTAL, m::LABEL_STREAM => self.stream.clone())
                    .increment(1);
            }

            lines += 1;
            counter!(m::TAILER_LINES_READ_TOTAL, m::LABEL_STREAM => self.stream.clone())
                .increment(1);

            let line = LogLine::new(STDIN_SOURCE, String::from_utf8_lossy(&buf).into_owned());
            let Some(event) = self.normalizer.normalize(&line) else {
                continue;
            };
            if self.tx.send(event).await.is_err() {
                return Err(LogShipperError::Channel("stream queue closed".to_owned()));
            }
        }

        info!(stream = %self.stream, lines, "stdin collector finished");
        Ok(lines)
    }
}
