//! 파일 Tailer
//!
//! 파일 하나를 감시하며 새로 추가된 라인을 정규화해 스트림 큐로 보냅니다.
//!
//! # 상태 전이
//! ```text
//! Closed -> Open <-> Reconnecting -> Terminated
//! ```
//!
//! - 시작 시 파일 끝으로 이동합니다. 에이전트 시작 이전 내용은 보내지 않습니다.
//! - EOF에서는 폴링 간격만큼 대기 후 다시 읽습니다.
//! - 로테이션 검사는 독립된 주기로 실행됩니다.
//!   - 경로가 사라졌거나 dev/inode가 바뀌면: 기존 핸들에 남은 라인을 마저 읽고 닫은 뒤 재연결
//!   - 같은 파일인데 크기가 읽은 위치보다 작으면 (copy-truncate): 처음으로 되감기
//! - 재연결 위치는 닫힌 이유에 따라 다릅니다 ([`Reopen`]).
//!   - 시작 시 파일이 없었거나 로테이션 이후: 오프셋 0 (새로 생긴 파일)
//!   - 시작 시 있었지만 열 수 없었음 (권한 등): 파일 끝
//!   - 같은 파일의 읽기 오류: 마지막으로 완성된 라인 직후
//! - 한 줄은 최대 길이까지만 메모리에 보관하고 나머지는 버립니다.
//! - 개행이 오기 전의 부분 라인은 버퍼에 남겨 두고 두 조각으로 내보내지 않습니다.

use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tailstream_core::event::{Event, LogLine};
use tailstream_core::metrics as m;

use super::line::LineBuffer;
use super::{FileId, TailState, TailStatus};
use crate::config::ShipperConfig;
use crate::parser::Normalizer;

/// Tailer 타이밍/크기 설정
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// EOF 이후 재시도 간격
    pub poll_interval: Duration,
    /// 로테이션 검사 주기
    pub rotation_check_interval: Duration,
    /// 재연결 시도 주기
    pub reconnect_interval: Duration,
    /// 한 줄 최대 바이트 (초과분은 잘림)
    pub max_line_bytes: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            rotation_check_interval: Duration::from_secs(5),
            reconnect_interval: Duration::from_secs(5),
            max_line_bytes: 1024 * 1024,
        }
    }
}

impl TailerConfig {
    pub fn from_shipper(config: &ShipperConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            rotation_check_interval: config.rotation_check_interval(),
            reconnect_interval: config.reconnect_interval(),
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// 재연결 시 읽기 시작 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reopen {
    /// 처음부터 (새로 생긴 파일)
    FromStart,
    /// 파일 끝부터 (시작 이전 내용은 건너뜀)
    AtEnd,
    /// 같은 파일이면 `offset`부터, 다른 파일이거나 짧아졌으면 처음부터
    Resume {
        file_id: Option<FileId>,
        offset: u64,
    },
}

impl Reopen {
    /// 첫 열기 실패 이후의 재연결 방식
    fn after_failed_first_open(error: &io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            Self::FromStart
        } else {
            Self::AtEnd
        }
    }

    fn seek_for(self, current: Option<FileId>, len: u64) -> SeekFrom {
        match self {
            Self::FromStart => SeekFrom::Start(0),
            Self::AtEnd => SeekFrom::End(0),
            Self::Resume { file_id, offset } if file_id == current && offset <= len => {
                SeekFrom::Start(offset)
            }
            Self::Resume { .. } => SeekFrom::Start(0),
        }
    }
}

/// 루프 진행 여부
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// 파일 하나를 추적하는 Tailer
///
/// `run()`은 취소될 때까지 반환하지 않으며 어떤 I/O 에러도 호출자에게
/// 올리지 않습니다. `tokio::spawn`으로 별도 태스크에서 실행하세요.
pub struct FileTailer {
    path: PathBuf,
    source: String,
    stream: String,
    config: TailerConfig,
    normalizer: Arc<Normalizer>,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    status: Arc<TailStatus>,
    reader: Option<BufReader<File>>,
    file_id: Option<FileId>,
    /// 현재 핸들에서 소비한 바이트 위치 (부분 라인 포함)
    position: u64,
    /// 개행을 기다리는 부분 라인
    line: LineBuffer,
    reopen: Reopen,
    retry_at: Instant,
}

impl FileTailer {
    /// 새 Tailer를 생성합니다.
    pub fn new(
        path: impl Into<PathBuf>,
        stream: impl Into<String>,
        config: TailerConfig,
        normalizer: Arc<Normalizer>,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
    ) -> Self {
        let path = path.into();
        Self {
            source: path.display().to_string(),
            path,
            stream: stream.into(),
            normalizer,
            tx,
            cancel,
            status: TailStatus::new(),
            reader: None,
            file_id: None,
            position: 0,
            line: LineBuffer::new(config.max_line_bytes),
            reopen: Reopen::AtEnd,
            retry_at: Instant::now(),
            config,
        }
    }

    /// 상태 조회 핸들
    pub fn status(&self) -> Arc<TailStatus> {
        Arc::clone(&self.status)
    }

    /// 취소될 때까지 파일을 추적합니다.
    pub async fn run(mut self) {
        info!(stream = %self.stream, path = %self.source, "starting tailer");
        gauge!(m::TAILER_FILES_ACTIVE).increment(1.0);

        match self.open().await {
            Ok(()) => debug!(path = %self.source, offset = self.position, "opened at end of file"),
            Err(e) => {
                warn!(path = %self.source, error = %e, "file not available, will retry");
                self.reopen = Reopen::after_failed_first_open(&e);
                self.enter_reconnecting(self.config.reconnect_interval);
            }
        }

        self.tail_loop().await;

        self.reader = None;
        self.status.set_state(TailState::Terminated);
        gauge!(m::TAILER_FILES_ACTIVE).decrement(1.0);
        info!(stream = %self.stream, path = %self.source, "tailer stopped");
    }

    async fn tail_loop(&mut self) {
        let mut next_check = Instant::now() + self.config.rotation_check_interval;

        loop {
            if self.cancel.is_cancelled() {
                return;
            }

            if Instant::now() >= next_check {
                next_check = Instant::now() + self.config.rotation_check_interval;
                if self.check_rotation().await == Flow::Stop {
                    return;
                }
            }

            let flow = match self.status.state() {
                TailState::Open => self.step_open().await,
                _ => self.step_reconnecting().await,
            };
            if flow == Flow::Stop {
                return;
            }
        }
    }

    /// 한 줄을 읽어 보내거나, EOF면 폴링 간격만큼 대기합니다.
    async fn step_open(&mut self) -> Flow {
        let cancel = self.cancel.clone();
        let read = tokio::select! {
            _ = cancel.cancelled() => return Flow::Stop,
            read = self.read_line() => read,
        };
        match read {
            Ok(Some(text)) => self.emit(text).await,
            Ok(None) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => Flow::Stop,
                    _ = sleep(self.config.poll_interval) => Flow::Continue,
                }
            }
            Err(e) => {
                self.reopen_after_error(&e);
                Flow::Continue
            }
        }
    }

    /// 읽기 오류 후 같은 파일을 마지막 완성 라인 직후부터 다시 열도록 합니다.
    fn reopen_after_error(&mut self, error: &io::Error) {
        warn!(path = %self.source, error = %error, "read failed, reopening");
        self.reopen = Reopen::Resume {
            file_id: self.file_id,
            offset: self.position.saturating_sub(self.line.consumed()),
        };
        self.close();
        self.enter_reconnecting(self.config.reconnect_interval);
    }

    /// 재연결 시각까지 기다린 뒤 파일을 다시 엽니다.
    async fn step_reconnecting(&mut self) -> Flow {
        tokio::select! {
            _ = self.cancel.cancelled() => return Flow::Stop,
            _ = sleep_until(self.retry_at) => {}
        }

        match self.open().await {
            Ok(()) => {
                info!(
                    path = %self.source,
                    file_id = ?self.file_id,
                    offset = self.position,
                    "reopened file"
                );
            }
            Err(e) => {
                // 사라진 파일이 다시 생기면 새 파일
                if e.kind() == io::ErrorKind::NotFound {
                    self.reopen = Reopen::FromStart;
                }
                debug!(path = %self.source, error = %e, "reopen failed, still waiting");
                self.enter_reconnecting(self.config.reconnect_interval);
            }
        }
        Flow::Continue
    }

    /// 경로의 식별자와 크기를 확인해 로테이션을 처리합니다.
    async fn check_rotation(&mut self) -> Flow {
        if self.reader.is_none() {
            return Flow::Continue;
        }

        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => {
                let current = FileId::from_metadata(&meta);
                if current.is_some() && current != self.file_id {
                    return self.rotate("replaced").await;
                }
                if meta.len() < self.position {
                    return self.rewind(meta.len()).await;
                }
                Flow::Continue
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.rotate("removed").await,
            Err(e) => {
                debug!(path = %self.source, error = %e, "rotation check failed");
                Flow::Continue
            }
        }
    }

    /// 기존 핸들에 남은 라인을 모두 내보낸 뒤 닫고 재연결 상태로 전환합니다.
    async fn rotate(&mut self, reason: &'static str) -> Flow {
        loop {
            match self.read_line().await {
                Ok(Some(text)) => {
                    if self.emit(text).await == Flow::Stop {
                        return Flow::Stop;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(path = %self.source, error = %e, "drain of rotated file stopped");
                    break;
                }
            }
        }

        // 개행 없이 끝난 마지막 라인
        if self.line.consumed() > 0 {
            let text = self.finish_line();
            if self.emit(text).await == Flow::Stop {
                return Flow::Stop;
            }
        }

        info!(path = %self.source, reason, "log rotation detected");
        counter!(m::TAILER_ROTATIONS_TOTAL, m::LABEL_REASON => reason).increment(1);
        self.status.record_rotation();
        self.close();
        self.reopen = Reopen::FromStart;
        // 새 파일이 이미 있을 수 있으므로 첫 시도는 바로
        self.enter_reconnecting(Duration::ZERO);
        Flow::Continue
    }

    /// 제자리에서 잘린 파일을 처음부터 다시 읽습니다.
    async fn rewind(&mut self, size: u64) -> Flow {
        info!(path = %self.source, size, position = self.position, "file truncated, rewinding");
        counter!(m::TAILER_ROTATIONS_TOTAL, m::LABEL_REASON => "truncated").increment(1);
        self.status.record_rotation();

        let Some(reader) = self.reader.as_mut() else {
            return Flow::Continue;
        };
        let result = reader.seek(SeekFrom::Start(0)).await;
        match result {
            Ok(_) => {
                self.position = 0;
                self.line.clear();
            }
            Err(e) => {
                warn!(path = %self.source, error = %e, "rewind failed, reopening");
                self.close();
                self.reopen = Reopen::FromStart;
                self.enter_reconnecting(Duration::ZERO);
            }
        }
        Flow::Continue
    }

    /// `self.reopen`이 정한 위치에서 파일을 엽니다.
    async fn open(&mut self) -> io::Result<()> {
        let mut file = File::open(&self.path).await?;
        let meta = file.metadata().await?;
        let file_id = FileId::from_metadata(&meta);
        let position = file.seek(self.reopen.seek_for(file_id, meta.len())).await?;

        self.file_id = file_id;
        self.position = position;
        self.line.clear();
        self.reader = Some(BufReader::new(file));
        self.status.set_state(TailState::Open);
        Ok(())
    }

    fn close(&mut self) {
        self.reader = None;
        self.file_id = None;
        self.position = 0;
        self.line.clear();
    }

    fn enter_reconnecting(&mut self, delay: Duration) {
        self.retry_at = Instant::now() + delay;
        self.status.set_state(TailState::Reconnecting);
    }

    /// 완성된 라인 하나를 읽습니다. 개행이 아직 없으면 `None`.
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let filled = self.line.read_from(reader).await?;
        self.position += filled.read;

        Ok(filled.complete.then(|| self.finish_line()))
    }

    /// 부분 라인 버퍼를 비우며 종결 문자를 제거한 문자열을 만듭니다.
    fn finish_line(&mut self) -> String {
        let (bytes, truncated) = self.line.take();
        if truncated {
            warn!(
                path = %self.source,
                max_line_bytes = self.config.max_line_bytes,
                "line exceeded maximum length, truncated"
            );
            counter!(m::TAILER_LINES_TRUNCATED_TOTAL, m::LABEL_STREAM => self.stream.clone())
                .increment(1);
        }

        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// 라인을 정규화해 큐로 보냅니다. 취소되었거나 큐가 닫히면 `Stop`.
    async fn emit(&mut self, text: String) -> Flow {
        self.status.record_line();
        counter!(m::TAILER_LINES_READ_TOTAL, m::LABEL_STREAM => self.stream.clone()).increment(1);

        let line = LogLine::new(self.source.clone(), text);
        let Some(event) = self.normalizer.normalize(&line) else {
            return Flow::Continue;
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Flow::Stop,
            result = self.tx.send(event) => match result {
                Ok(()) => Flow::Continue,
                Err(_) => {
                    debug!(path = %self.source, "stream queue closed, stopping tailer");
                    Flow::Stop
                }
            },
        }
    }
}
