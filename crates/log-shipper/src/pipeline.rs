//! 파이프라인 오케스트레이션 -- 탐색/테일링/정규화/배칭/전송의 전체 흐름을 관리합니다.
//!
//! [`LogShipper`]는 core의 [`Pipeline`] trait을 구현하여
//! `tailstream-agent`에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! discover -> {stream, file}
//!   FileTailer (파일당 태스크) -> Normalizer -> mpsc (스트림별, bounded)
//!     -> StreamDispatcher (스트림당 태스크) -> BatchSink -> 수집 서버
//! ```
//!
//! 정지 시 취소 토큰을 알린 뒤 모든 Tailer 종료를 기다리고,
//! 송신측이 모두 닫힌 전송 태스크가 남은 배치를 비울 때까지 기다립니다.

use std::path::PathBuf;
use std::sync::Arc;

use metrics::gauge;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tailstream_core::config::StreamConfig;
use tailstream_core::error::{PipelineError, TailstreamError};
use tailstream_core::event::Event;
use tailstream_core::metrics as m;
use tailstream_core::pipeline::{HealthStatus, Pipeline};

use crate::buffer::EventBatch;
use crate::collector::{FileTailer, StdinCollector, TailState, TailStatus, TailerConfig};
use crate::config::ShipperConfig;
use crate::discovery::discover;
use crate::dispatcher::{DispatchStats, StreamDispatcher};
use crate::error::LogShipperError;
use crate::parser::{Normalizer, system_hostname};
use crate::shipper::{BatchSink, ShipTarget};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 로그 전송 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use tailstream_log_shipper::{HttpShipper, LogShipperBuilder};
///
/// let sink = Arc::new(HttpShipper::new(config.ship_timeout())?);
/// let mut shipper = LogShipperBuilder::new()
///     .config(config)
///     .streams(core_config.resolved_streams())
///     .sink(sink)
///     .build()?;
///
/// shipper.start().await?;
/// ```
pub struct LogShipper<S> {
    /// 파이프라인 설정
    config: ShipperConfig,
    /// 설정된 스트림 목록 (탐색 전)
    streams: Vec<StreamConfig>,
    /// 전송 구현체
    sink: Arc<S>,
    /// 이벤트에 주입할 호스트 이름
    hostname: String,
    /// 현재 상태
    state: PipelineState,
    /// 모든 Tailer가 공유하는 종료 신호
    cancel: CancellationToken,
    /// Tailer 태스크 핸들
    tailers: Vec<JoinHandle<()>>,
    /// 전송 태스크 핸들
    dispatchers: Vec<JoinHandle<()>>,
    /// 파일별 Tailer 상태
    tail_statuses: Vec<(PathBuf, Arc<TailStatus>)>,
    /// 스트림별 전송 통계
    dispatch_stats: Vec<(String, Arc<DispatchStats>)>,
}

impl<S: BatchSink> LogShipper<S> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 활성 스트림 수
    pub fn active_streams(&self) -> usize {
        self.dispatch_stats.len()
    }

    /// 추적 중인 파일 수
    pub fn tailed_files(&self) -> usize {
        self.tail_statuses.len()
    }

    /// 파일별 Tailer 상태
    pub fn tail_statuses(&self) -> &[(PathBuf, Arc<TailStatus>)] {
        &self.tail_statuses
    }

    /// 스트림별 전송 통계
    pub fn dispatch_stats(&self) -> &[(String, Arc<DispatchStats>)] {
        &self.dispatch_stats
    }

    /// 스트림 하나의 큐, 정규화기, 전송 태스크를 준비합니다.
    fn spawn_stream(
        &mut self,
        stream: &StreamConfig,
    ) -> Result<Option<(Arc<Normalizer>, mpsc::Sender<Event>)>, LogShipperError> {
        let name = stream.display_name().to_owned();
        let Some(target) = ShipTarget::resolve(
            stream,
            &self.config.base_url,
            self.config.fallback_key.as_deref(),
        ) else {
            warn!(stream = %name, "stream has no stream_id or url, skipping");
            return Ok(None);
        };
        if target.key.is_none() {
            warn!(stream = %name, "no key configured, shipping without authorization");
        }

        let normalizer = Normalizer::builder()
            .hostname(self.hostname.clone())
            .format(stream.format.clone())
            .policy(self.config.unparsed)
            .stream_name(name.clone())
            .build()?;

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let dispatcher = StreamDispatcher::new(
            name.clone(),
            target,
            Arc::clone(&self.sink),
            rx,
            EventBatch::new(self.config.batch_size, self.config.flush_interval()),
        );
        self.dispatch_stats.push((name, dispatcher.stats()));
        self.dispatchers.push(tokio::spawn(dispatcher.run()));

        Ok(Some((Arc::new(normalizer), tx)))
    }

    /// 시작 도중 실패했을 때 이미 띄운 태스크를 정리합니다.
    ///
    /// 상태는 `Initialized`로 남아 다시 `start`할 수 있습니다.
    async fn abort_start(&mut self) {
        self.cancel.cancel();
        for task in self.tailers.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "tailer task failed");
            }
        }
        for task in self.dispatchers.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "dispatcher task failed");
            }
        }
        self.tail_statuses.clear();
        self.dispatch_stats.clear();
    }
}

impl<S: BatchSink> Pipeline for LogShipper<S> {
    async fn start(&mut self) -> Result<(), TailstreamError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        info!(streams = self.streams.len(), "starting log shipper");
        self.cancel = CancellationToken::new();
        self.tail_statuses.clear();
        self.dispatch_stats.clear();

        // 1. 파일 탐색
        let discovered = discover(&self.streams);
        if discovered.is_empty() {
            warn!("no log files discovered for any stream");
        }

        // 2. 스트림별 전송 태스크 + 파일별 Tailer 스폰
        let tailer_config = TailerConfig::from_shipper(&self.config);
        for entry in discovered {
            let spawned = match self.spawn_stream(&entry.stream) {
                Ok(spawned) => spawned,
                Err(e) => {
                    error!(
                        stream = entry.stream.display_name(),
                        error = %e,
                        "failed to start stream"
                    );
                    self.abort_start().await;
                    return Err(e.into());
                }
            };
            let Some((normalizer, tx)) = spawned else {
                continue;
            };
            let name = entry.stream.display_name().to_owned();

            for path in entry.files {
                info!(stream = %name, path = %path.display(), "tailing file");
                let tailer = FileTailer::new(
                    path.clone(),
                    name.clone(),
                    tailer_config.clone(),
                    Arc::clone(&normalizer),
                    tx.clone(),
                    self.cancel.clone(),
                );
                self.tail_statuses.push((path, tailer.status()));
                self.tailers.push(tokio::spawn(tailer.run()));
            }
            // 원본 송신측을 닫아 Tailer가 모두 끝나면 큐가 닫히도록 함
            drop(tx);
        }

        gauge!(m::AGENT_STREAMS_ACTIVE).set(self.dispatch_stats.len() as f64);
        self.state = PipelineState::Running;
        info!(
            streams = self.dispatch_stats.len(),
            files = self.tail_statuses.len(),
            "log shipper started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TailstreamError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log shipper");

        // 1. 라인 생산 중단
        self.cancel.cancel();
        for task in self.tailers.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "tailer task failed");
            }
        }

        // 2. 남은 배치 전송
        for task in self.dispatchers.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "dispatcher task failed");
            }
        }

        gauge!(m::AGENT_STREAMS_ACTIVE).set(0.0);
        self.state = PipelineState::Stopped;
        info!("log shipper stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.tail_statuses.is_empty() {
                    return HealthStatus::Degraded("no files being tailed".to_owned());
                }
                let reconnecting = self
                    .tail_statuses
                    .iter()
                    .filter(|(_, status)| status.state() == TailState::Reconnecting)
                    .count();
                if reconnecting > 0 {
                    HealthStatus::Degraded(format!(
                        "{reconnecting} of {} files reconnecting",
                        self.tail_statuses.len()
                    ))
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 전송 파이프라인 빌더
pub struct LogShipperBuilder<S> {
    config: ShipperConfig,
    streams: Vec<StreamConfig>,
    sink: Option<Arc<S>>,
    hostname: Option<String>,
}

impl<S: BatchSink> LogShipperBuilder<S> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ShipperConfig::default(),
            streams: Vec::new(),
            sink: None,
            hostname: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: ShipperConfig) -> Self {
        self.config = config;
        self
    }

    /// 스트림 목록을 지정합니다.
    pub fn streams(mut self, streams: Vec<StreamConfig>) -> Self {
        self.streams = streams;
        self
    }

    /// 전송 구현체를 지정합니다.
    pub fn sink(mut self, sink: Arc<S>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 호스트 이름을 지정합니다. 생략하면 시스템 호스트 이름.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogShipper<S>, LogShipperError> {
        self.config.validate()?;
        let sink = self.sink.ok_or_else(|| LogShipperError::Config {
            field: "sink".to_owned(),
            reason: "a batch sink is required".to_owned(),
        })?;

        Ok(LogShipper {
            config: self.config,
            streams: self.streams,
            sink,
            hostname: self.hostname.unwrap_or_else(system_hostname),
            state: PipelineState::Initialized,
            cancel: CancellationToken::new(),
            tailers: Vec::new(),
            dispatchers: Vec::new(),
            tail_statuses: Vec::new(),
            dispatch_stats: Vec::new(),
        })
    }
}

impl<S: BatchSink> Default for LogShipperBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// 표준 입력 라인을 스트림 하나로 전송합니다.
///
/// 입력이 끝나거나 `cancel`이 알려지면 남은 배치를 보내고 반환합니다.
/// 읽은 라인 수를 반환합니다.
pub async fn ship_stdin<S: BatchSink>(
    config: &ShipperConfig,
    stream: &StreamConfig,
    sink: Arc<S>,
    cancel: CancellationToken,
) -> Result<u64, LogShipperError> {
    ship_reader(tokio::io::stdin(), config, stream, sink, system_hostname(), cancel).await
}

/// 임의의 `AsyncRead`에서 라인을 읽어 스트림 하나로 전송합니다.
pub async fn ship_reader<R, S>(
    reader: R,
    config: &ShipperConfig,
    stream: &StreamConfig,
    sink: Arc<S>,
    hostname: String,
    cancel: CancellationToken,
) -> Result<u64, LogShipperError>
where
    R: AsyncRead + Unpin,
    S: BatchSink,
{
    let name = stream.display_name().to_owned();
    let target = ShipTarget::resolve(stream, &config.base_url, config.fallback_key.as_deref())
        .ok_or_else(|| LogShipperError::Config {
            field: "stream_id".to_owned(),
            reason: "stdin mode requires a stream id or url".to_owned(),
        })?;

    let normalizer = Normalizer::builder()
        .hostname(hostname)
        .format(stream.format.clone())
        .policy(config.unparsed)
        .stream_name(name.clone())
        .build()?;

    let (tx, rx) = mpsc::channel(config.queue_capacity);
    let dispatcher = StreamDispatcher::new(
        name.clone(),
        target,
        sink,
        rx,
        EventBatch::new(config.batch_size, config.flush_interval()),
    );
    let dispatch = tokio::spawn(dispatcher.run());

    let result = StdinCollector::new(
        reader,
        name,
        Arc::new(normalizer),
        tx,
        cancel,
        config.max_line_bytes,
    )
    .run()
    .await;

    if let Err(e) = dispatch.await {
        error!(error = %e, "dispatcher task failed");
    }
    result
}
