//! 스트림별 배치/전송 루프
//!
//! 스트림마다 [`StreamDispatcher`] 하나가 자체 태스크에서 실행됩니다.
//! 큐에서 이벤트를 받아 [`EventBatch`]에 쌓고, 다음 중 먼저 오는 시점에 플러시합니다.
//!
//! - 배치 크기 한도 도달 (해당 스트림만 즉시)
//! - 첫 이벤트 이후 플러시 간격 경과
//! - 큐가 닫힘 (모든 수집기 종료) -- 남은 이벤트를 보내고 종료
//!
//! 전송 실패는 로그를 남기고 배치를 버립니다. 재시도/재큐잉은 없으며
//! 다음 배치는 영향을 받지 않습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tailstream_core::event::Event;
use tailstream_core::metrics as m;

use crate::buffer::EventBatch;
use crate::error::LogShipperError;
use crate::shipper::{BatchSink, ShipTarget};

/// 전송 통계 (스트림별)
#[derive(Debug, Default)]
pub struct DispatchStats {
    batches_shipped: AtomicU64,
    batches_failed: AtomicU64,
    events_shipped: AtomicU64,
    events_dropped: AtomicU64,
}

impl DispatchStats {
    pub fn batches_shipped(&self) -> u64 {
        self.batches_shipped.load(Ordering::Relaxed)
    }

    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    pub fn events_shipped(&self) -> u64 {
        self.events_shipped.load(Ordering::Relaxed)
    }

    /// 전송 실패로 버려진 이벤트 수
    pub fn events_dropped(&self) -> u64 {
        self.events_dropped.load(Ordering::Relaxed)
    }
}

/// 스트림 하나의 배치/전송 루프
pub struct StreamDispatcher<S> {
    stream: String,
    target: ShipTarget,
    sink: Arc<S>,
    rx: mpsc::Receiver<Event>,
    batch: EventBatch,
    stats: Arc<DispatchStats>,
}

impl<S: BatchSink> StreamDispatcher<S> {
    /// 새 전송 루프를 생성합니다.
    pub fn new(
        stream: impl Into<String>,
        target: ShipTarget,
        sink: Arc<S>,
        rx: mpsc::Receiver<Event>,
        batch: EventBatch,
    ) -> Self {
        Self {
            stream: stream.into(),
            target,
            sink,
            rx,
            batch,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// 통계 조회 핸들
    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// 큐가 닫힐 때까지 실행합니다.
    pub async fn run(mut self) {
        info!(stream = %self.stream, url = %self.target.url, "starting stream dispatcher");

        loop {
            let deadline = self.batch.deadline();
            tokio::select! {
                biased;
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush("interval").await;
                }
                received = self.rx.recv() => match received {
                    Some(event) => {
                        if self.batch.push(event) {
                            self.flush("size").await;
                        }
                    }
                    None => {
                        self.flush("shutdown").await;
                        break;
                    }
                },
            }
        }

        info!(
            stream = %self.stream,
            batches = self.stats.batches_shipped(),
            failed = self.stats.batches_failed(),
            "stream dispatcher stopped"
        );
    }

    /// 현재 배치를 전송하고 결과와 무관하게 비웁니다.
    async fn flush(&mut self, trigger: &'static str) {
        let events = self.batch.take();
        if events.is_empty() {
            return;
        }

        let batch_id = Uuid::new_v4();
        let count = events.len() as u64;
        debug!(stream = %self.stream, %batch_id, events = count, trigger, "flushing batch");

        match self.sink.ship(&self.target, &events).await {
            Ok(()) => {
                self.stats.batches_shipped.fetch_add(1, Ordering::Relaxed);
                self.stats.events_shipped.fetch_add(count, Ordering::Relaxed);
                counter!(m::SHIPPER_BATCHES_SHIPPED_TOTAL, m::LABEL_STREAM => self.stream.clone())
                    .increment(1);
                counter!(m::SHIPPER_EVENTS_SHIPPED_TOTAL, m::LABEL_STREAM => self.stream.clone())
                    .increment(count);
                info!(stream = %self.stream, %batch_id, events = count, "batch shipped");
            }
            Err(e) => {
                self.stats.batches_failed.fetch_add(1, Ordering::Relaxed);
                self.stats.events_dropped.fetch_add(count, Ordering::Relaxed);
                counter!(m::SHIPPER_BATCHES_FAILED_TOTAL, m::LABEL_STREAM => self.stream.clone())
                    .increment(1);
                counter!(m::SHIPPER_EVENTS_DROPPED_TOTAL, m::LABEL_STREAM => self.stream.clone())
                    .increment(count);
                match &e {
                    LogShipperError::Ship { status, body } => warn!(
                        stream = %self.stream,
                        %batch_id,
                        events = count,
                        status,
                        body = %body,
                        "batch rejected, dropping"
                    ),
                    other => warn!(
                        stream = %self.stream,
                        %batch_id,
                        events = count,
                        error = %other,
                        "batch ship failed, dropping"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// 전송 내역을 기록하는 테스트용 sink
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        shipped: Mutex<Vec<(ShipTarget, Vec<Event>)>>,
        /// 앞에서부터 이 횟수만큼 401로 실패
        failures: AtomicUsize,
    }

    impl RecordingSink {
        pub(crate) fn failing_first(n: usize) -> Self {
            Self {
                shipped: Mutex::new(Vec::new()),
                failures: AtomicUsize::new(n),
            }
        }

        pub(crate) fn batches(&self) -> Vec<(ShipTarget, Vec<Event>)> {
            self.shipped.lock().unwrap().clone()
        }

        pub(crate) fn batch_sizes(&self) -> Vec<usize> {
            self.batches().iter().map(|(_, events)| events.len()).collect()
        }
    }

    impl BatchSink for RecordingSink {
        async fn ship(&self, target: &ShipTarget, events: &[Event]) -> Result<(), LogShipperError> {
            let fail = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if fail {
                return Err(LogShipperError::Ship {
                    status: 401,
                    body: "unauthorized".to_owned(),
                });
            }
            self.shipped
                .lock()
                .unwrap()
                .push((target.clone(), events.to_vec()));
            Ok(())
        }
    }

    fn target() -> ShipTarget {
        ShipTarget {
            url: "http://collector/api/ingest/s".to_owned(),
            key: None,
        }
    }

    fn raw(i: usize) -> Event {
        Event::Raw(format!("line {i}"))
    }

    fn spawn(
        sink: Arc<RecordingSink>,
        batch_size: usize,
    ) -> (
        mpsc::Sender<Event>,
        Arc<DispatchStats>,
        tokio::task::JoinHandle<()>,
    ) {
        let (tx, rx) = mpsc::channel(100);
        let dispatcher = StreamDispatcher::new(
            "s",
            target(),
            sink,
            rx,
            EventBatch::new(batch_size, Duration::from_secs(2)),
        );
        let stats = dispatcher.stats();
        (tx, stats, tokio::spawn(dispatcher.run()))
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_on_size_and_on_close() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, stats, handle) = spawn(Arc::clone(&sink), 3);

        for i in 0..7 {
            tx.send(raw(i)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sink.batch_sizes(), vec![3, 3, 1]);
        assert_eq!(stats.events_shipped(), 7);

        // 도착 순서 유지
        let all: Vec<String> = sink
            .batches()
            .into_iter()
            .flat_map(|(_, events)| events)
            .filter_map(|e| e.as_raw().map(str::to_owned))
            .collect();
        let expected: Vec<String> = (0..7).map(|i| format!("line {i}")).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn flushes_when_deadline_passes() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, _stats, handle) = spawn(Arc::clone(&sink), 100);

        tx.send(raw(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(sink.batches().is_empty());

        tx.send(raw(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.batch_sizes(), vec![2]);

        drop(tx);
        handle.await.unwrap();
        assert_eq!(sink.batch_sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_never_exceeds_limit() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, _stats, handle) = spawn(Arc::clone(&sink), 100);

        for i in 0..250 {
            tx.send(raw(i)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let sizes = sink.batch_sizes();
        assert!(sizes.iter().all(|&n| n <= 100));
        assert_eq!(sizes.iter().sum::<usize>(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_batch_is_dropped_and_loop_continues() {
        let sink = Arc::new(RecordingSink::failing_first(1));
        let (tx, stats, handle) = spawn(Arc::clone(&sink), 2);

        for i in 0..4 {
            tx.send(raw(i)).await.unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(stats.batches_failed(), 1);
        assert_eq!(stats.events_dropped(), 2);
        assert_eq!(stats.batches_shipped(), 1);
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].1[0].as_raw(), Some("line 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_queue_close_ships_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, stats, handle) = spawn(Arc::clone(&sink), 10);
        drop(tx);
        handle.await.unwrap();
        assert!(sink.batches().is_empty());
        assert_eq!(stats.batches_shipped(), 0);
    }
}
