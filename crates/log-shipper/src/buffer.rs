//! 스트림 배치 버퍼 -- 크기 또는 시간 기준으로 플러시되는 이벤트 묶음
//!
//! [`EventBatch`]는 스트림 하나의 이벤트를 도착 순서대로 모읍니다.
//! 첫 이벤트가 들어올 때 플러시 마감 시각이 정해지며,
//! 크기가 한도에 도달하거나 마감 시각이 지나면 [`take`](EventBatch::take)로 비웁니다.
//!
//! 배치는 해당 스트림의 전송 태스크만 변경하므로 잠금이 필요 없습니다.

use std::time::Duration;

use tokio::time::Instant;

use tailstream_core::event::Event;

/// 스트림 하나의 인메모리 배치
pub struct EventBatch {
    /// 도착 순서대로 쌓인 이벤트
    events: Vec<Event>,
    /// 최대 이벤트 수
    max_size: usize,
    /// 첫 이벤트 이후 플러시까지 대기 시간
    max_age: Duration,
    /// 현재 배치의 플러시 마감 시각 (비어 있으면 `None`)
    deadline: Option<Instant>,
}

impl EventBatch {
    /// 새 배치를 생성합니다.
    pub fn new(max_size: usize, max_age: Duration) -> Self {
        Self {
            events: Vec::with_capacity(max_size.min(10_000)),
            max_size,
            max_age,
            deadline: None,
        }
    }

    /// 이벤트를 추가합니다. 배치가 가득 찼으면 `true`를 반환합니다.
    pub fn push(&mut self, event: Event) -> bool {
        if self.events.is_empty() {
            self.deadline = Some(Instant::now() + self.max_age);
        }
        self.events.push(event);
        self.is_full()
    }

    /// 크기 한도에 도달했는지 확인합니다.
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.max_size
    }

    /// 현재 배치의 플러시 마감 시각
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 배치의 모든 이벤트를 꺼내고 비웁니다.
    pub fn take(&mut self) -> Vec<Event> {
        self.deadline = None;
        std::mem::replace(&mut self.events, Vec::with_capacity(self.max_size.min(10_000)))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> Event {
        Event::Raw(text.to_owned())
    }

    #[test]
    fn empty_batch_has_no_deadline() {
        let batch = EventBatch::new(3, Duration::from_secs(2));
        assert!(batch.is_empty());
        assert!(batch.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_set_by_first_event_only() {
        let mut batch = EventBatch::new(10, Duration::from_secs(2));
        batch.push(raw("a"));
        let first_deadline = batch.deadline().unwrap();

        tokio::time::advance(Duration::from_secs(1)).await;
        batch.push(raw("b"));
        assert_eq!(batch.deadline(), Some(first_deadline));
        assert!(Instant::now() < first_deadline);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(Instant::now() >= first_deadline);
    }

    #[test]
    fn push_reports_full() {
        let mut batch = EventBatch::new(2, Duration::from_secs(2));
        assert!(!batch.push(raw("a")));
        assert!(batch.push(raw("b")));
        assert!(batch.is_full());
    }

    #[test]
    fn take_preserves_order_and_resets() {
        let mut batch = EventBatch::new(5, Duration::from_secs(2));
        for text in ["1", "2", "3"] {
            batch.push(raw(text));
        }

        let events = batch.take();
        let texts: Vec<_> = events.iter().filter_map(Event::as_raw).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
        assert!(batch.is_empty());
        assert!(batch.deadline().is_none());
    }
}
