//! 로그 전송 파이프라인 설정
//!
//! [`ShipperConfig`]는 core의 [`AgentConfig`](tailstream_core::config::AgentConfig)에서
//! 전송 파이프라인이 쓰는 값만 추려 담습니다.
//!
//! # 사용 예시
//! ```ignore
//! use tailstream_core::config::AgentConfig;
//! use tailstream_log_shipper::config::ShipperConfig;
//!
//! let core_config = AgentConfig::default();
//! let config = ShipperConfig::from_core(&core_config)?;
//! ```

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tailstream_core::config::{AgentConfig, DEFAULT_BASE_URL};

use crate::error::LogShipperError;

/// 어떤 정규화 단계에도 맞지 않는 라인의 처리 정책
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnparsedPolicy {
    /// JSON 문자열로 그대로 전달 (기본값)
    #[default]
    Raw,
    /// 버림
    Drop,
}

impl FromStr for UnparsedPolicy {
    type Err = LogShipperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "drop" => Ok(Self::Drop),
            other => Err(LogShipperError::Config {
                field: "unparsed".to_owned(),
                reason: format!("unknown policy '{other}', expected raw or drop"),
            }),
        }
    }
}

/// 로그 전송 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipperConfig {
    /// 수집 서버 기본 URL (`{base}/api/ingest/{stream_id}`)
    pub base_url: String,
    /// 스트림 전용 키가 없을 때 쓰는 공용 키
    pub fallback_key: Option<String>,
    /// 배치 최대 이벤트 수
    pub batch_size: usize,
    /// 첫 이벤트 이후 플러시 대기 (밀리초)
    pub flush_interval_ms: u64,
    /// 스트림별 큐 용량
    pub queue_capacity: usize,
    /// EOF 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
    /// 로테이션 검사 주기 (초)
    pub rotation_check_secs: u64,
    /// 재연결 시도 주기 (초)
    pub reconnect_interval_secs: u64,
    /// 전송 타임아웃 (초)
    pub ship_timeout_secs: u64,
    /// 한 줄 최대 바이트
    pub max_line_bytes: usize,
    /// 미해석 라인 처리 정책
    pub unparsed: UnparsedPolicy,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            fallback_key: None,
            batch_size: 100,
            flush_interval_ms: 2_000,
            queue_capacity: 100,
            poll_interval_ms: 200,
            rotation_check_secs: 5,
            reconnect_interval_secs: 5,
            ship_timeout_secs: 10,
            max_line_bytes: 1024 * 1024,
            unparsed: UnparsedPolicy::Raw,
        }
    }
}

impl ShipperConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &AgentConfig) -> Result<Self, LogShipperError> {
        let tuning = &core.shipper;
        Ok(Self {
            base_url: core.ship.base_url.clone(),
            fallback_key: core.fallback_key().map(str::to_owned),
            batch_size: tuning.batch_size,
            flush_interval_ms: tuning.flush_interval_ms,
            queue_capacity: tuning.queue_capacity,
            poll_interval_ms: tuning.poll_interval_ms,
            rotation_check_secs: tuning.rotation_check_secs,
            reconnect_interval_secs: tuning.reconnect_interval_secs,
            ship_timeout_secs: tuning.ship_timeout_secs,
            max_line_bytes: tuning.max_line_bytes,
            unparsed: tuning.unparsed.parse()?,
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rotation_check_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_check_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn ship_timeout(&self) -> Duration {
        Duration::from_secs(self.ship_timeout_secs)
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogShipperError> {
        const MAX_BATCH_SIZE: usize = 10_000;
        const MAX_QUEUE_CAPACITY: usize = 100_000;

        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(LogShipperError::Config {
                field: "base_url".to_owned(),
                reason: format!("'{}' is not an http(s) URL", self.base_url),
            });
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(LogShipperError::Config {
                field: "batch_size".to_owned(),
                reason: format!("must be 1-{}", MAX_BATCH_SIZE),
            });
        }

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(LogShipperError::Config {
                field: "queue_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_QUEUE_CAPACITY),
            });
        }

        let zero_durations = [
            ("flush_interval_ms", self.flush_interval_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("rotation_check_secs", self.rotation_check_secs),
            ("reconnect_interval_secs", self.reconnect_interval_secs),
            ("ship_timeout_secs", self.ship_timeout_secs),
        ];
        for (field, value) in zero_durations {
            if value == 0 {
                return Err(LogShipperError::Config {
                    field: field.to_owned(),
                    reason: "must be greater than 0".to_owned(),
                });
            }
        }

        if self.max_line_bytes == 0 {
            return Err(LogShipperError::Config {
                field: "max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct ShipperConfigBuilder {
    config: ShipperConfig,
}

impl ShipperConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 URL을 설정합니다.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// 공용 키를 설정합니다.
    pub fn fallback_key(mut self, key: impl Into<String>) -> Self {
        self.config.fallback_key = Some(key.into());
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// 플러시 간격(밀리초)을 설정합니다.
    pub fn flush_interval_ms(mut self, ms: u64) -> Self {
        self.config.flush_interval_ms = ms;
        self
    }

    /// 스트림별 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// EOF 폴링 간격(밀리초)을 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 로테이션 검사 주기(초)를 설정합니다.
    pub fn rotation_check_secs(mut self, secs: u64) -> Self {
        self.config.rotation_check_secs = secs;
        self
    }

    /// 재연결 주기(초)를 설정합니다.
    pub fn reconnect_interval_secs(mut self, secs: u64) -> Self {
        self.config.reconnect_interval_secs = secs;
        self
    }

    /// 한 줄 최대 바이트를 설정합니다.
    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.config.max_line_bytes = bytes;
        self
    }

    /// 미해석 라인 정책을 설정합니다.
    pub fn unparsed(mut self, policy: UnparsedPolicy) -> Self {
        self.config.unparsed = policy;
        self
    }

    /// 설정을 검증하고 `ShipperConfig`를 생성합니다.
    pub fn build(self) -> Result<ShipperConfig, LogShipperError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
