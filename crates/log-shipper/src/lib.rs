#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`discovery`]: 스트림별 include/exclude glob 패턴을 파일 목록으로 확장
//! - [`collector`]: 파일 Tailer (로테이션 감지) 및 표준 입력 수집기
//! - [`parser`]: 정규화 체인 (사용자 정의 형식 -> JSON -> access log -> raw)
//! - [`buffer`]: 스트림별 배치 (크기/시간 기준 플러시)
//! - [`dispatcher`]: 스트림별 배치/전송 루프
//! - [`shipper`]: NDJSON 직렬화와 HTTP 전송 ([`BatchSink`] trait)
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! discover -> FileTailer -> Normalizer -> mpsc -> StreamDispatcher -> BatchSink
//!               |              |                      |                |
//!          inode/size      custom/JSON/          100개 또는 2초      NDJSON POST
//!          로테이션 감지    access/raw
//! ```

pub mod buffer;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod pipeline;
pub mod shipper;

pub mod collector;
pub mod parser;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogShipper, LogShipperBuilder, ship_reader, ship_stdin};

// 설정
pub use config::{ShipperConfig, ShipperConfigBuilder, UnparsedPolicy};

// 에러
pub use error::LogShipperError;

// 탐색
pub use discovery::{DiscoveredStream, discover};

// 수집기
pub use collector::{FileTailer, StdinCollector, TailState, TailStatus, TailerConfig};

// 정규화
pub use parser::{Normalizer, NormalizerBuilder};

// 배치/전송
pub use buffer::EventBatch;
pub use dispatcher::{DispatchStats, StreamDispatcher};
pub use shipper::{BatchSink, HttpShipper, ShipTarget, encode_ndjson};
