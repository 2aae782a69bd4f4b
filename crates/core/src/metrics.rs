//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tailstream_`
//! - 모듈명: `tailer_`, `normalizer_`, `shipper_`, `agent_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(tailstream_core::metrics::TAILER_LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스트림 이름 레이블 키
pub const LABEL_STREAM: &str = "stream";

/// 정규화 단계 레이블 키 (custom, json, access, raw)
pub const LABEL_FORMAT: &str = "format";

/// 드롭 사유 레이블 키 (unparsed, ship_failed)
pub const LABEL_REASON: &str = "reason";

// ─── Tailer 메트릭 ─────────────────────────────────────────────────

/// Tailer: 읽은 전체 라인 수 (counter)
pub const TAILER_LINES_READ_TOTAL: &str = "tailstream_tailer_lines_read_total";

/// Tailer: 감지된 로테이션 수 (counter)
pub const TAILER_ROTATIONS_TOTAL: &str = "tailstream_tailer_rotations_total";

/// Tailer: 잘라낸(길이 초과) 라인 수 (counter)
pub const TAILER_LINES_TRUNCATED_TOTAL: &str = "tailstream_tailer_lines_truncated_total";

/// Tailer: 현재 테일링 중인 파일 수 (gauge)
pub const TAILER_FILES_ACTIVE: &str = "tailstream_tailer_files_active";

// ─── Normalizer 메트릭 ──────────────────────────────────────────────

/// Normalizer: 정규화된 이벤트 수 (counter, label: format)
pub const NORMALIZER_EVENTS_TOTAL: &str = "tailstream_normalizer_events_total";

/// Normalizer: 드롭된 라인 수 (counter, label: reason)
pub const NORMALIZER_LINES_DROPPED_TOTAL: &str = "tailstream_normalizer_lines_dropped_total";

// ─── Shipper 메트릭 ─────────────────────────────────────────────────

/// Shipper: 전송 성공 배치 수 (counter, label: stream)
pub const SHIPPER_BATCHES_SHIPPED_TOTAL: &str = "tailstream_shipper_batches_shipped_total";

/// Shipper: 전송 실패 배치 수 (counter, label: stream)
pub const SHIPPER_BATCHES_FAILED_TOTAL: &str = "tailstream_shipper_batches_failed_total";

/// Shipper: 전송 성공 이벤트 수 (counter, label: stream)
pub const SHIPPER_EVENTS_SHIPPED_TOTAL: &str = "tailstream_shipper_events_shipped_total";

/// Shipper: 전송 실패로 버려진 이벤트 수 (counter, label: stream)
pub const SHIPPER_EVENTS_DROPPED_TOTAL: &str = "tailstream_shipper_events_dropped_total";

/// Shipper: 요청 왕복 시간 (histogram, 초)
pub const SHIPPER_REQUEST_DURATION_SECONDS: &str = "tailstream_shipper_request_duration_seconds";

// ─── Agent 메트릭 ───────────────────────────────────────────────────

/// Agent: 가동 시간 (gauge, 초)
pub const AGENT_UPTIME_SECONDS: &str = "tailstream_agent_uptime_seconds";

/// Agent: 활성 스트림 수 (gauge)
pub const AGENT_STREAMS_ACTIVE: &str = "tailstream_agent_streams_active";

/// Agent: 빌드 정보 (gauge, 항상 1, labels: version, os, arch)
pub const AGENT_BUILD_INFO: &str = "tailstream_agent_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 전송 왕복 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 10s 범위 (전송 타임아웃 상한)
pub const SHIP_DURATION_BUCKETS: [f64; 9] = [0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
/// 일반적으로 `tailstream-agent` 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Tailer
    describe_counter!(
        TAILER_LINES_READ_TOTAL,
        "Total number of complete lines read from tailed files"
    );
    describe_counter!(
        TAILER_ROTATIONS_TOTAL,
        "Rotations detected (identity change, disappearance or truncation)"
    );
    describe_counter!(
        TAILER_LINES_TRUNCATED_TOTAL,
        "Lines cut down to the configured maximum length"
    );
    describe_gauge!(TAILER_FILES_ACTIVE, "Number of files currently tailed");

    // Normalizer
    describe_counter!(
        NORMALIZER_EVENTS_TOTAL,
        "Events produced per normalization step (custom, json, access, raw)"
    );
    describe_counter!(
        NORMALIZER_LINES_DROPPED_TOTAL,
        "Lines discarded by the normalizer"
    );

    // Shipper
    describe_counter!(
        SHIPPER_BATCHES_SHIPPED_TOTAL,
        "Batches accepted by the ingest endpoint"
    );
    describe_counter!(
        SHIPPER_BATCHES_FAILED_TOTAL,
        "Batches rejected or lost in transport (not retried)"
    );
    describe_counter!(
        SHIPPER_EVENTS_SHIPPED_TOTAL,
        "Events delivered to the ingest endpoint"
    );
    describe_counter!(
        SHIPPER_EVENTS_DROPPED_TOTAL,
        "Events discarded together with a failed batch"
    );
    describe_histogram!(
        SHIPPER_REQUEST_DURATION_SECONDS,
        "Ingest request round trip in seconds"
    );

    // Agent
    describe_gauge!(AGENT_UPTIME_SECONDS, "Agent uptime in seconds");
    describe_gauge!(AGENT_STREAMS_ACTIVE, "Number of streams with at least one file");
    describe_gauge!(
        AGENT_BUILD_INFO,
        "Build information (always 1, with version/os/arch labels)"
    );
}
