//! 설정 관리: agent.yaml 파싱 및 런타임 설정
//!
//! [`AgentConfig`]는 에이전트 전체 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 바이너리에서 적용)
//! 2. 환경변수 (`TAILSTREAM_KEY=...` 형식)
//! 3. 설정 파일 (`/etc/tailstream/agent.yaml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), tailstream_core::error::TailstreamError> {
//! use tailstream_core::config::AgentConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = AgentConfig::load("/etc/tailstream/agent.yaml").await?;
//!
//! // YAML 문자열에서 직접 파싱
//! let config = AgentConfig::parse("general:\n  log_level: debug\n")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConfigError, TailstreamError};

/// 기본 수집 엔드포인트
pub const DEFAULT_BASE_URL: &str = "https://app.tailstream.io";

/// 시스템 설정 파일 후보 (순서대로 탐색)
const SYSTEM_CONFIG_PATHS: &[&str] = &[
    "/etc/tailstream/agent.yaml",
    "/usr/local/etc/tailstream/agent.yaml",
];

/// 개발용 로컬 설정 파일
const LOCAL_CONFIG_PATH: &str = "tailstream.yaml";

/// 레거시 단일 스트림 이름
pub const LEGACY_STREAM_NAME: &str = "default";

/// Tailstream 에이전트 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 일반 설정
    pub general: GeneralConfig,
    /// 실행 환경 이름 (production, staging, ...)
    pub env: String,
    /// 스트림별 키가 없을 때 사용하는 공용 키
    pub key: String,
    /// 키 파일 경로 (내용이 `key`보다 우선)
    pub key_file: String,
    /// 레거시 단일 스트림 전송 설정
    pub ship: ShipConfig,
    /// 레거시 단일 스트림 탐색 설정
    pub discovery: DiscoveryConfig,
    /// 다중 스트림 설정
    pub streams: Vec<StreamConfig>,
    /// 메트릭 노출 설정
    pub metrics: MetricsConfig,
    /// 배칭/테일링 튜닝
    pub shipper: ShipperTuning,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            env: "production".to_owned(),
            key: String::new(),
            key_file: String::new(),
            ship: ShipConfig::default(),
            discovery: DiscoveryConfig::default(),
            streams: Vec::new(),
            metrics: MetricsConfig::default(),
            shipper: ShipperTuning::default(),
        }
    }
}

impl AgentConfig {
    /// YAML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. YAML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 키 파일 해석
    /// 4. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, TailstreamError> {
        let mut config = Self::from_file(path).await?;
        config.finish().await?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값으로 시작합니다.
    ///
    /// 기본 경로 탐색 결과처럼 "있으면 쓰는" 파일에 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, TailstreamError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(TailstreamError::Config(ConfigError::FileNotFound { .. })) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.finish().await?;
        Ok(config)
    }

    async fn finish(&mut self) -> Result<(), TailstreamError> {
        self.apply_env_overrides();
        self.resolve_key_file().await?;
        self.validate()
    }

    /// YAML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, TailstreamError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TailstreamError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                TailstreamError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// YAML 문자열에서 설정을 파싱합니다.
    ///
    /// 빈 문서(주석만 있는 경우 포함)는 기본값으로 취급합니다.
    pub fn parse(yaml_str: &str) -> Result<Self, TailstreamError> {
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(yaml_str).map_err(parse_failed)?;
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_yaml::from_value(value).map_err(parse_failed)
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.env, "TAILSTREAM_ENV");
        override_string(&mut self.key, "TAILSTREAM_KEY");
        override_string(&mut self.key_file, "TAILSTREAM_KEY_FILE");
        override_string(&mut self.ship.url, "TAILSTREAM_URL");
        override_string(&mut self.ship.base_url, "TAILSTREAM_BASE_URL");

        override_string(&mut self.general.log_level, "TAILSTREAM_LOG_LEVEL");
        override_string(&mut self.general.log_format, "TAILSTREAM_LOG_FORMAT");

        override_bool(&mut self.metrics.enabled, "TAILSTREAM_METRICS_ENABLED");
    }

    /// `key_file`이 설정되어 있으면 파일 내용(공백 제거)으로 `key`를 대체합니다.
    pub async fn resolve_key_file(&mut self) -> Result<(), TailstreamError> {
        if self.key_file.is_empty() {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.key_file)
            .await
            .map_err(|e| ConfigError::InvalidValue {
                field: "key_file".to_owned(),
                reason: format!("failed to read '{}': {e}", self.key_file),
            })?;
        self.key = content.trim().to_owned();
        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 식별자가 없는 스트림은 여기서 거부하지 않습니다.
    /// 탐색 단계에서 해당 스트림만 제외됩니다.
    pub fn validate(&self) -> Result<(), TailstreamError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if !is_http_url(&self.ship.base_url) {
            return Err(invalid(
                "ship.base_url",
                format!("must start with http:// or https://, got '{}'", self.ship.base_url),
            ));
        }

        if !self.ship.url.is_empty() && !is_http_url(&self.ship.url) {
            return Err(invalid(
                "ship.url",
                format!("must start with http:// or https://, got '{}'", self.ship.url),
            ));
        }

        for (idx, stream) in self.streams.iter().enumerate() {
            if let Some(url) = stream.url.as_deref()
                && !url.is_empty()
                && !is_http_url(url)
            {
                return Err(invalid(
                    &format!("streams[{idx}].url"),
                    format!("must start with http:// or https://, got '{url}'"),
                ));
            }
            if let Some(format) = &stream.format
                && format.pattern.trim().is_empty()
            {
                return Err(invalid(
                    &format!("streams[{idx}].format.pattern"),
                    "pattern must not be empty".to_owned(),
                ));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(invalid(
                "metrics.port",
                "port must be non-zero when metrics are enabled".to_owned(),
            ));
        }

        self.shipper.validate()
    }

    /// 실제로 사용할 스트림 목록을 반환합니다.
    ///
    /// `streams`가 비어 있으면 `discovery.paths`와 `ship`으로
    /// `default` 단일 스트림을 만듭니다. 탐색이 비활성화되어 있으면
    /// 레거시 스트림은 만들지 않습니다.
    pub fn resolved_streams(&self) -> Vec<StreamConfig> {
        if !self.streams.is_empty() {
            return self.streams.clone();
        }
        if !self.discovery.enabled {
            return Vec::new();
        }
        vec![StreamConfig {
            name: LEGACY_STREAM_NAME.to_owned(),
            stream_id: self.ship.stream_id.clone(),
            key: None,
            paths: self.discovery.paths.include.clone(),
            exclude: self.discovery.paths.exclude.clone(),
            url: (!self.ship.url.is_empty()).then(|| self.ship.url.clone()),
            format: None,
        }]
    }

    /// 공용 키 (비어 있으면 `None`)
    pub fn fallback_key(&self) -> Option<&str> {
        (!self.key.is_empty()).then_some(self.key.as_str())
    }
}

/// 기본 설정 파일 경로를 결정합니다.
///
/// 시스템 경로 중 존재하는 첫 파일, 없으면 현재 디렉토리의 `tailstream.yaml`.
pub fn default_config_path() -> PathBuf {
    SYSTEM_CONFIG_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
        .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG_PATH))
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipConfig {
    /// 수집 서버 기본 URL
    pub base_url: String,
    /// 레거시 전체 URL (설정 시 `default` 스트림의 URL을 대체)
    pub url: String,
    /// 레거시 스트림 ID
    pub stream_id: String,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            url: String::new(),
            stream_id: String::new(),
        }
    }
}

/// 레거시 파일 탐색 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 포함/제외 패턴
    pub paths: DiscoveryPaths,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: DiscoveryPaths::default(),
        }
    }
}

/// 포함/제외 glob 패턴
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryPaths {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for DiscoveryPaths {
    fn default() -> Self {
        Self {
            include: vec![
                "/var/log/nginx/*.log".to_owned(),
                "/var/log/caddy/*.log".to_owned(),
                "/var/log/apache2/*.log".to_owned(),
                "/var/log/httpd/*.log".to_owned(),
                "/var/www/**/storage/logs/*.log".to_owned(),
            ],
            exclude: vec!["**/*.gz".to_owned(), "**/*.1".to_owned()],
        }
    }
}

/// 스트림 설정: 하나의 수집 대상
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// 사람이 읽는 이름
    pub name: String,
    /// 스트림 ID (`{base}/api/ingest/{stream_id}`)
    pub stream_id: String,
    /// 스트림 전용 키
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// 포함 glob 패턴
    pub paths: Vec<String>,
    /// 제외 glob 패턴
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// 전체 URL 오버라이드
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 사용자 정의 로그 형식
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

impl StreamConfig {
    /// 스트림 ID 또는 URL 오버라이드 중 하나라도 있는지 확인합니다.
    pub fn has_destination(&self) -> bool {
        !self.stream_id.is_empty() || self.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// 스트림 전용 키 (비어 있으면 `None`)
    pub fn stream_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// 로그/메트릭용 표시 이름
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else {
            &self.stream_id
        }
    }
}

/// 사용자 정의 로그 형식
///
/// `fields` 값은 캡처 그룹 번호(`"1"`), `"hostname"`, `"filename"` 중 하나입니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogFormat {
    /// 형식 이름
    pub name: String,
    /// 정규식 패턴
    pub pattern: String,
    /// 출력 필드 → 값 소스
    pub fields: BTreeMap<String, String>,
    /// 누락 필드 기본값
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub default: BTreeMap<String, serde_json::Value>,
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

/// 배칭/테일링 튜닝 값
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipperTuning {
    /// 배치 최대 이벤트 수
    pub batch_size: usize,
    /// 첫 이벤트 이후 플러시까지 최대 대기 (밀리초)
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
    /// 한 줄 최대 바이트 (초과 시 잘라냄)
    pub max_line_bytes: usize,
    /// 어떤 단계에도 맞지 않는 라인 처리 (raw, drop)
    pub unparsed: String,
}

impl Default for ShipperTuning {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval_ms: 2_000,
            queue_capacity: 100,
            poll_interval_ms: 200,
            rotation_check_secs: 5,
            reconnect_interval_secs: 5,
            ship_timeout_secs: 10,
            max_line_bytes: 1024 * 1024, // 1 MiB
            unparsed: "raw".to_owned(),
        }
    }
}

impl ShipperTuning {
    /// 튜닝 값 범위를 검증합니다.
    pub fn validate(&self) -> Result<(), TailstreamError> {
        if self.batch_size == 0 || self.batch_size > 10_000 {
            return Err(invalid(
                "shipper.batch_size",
                "must be between 1 and 10000".to_owned(),
            ));
        }
        if self.flush_interval_ms < 10 || self.flush_interval_ms > 300_000 {
            return Err(invalid(
                "shipper.flush_interval_ms",
                "must be between 10 and 300000".to_owned(),
            ));
        }
        if self.queue_capacity == 0 || self.queue_capacity > 100_000 {
            return Err(invalid(
                "shipper.queue_capacity",
                "must be between 1 and 100000".to_owned(),
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 60_000 {
            return Err(invalid(
                "shipper.poll_interval_ms",
                "must be between 1 and 60000".to_owned(),
            ));
        }
        if self.rotation_check_secs == 0 || self.rotation_check_secs > 3_600 {
            return Err(invalid(
                "shipper.rotation_check_secs",
                "must be between 1 and 3600".to_owned(),
            ));
        }
        if self.reconnect_interval_secs == 0 || self.reconnect_interval_secs > 3_600 {
            return Err(invalid(
                "shipper.reconnect_interval_secs",
                "must be between 1 and 3600".to_owned(),
            ));
        }
        if self.ship_timeout_secs == 0 || self.ship_timeout_secs > 300 {
            return Err(invalid(
                "shipper.ship_timeout_secs",
                "must be between 1 and 300".to_owned(),
            ));
        }
        if self.max_line_bytes < 64 {
            return Err(invalid(
                "shipper.max_line_bytes",
                "must be at least 64".to_owned(),
            ));
        }
        let valid_policies = ["raw", "drop"];
        if !valid_policies.contains(&self.unparsed.as_str()) {
            return Err(invalid(
                "shipper.unparsed",
                format!("must be one of: {}", valid_policies.join(", ")),
            ));
        }
        Ok(())
    }
}

fn parse_failed(e: serde_yaml::Error) -> TailstreamError {
    TailstreamError::Config(ConfigError::ParseFailed {
        reason: e.to_string(),
    })
}

fn invalid(field: &str, reason: String) -> TailstreamError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key)
        && !val.is_empty()
    {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}
