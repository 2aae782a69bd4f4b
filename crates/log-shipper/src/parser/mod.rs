//! 정규화 모듈 -- 원시 라인을 [`Event`]로 변환합니다.
//!
//! [`Normalizer`]는 다음 순서로 시도하며, 처음 성공한 단계의 결과를 사용합니다.
//!
//! 1. 사용자 정의 형식 ([`CustomFormat`], 스트림에 설정된 경우)
//! 2. JSON 객체 ([`json::parse_object`])
//! 3. access log 휴리스틱 ([`AccessLogParser`])
//! 4. [`UnparsedPolicy`]에 따라 원시 문자열 전달 또는 버림
//!
//! 어떤 단계도 에러를 올리지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! use tailstream_core::event::LogLine;
//! use tailstream_log_shipper::parser::Normalizer;
//!
//! let normalizer = Normalizer::builder().hostname("web-01").build()?;
//! let event = normalizer.normalize(&LogLine::new("/var/log/app.log", r#"{"a":1}"#));
//! ```

pub mod access;
pub mod custom;
pub mod json;

pub use access::{AccessLogEntry, AccessLogParser};
pub use custom::CustomFormat;

use metrics::counter;
use tailstream_core::config::LogFormat;
use tailstream_core::event::{Event, LogLine};
use tailstream_core::metrics as m;
use tracing::{trace, warn};

use crate::config::UnparsedPolicy;
use crate::error::LogShipperError;

/// 라인을 처리한 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeStep {
    Custom,
    Json,
    Access,
    Raw,
}

impl NormalizeStep {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::Json => "json",
            Self::Access => "access",
            Self::Raw => "raw",
        }
    }
}

/// 스트림 하나에 대한 정규화기
///
/// 사용자 정의 패턴은 생성 시 한 번만 컴파일됩니다.
/// 여러 Tailer 태스크가 `Arc<Normalizer>`로 공유합니다.
#[derive(Debug, Clone)]
pub struct Normalizer {
    hostname: String,
    custom: Option<CustomFormat>,
    access: AccessLogParser,
    policy: UnparsedPolicy,
}

impl Normalizer {
    /// 새 빌더를 생성합니다.
    pub fn builder() -> NormalizerBuilder {
        NormalizerBuilder::default()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// 사용자 정의 형식이 활성 상태인지 확인합니다.
    pub fn has_custom_format(&self) -> bool {
        self.custom.is_some()
    }

    /// 라인을 정규화합니다. `None`이면 버려진 라인입니다.
    pub fn normalize(&self, line: &LogLine) -> Option<Event> {
        let (event, step) = self.normalize_with_step(line)?;
        counter!(m::NORMALIZER_EVENTS_TOTAL, m::LABEL_FORMAT => step.as_str()).increment(1);
        Some(event)
    }

    /// 정규화 결과와 처리 단계를 함께 반환합니다.
    pub fn normalize_with_step(&self, line: &LogLine) -> Option<(Event, NormalizeStep)> {
        if let Some(custom) = &self.custom
            && let Some(map) = custom.apply(&line.text, &line.source, &self.hostname)
        {
            return Some((Event::Structured(map), NormalizeStep::Custom));
        }

        if let Some(map) = json::parse_object(&line.text, &self.hostname) {
            return Some((Event::Structured(map), NormalizeStep::Json));
        }

        if let Some(entry) = self.access.parse(&line.text, &line.source, &self.hostname) {
            return Some((Event::Structured(entry.into_map()), NormalizeStep::Access));
        }

        match self.policy {
            UnparsedPolicy::Raw => Some((Event::Raw(line.text.clone()), NormalizeStep::Raw)),
            UnparsedPolicy::Drop => {
                trace!(source = line.source.as_str(), "dropping unparseable line");
                counter!(m::NORMALIZER_LINES_DROPPED_TOTAL, m::LABEL_REASON => "unparsed")
                    .increment(1);
                None
            }
        }
    }
}

/// [`Normalizer`] 빌더
#[derive(Default)]
pub struct NormalizerBuilder {
    hostname: Option<String>,
    format: Option<LogFormat>,
    policy: UnparsedPolicy,
    stream_name: Option<String>,
}

impl NormalizerBuilder {
    /// 호스트 이름을 설정합니다. 생략하면 시스템 호스트 이름을 사용합니다.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// 사용자 정의 형식을 설정합니다.
    pub fn format(mut self, format: Option<LogFormat>) -> Self {
        self.format = format;
        self
    }

    /// 미해석 라인 정책을 설정합니다.
    pub fn policy(mut self, policy: UnparsedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 로그용 스트림 이름을 설정합니다.
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    /// 정규화기를 생성합니다.
    ///
    /// 사용자 정의 패턴 컴파일에 실패하면 경고를 남기고 해당 단계 없이 생성합니다.
    pub fn build(self) -> Result<Normalizer, LogShipperError> {
        let custom = self.format.as_ref().and_then(|format| {
            match CustomFormat::compile(format) {
                Ok(custom) => Some(custom),
                Err(e) => {
                    warn!(
                        stream = self.stream_name.as_deref().unwrap_or(""),
                        format = format.name.as_str(),
                        error = %e,
                        "invalid custom format pattern, stream will run without it"
                    );
                    None
                }
            }
        });

        Ok(Normalizer {
            hostname: self.hostname.unwrap_or_else(system_hostname),
            custom,
            access: AccessLogParser::new()?,
            policy: self.policy,
        })
    }
}

/// 시스템 호스트 이름 (실패 시 "unknown")
pub fn system_hostname() -> String {
    gethostname::gethostname()
        .into_string()
        .unwrap_or_else(|_| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn normalizer(policy: UnparsedPolicy) -> Normalizer {
        Normalizer::builder()
            .hostname("web-01")
            .policy(policy)
            .build()
            .unwrap()
    }

    fn line(text: &str) -> LogLine {
        LogLine::new("/var/log/app.log", text)
    }

    #[test]
    fn json_line_gets_host() {
        let (event, step) = normalizer(UnparsedPolicy::Raw)
            .normalize_with_step(&line(r#"{"a":1}"#))
            .unwrap();
        assert_eq!(step, NormalizeStep::Json);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"a": 1, "host": "web-01"})
        );
    }

    #[test]
    fn access_line_is_structured() {
        let text = r#"127.0.0.1 - - [22/Sep/2025:17:04:36 +0000] "GET /x HTTP/1.1" 200 2326"#;
        let (event, step) = normalizer(UnparsedPolicy::Raw)
            .normalize_with_step(&line(text))
            .unwrap();
        assert_eq!(step, NormalizeStep::Access);
        assert_eq!(event.get("status"), Some(&json!(200)));
        assert_eq!(event.get("bytes"), Some(&json!(2326)));
        assert_eq!(event.get("method"), Some(&json!("GET")));
        assert_eq!(event.get("path"), Some(&json!("/x")));
        assert_eq!(event.get("src"), Some(&json!("/var/log/app.log")));
    }

    #[test]
    fn unparseable_line_raw_policy() {
        let event = normalizer(UnparsedPolicy::Raw)
            .normalize(&line("kernel: something happened"))
            .unwrap();
        assert_eq!(event, Event::Raw("kernel: something happened".to_owned()));
    }

    #[test]
    fn unparseable_line_drop_policy() {
        assert!(
            normalizer(UnparsedPolicy::Drop)
                .normalize(&line("kernel: something happened"))
                .is_none()
        );
    }

    #[test]
    fn json_array_falls_through_to_raw() {
        let event = normalizer(UnparsedPolicy::Raw).normalize(&line("[1,2]")).unwrap();
        assert_eq!(event, Event::Raw("[1,2]".to_owned()));
    }

    #[test]
    fn custom_format_wins_over_json() {
        let format = LogFormat {
            name: "simple".to_owned(),
            pattern: r"(\w+): (.+)".to_owned(),
            fields: BTreeMap::from([
                ("method".to_owned(), "1".to_owned()),
                ("path".to_owned(), "2".to_owned()),
                ("host".to_owned(), "hostname".to_owned()),
            ]),
            default: BTreeMap::new(),
        };
        let normalizer = Normalizer::builder()
            .hostname("web-01")
            .format(Some(format))
            .build()
            .unwrap();
        assert!(normalizer.has_custom_format());

        let (event, step) = normalizer
            .normalize_with_step(&line("INFO: started"))
            .unwrap();
        assert_eq!(step, NormalizeStep::Custom);
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"method": "INFO", "path": "started", "host": "web-01"})
        );

        // 매칭 실패 시 JSON 단계로 넘어감
        let (_, step) = normalizer
            .normalize_with_step(&line(r#"{"x":true}"#))
            .unwrap();
        assert_eq!(step, NormalizeStep::Json);
    }

    #[test]
    fn invalid_custom_pattern_is_skipped() {
        let format = LogFormat {
            name: "broken".to_owned(),
            pattern: "(unclosed".to_owned(),
            ..Default::default()
        };
        let normalizer = Normalizer::builder()
            .hostname("h")
            .format(Some(format))
            .build()
            .unwrap();
        assert!(!normalizer.has_custom_format());
        assert!(normalizer.normalize(&line(r#"{"ok":1}"#)).is_some());
    }

    #[test]
    fn default_hostname_is_not_empty() {
        let normalizer = Normalizer::builder().build().unwrap();
        assert!(!normalizer.hostname().is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalize_arbitrary_text_does_not_panic(text in ".{0,2000}") {
                let normalizer = normalizer(UnparsedPolicy::Raw);
                let event = normalizer.normalize(&line(&text));
                // raw 정책에서는 항상 이벤트가 나옴
                prop_assert!(event.is_some());
            }

            #[test]
            fn structured_events_always_have_host(key in "[a-z]{1,12}", value in any::<i64>()) {
                let normalizer = normalizer(UnparsedPolicy::Drop);
                let text = format!("{{\"{key}\":{value}}}");
                let event = normalizer.normalize(&line(&text)).unwrap();
                prop_assert!(event.get("host").is_some());
            }

            #[test]
            fn access_numeric_fields_survive(status in 100i64..600, bytes in 0i64..10_000_000) {
                let normalizer = normalizer(UnparsedPolicy::Raw);
                let text = format!(
                    "10.0.0.1 - - [22/Sep/2025:17:04:36 +0000] \"GET /p HTTP/1.1\" {status} {bytes}"
                );
                let event = normalizer.normalize(&line(&text)).unwrap();
                prop_assert_eq!(event.get("status").and_then(|v| v.as_i64()), Some(status));
                prop_assert_eq!(event.get("bytes").and_then(|v| v.as_i64()), Some(bytes));
            }

            #[test]
            fn every_event_serializes_to_one_line(text in "\\PC{0,500}") {
                let normalizer = normalizer(UnparsedPolicy::Raw);
                if let Some(event) = normalizer.normalize(&line(&text)) {
                    let encoded = event.to_json_line().unwrap();
                    prop_assert!(!encoded.contains('\n'));
                }
            }
        }
    }
}
