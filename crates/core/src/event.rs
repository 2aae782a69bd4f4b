//! 이벤트 타입: 수집된 라인과 정규화된 이벤트
//!
//! # 흐름
//! ```text
//! Tailer ──LogLine──> Normalizer ──Event──> 스트림 큐 ──> Batch ──> NDJSON
//! ```
//!
//! [`Event`]는 원시 문자열 또는 구조화된 키/값 맵 중 하나이며,
//! 각 이벤트는 독립적으로 JSON 값 하나로 직렬화됩니다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 파일(또는 stdin)에서 읽은 한 줄
///
/// 줄 끝의 CR/LF는 제거된 상태입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// 소스 식별자 (파일 경로 또는 "stdin")
    pub source: String,
    /// 줄 내용
    pub text: String,
}

impl LogLine {
    /// 새 LogLine을 생성합니다.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// 정규화된 이벤트
///
/// 직렬화 시 태그 없이 값 자체로 출력됩니다.
/// `Raw`는 JSON 문자열, `Structured`는 JSON 객체가 됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    /// 해석하지 않은 원시 라인
    Raw(String),
    /// 구조화된 필드 맵
    Structured(Map<String, Value>),
}

impl Event {
    /// 구조화된 이벤트의 필드를 조회합니다. `Raw`이면 항상 `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Structured(map) => map.get(key),
            Self::Raw(_) => None,
        }
    }

    /// 원시 문자열에 대한 참조를 반환합니다.
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(line) => Some(line),
            Self::Structured(_) => None,
        }
    }

    /// 이벤트를 한 줄짜리 JSON으로 직렬화합니다 (줄바꿈 미포함).
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Map<String, Value>> for Event {
    fn from(map: Map<String, Value>) -> Self {
        Self::Structured(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_event_serializes_as_json_string() {
        let event = Event::Raw("plain \"quoted\" text".to_owned());
        assert_eq!(
            event.to_json_line().unwrap(),
            r#""plain \"quoted\" text""#
        );
    }

    #[test]
    fn structured_event_serializes_as_object() {
        let mut map = Map::new();
        map.insert("a".to_owned(), json!(1));
        let event = Event::from(map);
        assert_eq!(event.to_json_line().unwrap(), r#"{"a":1}"#);
        assert_eq!(event.get("a"), Some(&json!(1)));
        assert!(event.as_raw().is_none());
    }

    #[test]
    fn deserialize_picks_variant_by_shape() {
        let raw: Event = serde_json::from_str(r#""hello""#).unwrap();
        assert_eq!(raw.as_raw(), Some("hello"));

        let structured: Event = serde_json::from_str(r#"{"host":"web-01"}"#).unwrap();
        assert_eq!(structured.get("host"), Some(&json!("web-01")));
    }

    #[test]
    fn log_line_creation() {
        let line = LogLine::new("/var/log/nginx/access.log", "GET /");
        assert_eq!(line.source, "/var/log/nginx/access.log");
        assert_eq!(line.text, "GET /");
    }
}
