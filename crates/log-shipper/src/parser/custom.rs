//! 사용자 정의 로그 형식
//!
//! 스트림 설정의 `format` 블록을 컴파일한 결과입니다.
//! 각 출력 필드는 다음 중 하나에서 값을 가져옵니다.
//!
//! - `"1"`, `"2"`, ... : 정규식 캡처 그룹 번호
//! - `"hostname"` : 에이전트 호스트 이름
//! - `"filename"` : 라인을 읽은 파일 경로
//!
//! `status`, `bytes`는 정수로, `rt`는 실수로 변환되며 변환에 실패하면
//! 캡처된 문자열을 그대로 사용합니다. 나머지 필드는 항상 문자열입니다.

use regex::Regex;
use serde_json::{Map, Number, Value};
use tailstream_core::config::LogFormat;

use crate::error::LogShipperError;

/// 필드 값의 출처
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldSource {
    Hostname,
    Filename,
    Group(usize),
    /// 알 수 없는 토큰: 필드를 채우지 않음
    Unknown,
}

impl FieldSource {
    fn parse(token: &str) -> Self {
        match token {
            "hostname" => Self::Hostname,
            "filename" => Self::Filename,
            other => other.parse().map(Self::Group).unwrap_or(Self::Unknown),
        }
    }
}

/// 컴파일된 사용자 정의 형식
#[derive(Debug, Clone)]
pub struct CustomFormat {
    regex: Regex,
    fields: Vec<(String, FieldSource)>,
    defaults: Map<String, Value>,
}

impl CustomFormat {
    /// 형식 정의를 컴파일합니다. 패턴이 잘못되었으면 에러를 반환합니다.
    pub fn compile(format: &LogFormat) -> Result<Self, LogShipperError> {
        let regex = Regex::new(&format.pattern)?;
        let fields = format
            .fields
            .iter()
            .map(|(field, token)| (field.clone(), FieldSource::parse(token)))
            .collect();
        let defaults = format
            .default
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            regex,
            fields,
            defaults,
        })
    }

    /// 라인에 형식을 적용합니다. 매칭되지 않으면 `None`.
    pub fn apply(&self, line: &str, source: &str, hostname: &str) -> Option<Map<String, Value>> {
        let caps = self.regex.captures(line)?;

        let mut event = self.defaults.clone();
        for (field, field_source) in &self.fields {
            let raw = match field_source {
                FieldSource::Hostname => Some(hostname),
                FieldSource::Filename => Some(source),
                FieldSource::Group(idx) => caps.get(*idx).map(|m| m.as_str()),
                FieldSource::Unknown => None,
            };
            if let Some(raw) = raw {
                event.insert(field.clone(), coerce(field, raw));
            }
        }

        event
            .entry("host")
            .or_insert_with(|| Value::String(hostname.to_owned()));
        Some(event)
    }
}

/// 필드 이름에 따른 타입 변환 (실패 시 문자열 유지)
pub(crate) fn coerce(field: &str, raw: &str) -> Value {
    let converted = match field {
        "status" | "bytes" => raw.parse::<i64>().ok().map(Value::from),
        "rt" => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    };
    converted.unwrap_or_else(|| Value::String(raw.to_owned()))
}
