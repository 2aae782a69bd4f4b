//! JSON 라인 처리
//!
//! 엄격한 JSON 객체 디코딩만 허용합니다. 배열/문자열/숫자 등
//! 객체가 아닌 값은 이 단계를 통과하지 못합니다.

use serde_json::{Map, Value};

/// JSON 객체 라인을 디코딩하고 `host`가 없으면 채웁니다.
///
/// 그 외 필드는 수정하지 않습니다.
pub fn parse_object(line: &str, hostname: &str) -> Option<Map<String, Value>> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(mut map)) => {
            map.entry("host")
                .or_insert_with(|| Value::String(hostname.to_owned()));
            Some(map)
        }
        _ => None,
    }
}
