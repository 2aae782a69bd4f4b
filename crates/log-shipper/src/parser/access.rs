//! 웹 서버 access log 휴리스틱 파서
//!
//! 다음 순서로 시도하며 처음 구조가 맞는 패턴을 사용합니다.
//!
//! 1. nginx + 응답 시간: combined 뒤에 `rt` 숫자가 붙은 형식
//! 2. combined: referer, user-agent 포함
//! 3. common: `ip - - [ts] "METHOD path HTTP/x" status bytes`
//!
//! 숫자 필드 변환에 실패하면 해당 필드만 0이 되고 매칭은 유지됩니다.

use chrono::DateTime;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::error::LogShipperError;

/// nginx `$time_local` 형식
pub const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

const COMMON_PATTERN: &str = r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) ([^"]*) HTTP/[^"]*" (\d+) (\S+)"#;

const COMBINED_PATTERN: &str =
    r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) ([^"]*) HTTP/[^"]*" (\d+) (\S+) "([^"]*)" "([^"]*)""#;

const NGINX_RT_PATTERN: &str = r#"^(\S+) \S+ \S+ \[([^\]]+)\] "(\S+) ([^"]*) HTTP/[^"]*" (\d+) (\S+) "([^"]*)" "([^"]*)" ([0-9.]+)"#;

/// access log 한 줄에서 추출한 필드
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLogEntry {
    pub host: String,
    pub path: String,
    pub method: String,
    pub status: i64,
    pub rt: f64,
    pub bytes: i64,
    pub src: String,
    pub ip: String,
    pub user_agent: Option<String>,
    /// 요청 시각 (Unix 초)
    pub ts: Option<i64>,
}

impl AccessLogEntry {
    /// 이벤트 맵으로 변환합니다. 비어 있는 선택 필드는 생략됩니다.
    pub fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("host".to_owned(), Value::String(self.host));
        map.insert("path".to_owned(), Value::String(self.path));
        map.insert("method".to_owned(), Value::String(self.method));
        map.insert("status".to_owned(), Value::from(self.status));
        map.insert("rt".to_owned(), Value::from(self.rt));
        map.insert("bytes".to_owned(), Value::from(self.bytes));
        map.insert("src".to_owned(), Value::String(self.src));
        if !self.ip.is_empty() {
            map.insert("ip".to_owned(), Value::String(self.ip));
        }
        if let Some(ua) = self.user_agent.filter(|ua| !ua.is_empty()) {
            map.insert("user_agent".to_owned(), Value::String(ua));
        }
        if let Some(ts) = self.ts {
            map.insert("ts".to_owned(), Value::from(ts));
        }
        map
    }
}

/// 세 가지 access log 패턴을 담은 파서
#[derive(Debug, Clone)]
pub struct AccessLogParser {
    nginx_rt: Regex,
    combined: Regex,
    common: Regex,
}

impl AccessLogParser {
    /// 패턴을 컴파일합니다.
    pub fn new() -> Result<Self, LogShipperError> {
        Ok(Self {
            nginx_rt: Regex::new(NGINX_RT_PATTERN)?,
            combined: Regex::new(COMBINED_PATTERN)?,
            common: Regex::new(COMMON_PATTERN)?,
        })
    }

    /// 라인을 파싱합니다. 어떤 패턴도 맞지 않으면 `None`.
    pub fn parse(&self, line: &str, source: &str, hostname: &str) -> Option<AccessLogEntry> {
        if let Some(caps) = self.nginx_rt.captures(line) {
            let mut entry = base_entry(&caps, source, hostname);
            entry.user_agent = Some(group(&caps, 8).to_owned());
            entry.rt = group(&caps, 9).parse().unwrap_or(0.0);
            return Some(entry);
        }

        if let Some(caps) = self.combined.captures(line) {
            let mut entry = base_entry(&caps, source, hostname);
            entry.user_agent = Some(group(&caps, 8).to_owned());
            return Some(entry);
        }

        self.common
            .captures(line)
            .map(|caps| base_entry(&caps, source, hostname))
    }
}

fn group<'a>(caps: &Captures<'a>, idx: usize) -> &'a str {
    caps.get(idx).map_or("", |m| m.as_str())
}

fn base_entry(caps: &Captures<'_>, source: &str, hostname: &str) -> AccessLogEntry {
    AccessLogEntry {
        host: hostname.to_owned(),
        path: group(caps, 4).to_owned(),
        method: group(caps, 3).to_owned(),
        status: group(caps, 5).parse().unwrap_or(0),
        rt: 0.0,
        bytes: group(caps, 6).parse().unwrap_or(0),
        src: source.to_owned(),
        ip: group(caps, 1).to_owned(),
        user_agent: None,
        ts: parse_time_local(group(caps, 2)),
    }
}

/// `22/Sep/2025:17:04:36 +0000` 형식을 Unix 초로 변환합니다.
pub fn parse_time_local(raw: &str) -> Option<i64> {
    DateTime::parse_from_str(raw, TIME_LOCAL_FORMAT)
        .ok()
        .map(|dt| dt.timestamp())
}
