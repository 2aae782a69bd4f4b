#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tailstream_core::config::LogFormat;
use tailstream_core::event::LogLine;
use tailstream_log_shipper::{Normalizer, UnparsedPolicy};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 사용자 정의 형식 (없으면 JSON/access/raw만)
    format: Option<FuzzFormat>,
    drop_unparsed: bool,
    line: String,
}

#[derive(Arbitrary, Debug)]
struct FuzzFormat {
    pattern: String,
    /// (출력 필드, 캡처 그룹 번호) 최대 8개
    groups: Vec<(String, u8)>,
    with_hostname: bool,
    with_filename: bool,
}

impl FuzzFormat {
    fn into_format(self) -> LogFormat {
        let mut fields: BTreeMap<String, String> = self
            .groups
            .into_iter()
            .take(8)
            .map(|(field, group)| (field, group.to_string()))
            .collect();
        if self.with_hostname {
            fields.insert("host".to_owned(), "hostname".to_owned());
        }
        if self.with_filename {
            fields.insert("file".to_owned(), "filename".to_owned());
        }
        LogFormat {
            name: "fuzz".to_owned(),
            pattern: self.pattern,
            fields,
            default: BTreeMap::new(),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let policy = if input.drop_unparsed {
        UnparsedPolicy::Drop
    } else {
        UnparsedPolicy::Raw
    };
    let Ok(normalizer) = Normalizer::builder()
        .hostname("fuzz-host")
        .format(input.format.map(FuzzFormat::into_format))
        .policy(policy)
        .build()
    else {
        return;
    };

    let line = LogLine::new("/var/log/fuzz.log", input.line);
    match normalizer.normalize(&line) {
        Some(event) => {
            // 모든 이벤트는 JSON으로 직렬화 가능해야 함
            assert!(encodes_as_ndjson(&event));
        }
        None => assert!(input.drop_unparsed),
    }
});

fn encodes_as_ndjson(event: &tailstream_core::event::Event) -> bool {
    tailstream_log_shipper::encode_ndjson(std::slice::from_ref(event)).is_ok()
}
