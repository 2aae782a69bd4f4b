//! 정규화 벤치마크
//!
//! 정규화 체인의 각 단계(사용자 정의, JSON, access log, raw)와 NDJSON 인코딩 처리량을 측정합니다.

use std::collections::BTreeMap;
use std::hint::black_box;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use tailstream_core::config::LogFormat;
use tailstream_core::event::LogLine;
use tailstream_log_shipper::{Normalizer, UnparsedPolicy, encode_ndjson};

const JSON_LINE: &str = r#"{"timestamp":"2025-09-22T17:04:36Z","level":"info","message":"request processed","duration_ms":245,"http":{"method":"POST","path":"/api/v1/users","status":201}}"#;

const COMMON_LINE: &str =
    r#"127.0.0.1 - - [22/Sep/2025:17:04:36 +0000] "GET /index.html HTTP/1.1" 200 2326"#;

const NGINX_RT_LINE: &str = r#"203.0.113.9 - - [22/Sep/2025:17:04:36 +0000] "GET /api/data HTTP/1.1" 200 5432 "https://example.com/" "Mozilla/5.0 (X11; Linux x86_64)" 0.234"#;

const LARAVEL_LINE: &str = "[2025-09-22 17:04:36] production.ERROR: Undefined variable $user";

const PLAIN_LINE: &str = "kernel: [12345.678] eth0: link becomes ready";

fn normalizer(format: Option<LogFormat>) -> Normalizer {
    Normalizer::builder()
        .hostname("bench-host")
        .format(format)
        .policy(UnparsedPolicy::Raw)
        .build()
        .unwrap()
}

fn laravel_format() -> LogFormat {
    LogFormat {
        name: "laravel".to_owned(),
        pattern: r"^\[([^\]]+)\] (\w+)\.(\w+): (.*)$".to_owned(),
        fields: BTreeMap::from([
            ("ts".to_owned(), "1".to_owned()),
            ("env".to_owned(), "2".to_owned()),
            ("level".to_owned(), "3".to_owned()),
            ("message".to_owned(), "4".to_owned()),
            ("src".to_owned(), "filename".to_owned()),
        ]),
        default: BTreeMap::new(),
    }
}

fn bench_fallback_chain(c: &mut Criterion) {
    let plain = normalizer(None);
    let custom = normalizer(Some(laravel_format()));
    let source = "/var/log/app.log";

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(1));

    group.bench_function("json", |b| {
        let line = LogLine::new(source, JSON_LINE);
        b.iter(|| plain.normalize(black_box(&line)))
    });

    group.bench_function("access_common", |b| {
        let line = LogLine::new(source, COMMON_LINE);
        b.iter(|| plain.normalize(black_box(&line)))
    });

    group.bench_function("access_nginx_rt", |b| {
        let line = LogLine::new(source, NGINX_RT_LINE);
        b.iter(|| plain.normalize(black_box(&line)))
    });

    group.bench_function("custom_format", |b| {
        let line = LogLine::new(source, LARAVEL_LINE);
        b.iter(|| custom.normalize(black_box(&line)))
    });

    // 모든 단계를 거쳐 raw로 떨어지는 최악의 경우
    group.bench_function("raw_fallthrough", |b| {
        let line = LogLine::new(source, PLAIN_LINE);
        b.iter(|| custom.normalize(black_box(&line)))
    });

    group.finish();
}

fn bench_ndjson_encoding(c: &mut Criterion) {
    let normalizer = normalizer(None);
    let events: Vec<_> = (0..100)
        .filter_map(|i| {
            let text = if i % 2 == 0 { JSON_LINE } else { COMMON_LINE };
            normalizer.normalize(&LogLine::new("/var/log/app.log", text))
        })
        .collect();

    let mut group = c.benchmark_group("ndjson");
    group.throughput(Throughput::Elements(events.len() as u64));
    group.bench_function("encode_batch_100", |b| {
        b.iter(|| encode_ndjson(black_box(&events)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_fallback_chain, bench_ndjson_encoding);
criterion_main!(benches);
