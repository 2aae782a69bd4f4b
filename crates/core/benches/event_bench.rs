//! 이벤트 직렬화 벤치마크
//!
//! Event 생성과 JSON 한 줄 직렬화 성능을 측정합니다.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Map, Value, json};
use tailstream_core::event::Event;

fn create_access_map() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("host".to_owned(), json!("web-01"));
    map.insert("path".to_owned(), json!("/api/v1/users?page=2"));
    map.insert("method".to_owned(), json!("GET"));
    map.insert("status".to_owned(), json!(200));
    map.insert("rt".to_owned(), json!(0.042));
    map.insert("bytes".to_owned(), json!(2326));
    map.insert("src".to_owned(), json!("/var/log/nginx/access.log"));
    map.insert("ip".to_owned(), json!("203.0.113.7"));
    map.insert("user_agent".to_owned(), json!("Mozilla/5.0 (X11; Linux x86_64)"));
    map
}

fn bench_event_serialization(c: &mut Criterion) {
    let structured = Event::Structured(create_access_map());
    let raw = Event::Raw(
        "2025-09-22 17:04:36 worker[1234]: job \"sync\" finished in 12ms".to_owned(),
    );

    let mut group = c.benchmark_group("event_serialization");
    group.throughput(Throughput::Elements(1));

    group.bench_function("structured_to_json_line", |b| {
        b.iter(|| black_box(&structured).to_json_line())
    });

    group.bench_function("raw_to_json_line", |b| {
        b.iter(|| black_box(&raw).to_json_line())
    });

    group.finish();
}

fn bench_event_creation(c: &mut Criterion) {
    c.bench_function("structured_event_creation", |b| {
        b.iter(|| Event::Structured(black_box(create_access_map())))
    });
}

criterion_group!(benches, bench_event_serialization, bench_event_creation);
criterion_main!(benches);
