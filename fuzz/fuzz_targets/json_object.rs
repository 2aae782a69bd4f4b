#![no_main]

use libfuzzer_sys::fuzz_target;
use tailstream_log_shipper::parser::json::parse_object;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        if let Some(map) = parse_object(line, "fuzz-host") {
            assert!(map.contains_key("host"));
        }
    }
});
