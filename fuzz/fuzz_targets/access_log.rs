#![no_main]

use libfuzzer_sys::fuzz_target;
use tailstream_log_shipper::parser::AccessLogParser;
use tailstream_log_shipper::parser::access::parse_time_local;

fuzz_target!(|data: &[u8]| {
    let line = String::from_utf8_lossy(data);
    if let Ok(parser) = AccessLogParser::new() {
        let _ = parser.parse(&line, "/var/log/nginx/access.log", "fuzz-host");
    }
    let _ = parse_time_local(&line);
});
