#![no_main]

use libfuzzer_sys::fuzz_target;
use tailstream_core::config::AgentConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = AgentConfig::parse(content) {
            let _ = config.validate();
            let _ = config.resolved_streams();
        }
    }
});
