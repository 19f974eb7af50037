#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        if let Ok(id) = staysync::adapters::pms::parser::parse_created_reservation(body) {
            assert!(!id.is_empty());
        }
    }
});
