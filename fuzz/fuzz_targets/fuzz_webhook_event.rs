#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        if let Ok(event) = staysync::domain::events::ExternalEvent::parse(body) {
            if let Some(booking) = event.booking {
                assert!(booking.range.nights() >= 1);
            }
        }
    }
});
