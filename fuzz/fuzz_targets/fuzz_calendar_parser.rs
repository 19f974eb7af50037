#![no_main]
use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let (Some(from), Some(to)) = (
            NaiveDate::from_ymd_opt(2026, 5, 1),
            NaiveDate::from_ymd_opt(2026, 8, 1),
        ) else {
            return;
        };
        if let Ok(days) = staysync::adapters::pms::parser::parse_calendar(body, from, to) {
            assert!(days.windows(2).all(|w| w[0].date < w[1].date));
            assert!(days.iter().all(|d| d.date >= from && d.date < to));
        }
    }
});
