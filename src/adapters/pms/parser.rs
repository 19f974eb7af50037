use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::domain::calendar::RateDay;
use crate::domain::dates::parse_date;
use crate::domain::money::Money;
use crate::error::{Result, StayError};

/// Parse a PMS calendar response into one `RateDay` per date in
/// `[from, to)`, ascending.
///
/// Accepts `{"data":{"days":[..]}}`, `{"data":[..]}`, `{"days":[..]}` or a
/// bare array. Days with an unreadable date are skipped; a day without a
/// price cannot be sold and is reported unavailable.
pub fn parse_calendar(body: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<RateDay>> {
    let data: Value = serde_json::from_str(body).map_err(|e| StayError::RateSourceUnavailable {
        reason: format!("calendar response is not JSON: {e}"),
    })?;
    let entries = find_days(&data).ok_or_else(|| StayError::RateSourceUnavailable {
        reason: "calendar response has no days array".into(),
    })?;

    let mut days: Vec<RateDay> = entries
        .iter()
        .filter_map(parse_day)
        .filter(|d| d.date >= from && d.date < to)
        .collect();
    days.sort_by_key(|d| d.date);
    days.dedup_by_key(|d| d.date);
    Ok(days)
}

fn find_days(data: &Value) -> Option<&Vec<Value>> {
    if let Some(arr) = data.as_array() {
        return Some(arr);
    }
    if let Some(inner) = data.get("data") {
        if let Some(arr) = inner.as_array() {
            return Some(arr);
        }
        if let Some(arr) = inner.get("days").and_then(Value::as_array) {
            return Some(arr);
        }
    }
    data.get("days").and_then(Value::as_array)
}

fn parse_day(entry: &Value) -> Option<RateDay> {
    let raw_date = entry.get("date").and_then(Value::as_str)?;
    let Ok(date) = parse_date(raw_date.get(..10).unwrap_or(raw_date)) else {
        debug!(raw_date, "Skipping calendar day with unreadable date");
        return None;
    };

    let price = entry
        .get("price")
        .and_then(|p| p.as_f64().or_else(|| p.as_str().and_then(|s| s.parse().ok())))
        .and_then(Money::from_major)
        .filter(|price| !price.is_negative());

    let available = match entry.get("status").and_then(Value::as_str) {
        Some(status) => status.eq_ignore_ascii_case("available"),
        None => entry
            .get("available")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };

    let min_nights = entry
        .get("minNights")
        .or_else(|| entry.get("min_nights"))
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0);

    Some(RateDay {
        date,
        price: price.unwrap_or(Money::ZERO),
        available: available && price.is_some(),
        min_nights,
    })
}

/// Extract the PMS reservation id from a create-reservation response.
pub fn parse_created_reservation(body: &str) -> Result<String> {
    let data: Value = serde_json::from_str(body)?;
    let root = data.get("data").unwrap_or(&data);
    root.get("_id")
        .or_else(|| root.get("id"))
        .and_then(|v| {
            v.as_str()
                .map(str::to_string)
                .or_else(|| v.as_u64().map(|n| n.to_string()))
        })
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StayError::UpstreamRejected {
            status: 200,
            reason: "reservation response has no id".into(),
        })
}
