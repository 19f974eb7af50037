use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dates::DATE_FORMAT;
use super::money::Money;
use crate::error::StayError;

/// One night's price, availability and minimum stay as reported by a rate
/// source. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDay {
    pub date: NaiveDate,
    pub price: Money,
    pub available: bool,
    #[serde(default)]
    pub min_nights: Option<u32>,
}

/// Which system produced a set of rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RateSourceKind {
    External,
    Internal,
}

impl fmt::Display for RateSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => write!(f, "external PMS"),
            Self::Internal => write!(f, "internal calendar"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCalendar {
    pub property_id: String,
    pub currency: String,
    pub source: RateSourceKind,
    pub days: Vec<RateDay>,
}

impl RateCalendar {
    pub fn get(&self, date: NaiveDate) -> Option<&RateDay> {
        self.days
            .binary_search_by_key(&date, |d| d.date)
            .ok()
            .map(|i| &self.days[i])
    }

    /// Sort by date and keep the first entry for any duplicated date.
    pub fn normalize(&mut self) {
        self.days.sort_by_key(|d| d.date);
        self.days.dedup_by_key(|d| d.date);
    }
}

impl fmt::Display for RateCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Rate calendar for property {} ({}, from {})",
            self.property_id, self.currency, self.source
        )?;
        writeln!(
            f,
            "{:<12} {:>10} {:>10} {:>10}",
            "Date", "Price", "Available", "Min nights"
        )?;
        writeln!(f, "{}", "-".repeat(45))?;
        for day in &self.days {
            let min_nights = day
                .min_nights
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            writeln!(
                f,
                "{:<12} {:>10} {:>10} {:>10}",
                day.date.format(DATE_FORMAT).to_string(),
                day.price.to_string(),
                if day.available { "Yes" } else { "No" },
                min_nights
            )?;
        }
        Ok(())
    }
}

/// Internal per-day calendar state. `Available` is normally implicit (no
/// row); a stored `Available` row only carries a price or min-stay override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Available,
    Booked,
    Blocked,
}

impl DayStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Booked => "booked",
            Self::Blocked => "blocked",
        }
    }
}

impl FromStr for DayStatus {
    type Err = StayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "booked" => Ok(Self::Booked),
            "blocked" => Ok(Self::Blocked),
            other => Err(StayError::Database(format!("unknown day status '{other}'"))),
        }
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the internal calendar, unique per (property, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub property_id: String,
    pub date: NaiveDate,
    pub status: DayStatus,
    pub reservation_id: Option<String>,
    pub price: Option<Money>,
    pub min_nights: Option<u32>,
    pub block_reason: Option<String>,
}

impl CalendarDay {
    /// Booked or blocked: the night cannot be sold.
    pub fn is_occupied(&self) -> bool {
        matches!(self.status, DayStatus::Booked | DayStatus::Blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::parse_date;

    fn rate(date: &str, price: i64, available: bool) -> RateDay {
        RateDay {
            date: parse_date(date).unwrap(),
            price: Money::from_minor(price),
            available,
            min_nights: None,
        }
    }

    #[test]
    fn normalize_sorts_and_dedups() {
        let mut cal = RateCalendar {
            property_id: "p1".into(),
            currency: "ILS".into(),
            source: RateSourceKind::External,
            days: vec![
                rate("2026-05-03", 300, true),
                rate("2026-05-01", 100, true),
                rate("2026-05-01", 999, false),
            ],
        };
        cal.normalize();
        assert_eq!(cal.days.len(), 2);
        assert_eq!(cal.days[0].price, Money::from_minor(100));
        assert!(cal.get(parse_date("2026-05-03").unwrap()).is_some());
        assert!(cal.get(parse_date("2026-05-02").unwrap()).is_none());
    }

    #[test]
    fn display_lists_days() {
        let cal = RateCalendar {
            property_id: "p1".into(),
            currency: "ILS".into(),
            source: RateSourceKind::Internal,
            days: vec![rate("2026-05-01", 75_000, false)],
        };
        let s = cal.to_string();
        assert!(s.contains("property p1"));
        assert!(s.contains("internal calendar"));
        assert!(s.contains("750.00"));
        assert!(s.contains("No"));
    }

    #[test]
    fn day_status_roundtrips_through_str() {
        for status in [DayStatus::Available, DayStatus::Booked, DayStatus::Blocked] {
            assert_eq!(status.as_str().parse::<DayStatus>().unwrap(), status);
        }
        assert!("held".parse::<DayStatus>().is_err());
    }
}
