use std::fmt;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StayError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A half-open stay interval `[check_in, check_out)`: the check-out day is
/// not occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NightRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl NightRange {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self> {
        if check_in >= check_out {
            return Err(StayError::invalid(format!(
                "check-out {check_out} must be after check-in {check_in}"
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Parse two `YYYY-MM-DD` strings.
    pub fn parse(check_in: &str, check_out: &str) -> Result<Self> {
        Self::new(parse_date(check_in)?, parse_date(check_out)?)
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Last occupied night.
    pub fn last_night(&self) -> NaiveDate {
        self.check_out.pred_opt().unwrap_or(self.check_in)
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn nights(&self) -> u32 {
        (self.check_out - self.check_in).num_days() as u32
    }

    pub fn iter_nights(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        days_between(self.check_in, self.check_out)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.check_in && date < self.check_out
    }

    pub fn overlaps(&self, other: &NightRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Same night count, moved by `offset` days. `None` if the shift leaves
    /// chrono's date range.
    pub fn shifted(&self, offset: i64) -> Option<NightRange> {
        let shift = |d: NaiveDate| {
            if offset >= 0 {
                d.checked_add_days(Days::new(offset.unsigned_abs()))
            } else {
                d.checked_sub_days(Days::new(offset.unsigned_abs()))
            }
        };
        Some(NightRange {
            check_in: shift(self.check_in)?,
            check_out: shift(self.check_out)?,
        })
    }
}

impl fmt::Display for NightRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {} ({} night{})",
            self.check_in.format(DATE_FORMAT),
            self.check_out.format(DATE_FORMAT),
            self.nights(),
            if self.nights() == 1 { "" } else { "s" }
        )
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| StayError::invalid(format!("invalid date '{s}' (expected YYYY-MM-DD): {e}")))
}

/// Every calendar day in `[from, to)`.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |d| *d < to)
}

/// Friday and Saturday nights carry the weekend markup.
pub fn is_weekend_night(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat)
}

pub fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}
