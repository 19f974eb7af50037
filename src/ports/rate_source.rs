use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::calendar::{RateCalendar, RateSourceKind};
use crate::domain::property::Property;
use crate::error::Result;

/// Where nightly price, availability and minimum stay come from.
#[async_trait]
pub trait RateCalendarSource: Send + Sync {
    fn kind(&self) -> RateSourceKind;

    /// One `RateDay` per date in `[from, to)`, ascending. Fails with
    /// `RateSourceUnavailable` rather than returning another source's data.
    async fn get_rates(
        &self,
        property: &Property,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RateCalendar>;
}
