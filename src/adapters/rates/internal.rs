use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::calendar::{RateCalendar, RateDay, RateSourceKind};
use crate::domain::dates::{days_between, is_weekend_night};
use crate::domain::property::Property;
use crate::error::Result;
use crate::ports::rate_source::RateCalendarSource;
use crate::ports::store::LedgerStore;

/// Rates derived from the internal calendar: a stored price override wins,
/// otherwise the property's base price with the weekend markup on Friday and
/// Saturday nights.
pub struct InternalRateSource {
    store: Arc<dyn LedgerStore>,
    weekend_markup_bps: u32,
}

impl InternalRateSource {
    pub fn new(store: Arc<dyn LedgerStore>, weekend_markup_bps: u32) -> Self {
        Self {
            store,
            weekend_markup_bps,
        }
    }
}

#[async_trait]
impl RateCalendarSource for InternalRateSource {
    fn kind(&self) -> RateSourceKind {
        RateSourceKind::Internal
    }

    async fn get_rates(
        &self,
        property: &Property,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RateCalendar> {
        let rows = self.store.calendar_days(&property.id, from, to).await?;
        let by_date: HashMap<NaiveDate, _> = rows.iter().map(|r| (r.date, r)).collect();

        let days = days_between(from, to)
            .map(|date| {
                let row = by_date.get(&date);
                let price = row.and_then(|r| r.price).unwrap_or_else(|| {
                    if is_weekend_night(date) {
                        property.base_price.marked_up_bps(self.weekend_markup_bps)
                    } else {
                        property.base_price
                    }
                });
                RateDay {
                    date,
                    price,
                    available: !row.is_some_and(|r| r.is_occupied()),
                    min_nights: row.and_then(|r| r.min_nights),
                }
            })
            .collect();

        Ok(RateCalendar {
            property_id: property.id.clone(),
            currency: property.currency.clone(),
            source: RateSourceKind::Internal,
            days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::{NightRange, parse_date};
    use crate::domain::money::Money;
    use crate::test_helpers::{make_property, memory_store};

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[tokio::test]
    async fn weekend_markup_applies_without_override() {
        let store = memory_store().await;
        let property = make_property("p1");
        store.upsert_property(&property).await.unwrap();
        let source = InternalRateSource::new(Arc::new(store), 2000);

        // 2026-05-07 is a Thursday
        let calendar = source
            .get_rates(&property, d("2026-05-07"), d("2026-05-10"))
            .await
            .unwrap();
        let prices: Vec<i64> = calendar.days.iter().map(|d| d.price.minor()).collect();
        assert_eq!(prices, vec![75_000, 90_000, 90_000]);
        assert!(calendar.days.iter().all(|d| d.available));
        assert_eq!(calendar.source, RateSourceKind::Internal);
    }

    #[tokio::test]
    async fn override_price_and_blocked_nights() {
        let store = memory_store().await;
        let property = make_property("p1");
        store.upsert_property(&property).await.unwrap();
        store
            .set_day_override(
                &property.id,
                d("2026-05-08"),
                Some(Money::from_minor(50_000)),
                Some(3),
            )
            .await
            .unwrap();
        store
            .block(
                &property.id,
                &NightRange::parse("2026-05-07", "2026-05-08").unwrap(),
                Some("maintenance"),
            )
            .await
            .unwrap();
        let source = InternalRateSource::new(Arc::new(store), 2000);

        let calendar = source
            .get_rates(&property, d("2026-05-07"), d("2026-05-09"))
            .await
            .unwrap();
        assert!(!calendar.days[0].available);
        assert_eq!(calendar.days[1].price, Money::from_minor(50_000));
        assert_eq!(calendar.days[1].min_nights, Some(3));
        assert!(calendar.days[1].available);
    }
}
