use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::calendar::{RateCalendar, RateSourceKind};
use crate::domain::property::Property;
use crate::error::{Result, StayError};
use crate::ports::pms_client::PmsClient;
use crate::ports::rate_source::RateCalendarSource;

/// Rates straight from the property's PMS listing.
pub struct ExternalRateSource {
    client: Arc<dyn PmsClient>,
}

impl ExternalRateSource {
    pub fn new(client: Arc<dyn PmsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RateCalendarSource for ExternalRateSource {
    fn kind(&self) -> RateSourceKind {
        RateSourceKind::External
    }

    async fn get_rates(
        &self,
        property: &Property,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<RateCalendar> {
        let listing_id = property
            .external_listing_id
            .as_deref()
            .filter(|_| property.is_linked())
            .ok_or_else(|| StayError::RateSourceUnavailable {
                reason: format!("property {} is not linked to a PMS listing", property.id),
            })?;

        let days = match self.client.get_calendar(listing_id, from, to).await {
            Ok(days) => days,
            Err(e @ StayError::RateSourceUnavailable { .. }) => return Err(e),
            Err(e) => {
                warn!(
                    property_id = %property.id,
                    listing_id,
                    error = %e,
                    "PMS calendar fetch failed"
                );
                return Err(StayError::RateSourceUnavailable {
                    reason: e.to_string(),
                });
            }
        };
        debug!(property_id = %property.id, days = days.len(), "External rates loaded");

        let mut calendar = RateCalendar {
            property_id: property.id.clone(),
            currency: property.currency.clone(),
            source: RateSourceKind::External,
            days,
        };
        calendar.normalize();
        Ok(calendar)
    }
}
