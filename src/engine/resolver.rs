use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::availability::{AvailabilityResult, ExternalView, InternalView, evaluate};
use crate::domain::calendar::RateDay;
use crate::domain::dates::NightRange;
use crate::domain::property::Property;
use crate::domain::reservation::PartySize;
use crate::error::{Result, StayError};
use crate::ports::rate_source::RateCalendarSource;
use crate::ports::store::{LedgerStore, PropertyDirectory};

/// The availability decision together with what it was based on, so the
/// quote engine can price from the same external answer.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub property: Property,
    pub availability: AvailabilityResult,
    /// External rates for the requested nights when the PMS answered. May
    /// be incomplete; pricing treats a short answer as a hard error.
    pub external_rates: Option<Vec<RateDay>>,
}

enum ExternalFetch {
    NotLinked,
    Failed(String),
    Answered(Vec<RateDay>),
}

pub struct AvailabilityResolver {
    properties: Arc<dyn PropertyDirectory>,
    ledger: Arc<dyn LedgerStore>,
    external: Option<Arc<dyn RateCalendarSource>>,
    external_timeout: Duration,
}

impl AvailabilityResolver {
    pub fn new(
        properties: Arc<dyn PropertyDirectory>,
        ledger: Arc<dyn LedgerStore>,
        external: Option<Arc<dyn RateCalendarSource>>,
        external_timeout: Duration,
    ) -> Self {
        Self {
            properties,
            ledger,
            external,
            external_timeout,
        }
    }

    pub async fn resolve(
        &self,
        property_id: &str,
        range: &NightRange,
        party: &PartySize,
    ) -> Result<Resolution> {
        if party.adults == 0 {
            return Err(StayError::invalid("at least one adult is required"));
        }
        let property = self.properties.get_property(property_id).await?;

        let external = self.fetch_external(&property, range).await;
        let occupied = self.ledger.occupied_dates(&property.id, range).await?;
        let min_nights_override = self
            .ledger
            .calendar_days(&property.id, range.check_in(), range.check_out())
            .await?
            .iter()
            .filter_map(|day| day.min_nights)
            .max();

        let view = match external {
            ExternalFetch::NotLinked => ExternalView::NotLinked,
            ExternalFetch::Failed(ref reason) => ExternalView::Failed {
                reason: reason.clone(),
            },
            ExternalFetch::Answered(ref days) => ExternalView::Rates(days),
        };
        let availability = evaluate(
            &property,
            range,
            party,
            &view,
            &InternalView {
                occupied: &occupied,
                min_nights_override,
            },
        );
        debug!(
            property_id = %property.id,
            stay = %range,
            available = availability.available,
            source = %availability.source,
            "Availability resolved"
        );

        let external_rates = match external {
            ExternalFetch::Answered(days) => Some(days),
            _ => None,
        };
        Ok(Resolution {
            property,
            availability,
            external_rates,
        })
    }

    async fn fetch_external(&self, property: &Property, range: &NightRange) -> ExternalFetch {
        if !property.is_linked() {
            return ExternalFetch::NotLinked;
        }
        let Some(ref source) = self.external else {
            return ExternalFetch::Failed("PMS integration is disabled".into());
        };

        let fetch = source.get_rates(property, range.check_in(), range.check_out());
        match tokio::time::timeout(self.external_timeout, fetch).await {
            Ok(Ok(calendar)) => ExternalFetch::Answered(
                calendar
                    .days
                    .into_iter()
                    .filter(|day| range.contains(day.date))
                    .collect(),
            ),
            Ok(Err(e)) => {
                warn!(
                    property_id = %property.id,
                    error = %e,
                    "External rates unavailable, using internal ledger only"
                );
                ExternalFetch::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    property_id = %property.id,
                    timeout_ms = self.external_timeout.as_millis(),
                    "External rate lookup timed out"
                );
                ExternalFetch::Failed(format!(
                    "PMS did not answer within {}ms",
                    self.external_timeout.as_millis()
                ))
            }
        }
    }
}
