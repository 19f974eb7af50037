use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::dates::NightRange;
use crate::domain::quote::{PricingPolicy, QuoteBreakdown, QuoteRecord, price_stay};
use crate::domain::reservation::PartySize;
use crate::engine::resolver::{AvailabilityResolver, Resolution};
use crate::error::{Result, StayError};
use crate::ports::clock::{Clock, IdGenerator};
use crate::ports::rate_source::RateCalendarSource;
use crate::ports::store::QuoteStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub property_id: String,
    pub range: NightRange,
    pub party: PartySize,
    pub promo_code: Option<String>,
}

pub struct QuoteEngine {
    resolver: Arc<AvailabilityResolver>,
    internal: Arc<dyn RateCalendarSource>,
    quotes: Arc<dyn QuoteStore>,
    policy: PricingPolicy,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl QuoteEngine {
    pub fn new(
        resolver: Arc<AvailabilityResolver>,
        internal: Arc<dyn RateCalendarSource>,
        quotes: Arc<dyn QuoteStore>,
        policy: PricingPolicy,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            resolver,
            internal,
            quotes,
            policy,
            clock,
            ids,
        }
    }

    /// Resolve availability, price every night and persist the quote.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteRecord> {
        let resolution = self
            .resolver
            .resolve(&request.property_id, &request.range, &request.party)
            .await?;
        if let Some(err) = resolution.availability.to_error() {
            return Err(err);
        }

        let breakdown = self
            .price(&resolution, request.promo_code.as_deref())
            .await?;
        let created_at = self.clock.now();
        let record = QuoteRecord {
            id: self.ids.next_id(),
            property_id: request.property_id.clone(),
            range: request.range,
            party: request.party,
            promo_code: breakdown.promo_discount.as_ref().map(|p| p.code.clone()),
            breakdown,
            created_at,
            expires_at: created_at + self.policy.quote_ttl(),
        };
        self.quotes.save_quote(&record).await?;
        info!(
            quote_id = %record.id,
            property_id = %record.property_id,
            stay = %record.range,
            total = %record.breakdown.total,
            "Quote issued"
        );
        Ok(record)
    }

    /// Price from the external answer when there is one, otherwise from the
    /// internal calendar.
    pub async fn price(
        &self,
        resolution: &Resolution,
        promo_code: Option<&str>,
    ) -> Result<QuoteBreakdown> {
        let property = &resolution.property;
        let range = &resolution.availability.range;

        let rates = match resolution.external_rates {
            Some(ref days) => days.clone(),
            None => {
                let calendar = self
                    .internal
                    .get_rates(property, range.check_in(), range.check_out())
                    .await
                    .map_err(|e| {
                        warn!(property_id = %property.id, error = %e, "Internal rates unavailable");
                        StayError::PricingUnavailable {
                            reason: format!("no rate source answered: {e}"),
                        }
                    })?;
                calendar.days
            }
        };

        price_stay(
            &self.policy,
            range,
            &rates,
            property.cleaning_fee,
            &property.currency,
            promo_code,
        )
    }
}
