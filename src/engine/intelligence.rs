use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::types::IntelligenceConfig;
use crate::domain::calendar::RateCalendar;
use crate::domain::dates::{DATE_FORMAT, NightRange, add_days};
use crate::domain::intelligence::{IntelligenceReport, ReportRequest, build_report};
use crate::domain::property::Property;
use crate::error::{Result, StayError};
use crate::ports::cache::ReportCache;
use crate::ports::clock::Clock;
use crate::ports::rate_source::RateCalendarSource;
use crate::ports::store::PropertyDirectory;

const MAX_WINDOW_DAYS: u32 = 365;

/// Read-only analytics over a property's rate calendar. Never writes to the
/// ledger, so reports can be cached and recomputed freely.
pub struct PriceIntelligenceService {
    properties: Arc<dyn PropertyDirectory>,
    external: Option<Arc<dyn RateCalendarSource>>,
    internal: Arc<dyn RateCalendarSource>,
    clock: Arc<dyn Clock>,
    settings: IntelligenceConfig,
    external_timeout: Duration,
    cache: Option<(Arc<dyn ReportCache>, Duration)>,
}

impl PriceIntelligenceService {
    pub fn new(
        properties: Arc<dyn PropertyDirectory>,
        external: Option<Arc<dyn RateCalendarSource>>,
        internal: Arc<dyn RateCalendarSource>,
        clock: Arc<dyn Clock>,
        settings: IntelligenceConfig,
        external_timeout: Duration,
    ) -> Self {
        Self {
            properties,
            external,
            internal,
            clock,
            settings,
            external_timeout,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ReportCache>, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    /// Build a report for `window` days from today (configured default when
    /// `None`), plus alternatives around `requested` when given.
    pub async fn report(
        &self,
        property_id: &str,
        window: Option<u32>,
        requested: Option<NightRange>,
    ) -> Result<IntelligenceReport> {
        let window = window
            .unwrap_or(self.settings.window_days)
            .clamp(1, MAX_WINDOW_DAYS);
        let start = self.clock.today();
        if let Some(ref range) = requested {
            let horizon = MAX_WINDOW_DAYS + self.settings.flex_days;
            let latest = add_days(start, u64::from(horizon));
            if range.check_out() > latest {
                return Err(StayError::invalid(format!(
                    "requested stay {range} ends after {}, at most {horizon} days ahead",
                    latest.format(DATE_FORMAT)
                )));
            }
        }
        let key = cache_key(property_id, start, window, requested.as_ref());

        if let Some((ref cache, _)) = self.cache
            && let Some(cached) = cache.get(&key)
        {
            match serde_json::from_str::<IntelligenceReport>(&cached) {
                Ok(report) => {
                    debug!(property_id, %key, "Intelligence report served from cache");
                    return Ok(report);
                }
                Err(e) => warn!(%key, error = %e, "Discarding unreadable cached report"),
            }
        }

        let property = self.properties.get_property(property_id).await?;
        let mut end = add_days(start, u64::from(window));
        if let Some(ref range) = requested {
            // Shifted alternatives need rates past the requested check-out
            end = end.max(add_days(range.check_out(), u64::from(self.settings.flex_days)));
        }
        let calendar = self.fetch(&property, start, end).await?;

        let report = build_report(&ReportRequest {
            calendar: &calendar,
            window_start: start,
            window_days: window,
            requested,
            flex_days: self.settings.flex_days,
            max_alternatives: self.settings.max_alternatives,
            generated_at: self.clock.now(),
        });

        if let Some((ref cache, ttl)) = self.cache {
            match serde_json::to_string(&report) {
                Ok(json) => cache.set(&key, &json, ttl),
                Err(e) => warn!(%key, error = %e, "Could not cache intelligence report"),
            }
        }
        Ok(report)
    }

    /// External calendar when the property is linked and the PMS answers in
    /// time, the internal calendar otherwise.
    async fn fetch(
        &self,
        property: &Property,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> Result<RateCalendar> {
        if property.is_linked()
            && let Some(ref external) = self.external
        {
            let fetch = external.get_rates(property, from, to);
            match tokio::time::timeout(self.external_timeout, fetch).await {
                Ok(Ok(calendar)) => return Ok(calendar),
                Ok(Err(e)) => {
                    warn!(
                        property_id = %property.id,
                        error = %e,
                        "Falling back to internal rates"
                    );
                }
                Err(_) => {
                    warn!(
                        property_id = %property.id,
                        "PMS timed out, falling back to internal rates"
                    );
                }
            }
        }
        self.internal
            .get_rates(property, from, to)
            .await
            .map_err(|e| StayError::PricingUnavailable {
                reason: format!("no rate source answered: {e}"),
            })
    }
}

/// Keys share the `intel:{property_id}:` prefix so a ledger write can drop
/// every report for the property at once.
pub fn cache_key(
    property_id: &str,
    start: chrono::NaiveDate,
    window: u32,
    requested: Option<&NightRange>,
) -> String {
    let requested = requested.map_or_else(
        || "-".to_string(),
        |r| {
            format!(
                "{}..{}",
                r.check_in().format(DATE_FORMAT),
                r.check_out().format(DATE_FORMAT)
            )
        },
    );
    format!(
        "intel:{property_id}:{}:{window}:{requested}",
        start.format(DATE_FORMAT)
    )
}
