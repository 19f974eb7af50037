pub mod booking;
pub mod intelligence;
pub mod ledger;
pub mod quote;
pub mod reconciler;
pub mod resolver;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::adapters::cache::memory_cache::MemoryCache;
use crate::adapters::clock::{SystemClock, UuidGenerator};
use crate::adapters::pms::client::HttpPmsClient;
use crate::adapters::rates::external::ExternalRateSource;
use crate::adapters::rates::internal::InternalRateSource;
use crate::adapters::sqlite::SqliteStore;
use crate::config::types::Config;
use crate::domain::availability::AvailabilityResult;
use crate::domain::booking::{BookingConfirmation, BookingRequest};
use crate::domain::dates::NightRange;
use crate::domain::events::{EventLogEntry, ExternalEvent, ProcessingResult};
use crate::domain::intelligence::IntelligenceReport;
use crate::domain::quote::QuoteRecord;
use crate::domain::reservation::{PartySize, Reservation};
use crate::error::Result;
use crate::ports::cache::ReportCache;
use crate::ports::clock::{Clock, IdGenerator};
use crate::ports::pms_client::PmsClient;
use crate::ports::rate_source::RateCalendarSource;
use crate::ports::store::{EventLog, GuestDirectory, LedgerStore, PropertyDirectory, QuoteStore};

use booking::BookingService;
use intelligence::PriceIntelligenceService;
use ledger::ReservationLedger;
use quote::{QuoteEngine, QuoteRequest};
use reconciler::WebhookReconciler;
use resolver::AvailabilityResolver;

/// Everything the engine talks to. Ports are separate so tests can swap a
/// single collaborator.
pub struct EngineDeps {
    pub properties: Arc<dyn PropertyDirectory>,
    pub guests: Arc<dyn GuestDirectory>,
    pub ledger: Arc<dyn LedgerStore>,
    pub quotes: Arc<dyn QuoteStore>,
    pub events: Arc<dyn EventLog>,
    pub pms: Option<Arc<dyn PmsClient>>,
    pub cache: Arc<dyn ReportCache>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}

impl EngineDeps {
    /// Every storage port served by one SQLite store.
    pub fn from_store(
        store: &Arc<SqliteStore>,
        pms: Option<Arc<dyn PmsClient>>,
        cache: Arc<dyn ReportCache>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            properties: store.clone(),
            guests: store.clone(),
            ledger: store.clone(),
            quotes: store.clone(),
            events: store.clone(),
            pms,
            cache,
            clock,
            ids,
        }
    }
}

/// The operations exposed to the rest of the platform.
pub struct StayEngine {
    resolver: Arc<AvailabilityResolver>,
    quotes: Arc<QuoteEngine>,
    bookings: BookingService,
    reconciler: WebhookReconciler,
    intelligence: PriceIntelligenceService,
    ledger: Arc<ReservationLedger>,
    events: Arc<dyn EventLog>,
}

impl StayEngine {
    pub fn new(deps: EngineDeps, config: &Config) -> Self {
        let external_timeout = Duration::from_millis(config.availability.external_timeout_ms);
        let external = deps.pms.clone().map(|client| -> Arc<dyn RateCalendarSource> {
            Arc::new(ExternalRateSource::new(client))
        });
        let internal: Arc<dyn RateCalendarSource> = Arc::new(InternalRateSource::new(
            deps.ledger.clone(),
            config.pricing.weekend_markup_bps,
        ));

        let ledger = Arc::new(
            ReservationLedger::new(deps.ledger.clone(), deps.clock.clone())
                .with_cache(deps.cache.clone()),
        );
        let resolver = Arc::new(AvailabilityResolver::new(
            deps.properties.clone(),
            deps.ledger.clone(),
            external.clone(),
            external_timeout,
        ));
        let quotes = Arc::new(QuoteEngine::new(
            resolver.clone(),
            internal.clone(),
            deps.quotes.clone(),
            config.pricing.policy(),
            deps.clock.clone(),
            deps.ids.clone(),
        ));
        let bookings = BookingService::new(
            deps.properties.clone(),
            resolver.clone(),
            quotes.clone(),
            deps.quotes.clone(),
            deps.guests.clone(),
            ledger.clone(),
            deps.pms.clone(),
            deps.clock.clone(),
            deps.ids.clone(),
        );
        let reconciler = WebhookReconciler::new(
            deps.properties.clone(),
            deps.guests.clone(),
            ledger.clone(),
            deps.events.clone(),
            deps.clock.clone(),
            deps.ids.clone(),
            config.webhooks.max_attempts,
            Duration::from_millis(config.webhooks.retry_backoff_ms),
        );
        let intelligence = PriceIntelligenceService::new(
            deps.properties.clone(),
            external,
            internal,
            deps.clock.clone(),
            config.intelligence.clone(),
            external_timeout,
        )
        .with_cache(
            deps.cache.clone(),
            Duration::from_secs(config.cache.intelligence_ttl_secs),
        );

        Self {
            resolver,
            quotes,
            bookings,
            reconciler,
            intelligence,
            ledger,
            events: deps.events,
        }
    }

    /// Production wiring: SQLite store from `config.database` seeded with
    /// `config.properties`, HTTP PMS client when `pms.enabled`, in-memory
    /// report cache, system clock.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::connect(&config.database).await?);
        for property in &config.properties {
            store.upsert_property(property).await?;
        }
        let pms: Option<Arc<dyn PmsClient>> = if config.pms.enabled {
            Some(Arc::new(HttpPmsClient::new(config.pms.clone())?))
        } else {
            None
        };
        info!(
            database = %config.database.url,
            pms_enabled = pms.is_some(),
            properties = config.properties.len(),
            "Engine initialized"
        );
        let deps = EngineDeps::from_store(
            &store,
            pms,
            Arc::new(MemoryCache::new(config.cache.max_entries)),
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
        );
        Ok(Self::new(deps, config))
    }

    pub async fn check_availability(
        &self,
        property_id: &str,
        range: &NightRange,
        party: &PartySize,
    ) -> Result<AvailabilityResult> {
        Ok(self
            .resolver
            .resolve(property_id, range, party)
            .await?
            .availability)
    }

    pub async fn generate_quote(&self, request: &QuoteRequest) -> Result<QuoteRecord> {
        self.quotes.quote(request).await
    }

    pub async fn create_booking(&self, request: &BookingRequest) -> Result<BookingConfirmation> {
        self.bookings.create_booking(request).await
    }

    pub async fn cancel_booking(&self, reservation_id: &str) -> Result<Reservation> {
        self.bookings.cancel_booking(reservation_id).await
    }

    pub async fn confirm_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        self.bookings.confirm_reservation(reservation_id).await
    }

    pub async fn get_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        self.ledger.get(reservation_id).await
    }

    pub async fn handle_external_event(&self, event: &ExternalEvent) -> Result<ProcessingResult> {
        self.reconciler.handle(event).await
    }

    /// Raw webhook body, signature already verified by the transport.
    pub async fn handle_webhook_payload(&self, body: &str) -> Result<ProcessingResult> {
        self.reconciler.handle_payload(body).await
    }

    pub async fn price_intelligence(
        &self,
        property_id: &str,
        window_days: Option<u32>,
        requested: Option<NightRange>,
    ) -> Result<IntelligenceReport> {
        self.intelligence
            .report(property_id, window_days, requested)
            .await
    }

    pub async fn block_dates(
        &self,
        property_id: &str,
        range: &NightRange,
        reason: Option<&str>,
    ) -> Result<u32> {
        self.ledger.block(property_id, range, reason).await
    }

    pub async fn unblock_dates(&self, property_id: &str, range: &NightRange) -> Result<u32> {
        self.ledger.unblock(property_id, range).await
    }

    pub async fn recent_events(&self, limit: u32) -> Result<Vec<EventLogEntry>> {
        self.events.recent_events(limit).await
    }
}
