#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use staysync::adapters::cache::memory_cache::MemoryCache;
use staysync::adapters::sqlite::SqliteStore;
use staysync::config::types::{Config, DatabaseConfig};
use staysync::domain::booking::{BookingBasis, BookingRequest};
use staysync::domain::calendar::RateDay;
use staysync::domain::dates::{NightRange, days_between};
use staysync::domain::money::Money;
use staysync::domain::property::{GuestProfile, Property};
use staysync::domain::reservation::PartySize;
use staysync::engine::{EngineDeps, StayEngine};
use staysync::error::{Result, StayError};
use staysync::ports::clock::{Clock, IdGenerator};
use staysync::ports::pms_client::{OutboundReservation, PmsClient};

pub const NOW: &str = "2026-05-01T08:00:00Z";

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(rfc3339: &str) -> Self {
        Self {
            now: Mutex::new(
                DateTime::parse_from_rfc3339(rfc3339)
                    .unwrap()
                    .with_timezone(&Utc),
            ),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        format!("id-{}", self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// PMS stub: every listing sells every night at a flat price except the
/// dates in `closed`. Pushed reservations get `PMS-{reference}`.
pub struct FlatRatePms {
    price: Money,
    closed: Vec<NaiveDate>,
    down: bool,
    pub calendar_calls: AtomicUsize,
    pub created: Mutex<Vec<OutboundReservation>>,
}

impl FlatRatePms {
    pub fn new(price_minor: i64) -> Self {
        Self {
            price: Money::from_minor(price_minor),
            closed: Vec::new(),
            down: false,
            calendar_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn closed_on(mut self, dates: &[&str]) -> Self {
        self.closed = dates.iter().map(|d| date(d)).collect();
        self
    }

    pub fn down(mut self) -> Self {
        self.down = true;
        self
    }

    pub fn pushed(&self) -> Vec<OutboundReservation> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PmsClient for FlatRatePms {
    async fn get_calendar(
        &self,
        _listing_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RateDay>> {
        self.calendar_calls.fetch_add(1, Ordering::SeqCst);
        if self.down {
            return Err(StayError::transient("PMS returned 503 Service Unavailable"));
        }
        Ok(days_between(from, to)
            .map(|d| RateDay {
                date: d,
                price: self.price,
                available: !self.closed.contains(&d),
                min_nights: None,
            })
            .collect())
    }

    async fn create_reservation(&self, reservation: &OutboundReservation) -> Result<String> {
        self.created.lock().unwrap().push(reservation.clone());
        if self.down {
            return Err(StayError::transient("PMS returned 503 Service Unavailable"));
        }
        Ok(format!("PMS-{}", reservation.reference))
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn range(check_in: &str, check_out: &str) -> NightRange {
    NightRange::parse(check_in, check_out).unwrap()
}

/// 750.00 ILS a night, 250.00 cleaning, 2-night minimum, sleeps 4.
pub fn villa(id: &str) -> Property {
    Property {
        id: id.to_string(),
        organization_id: "org1".into(),
        slug: format!("{id}-villa"),
        name: format!("Villa {id}"),
        base_price: Money::from_minor(75_000),
        currency: "ILS".into(),
        cleaning_fee: Money::from_minor(25_000),
        min_nights: 2,
        max_nights: Some(30),
        max_guests: 4,
        external_listing_id: None,
    }
}

pub fn linked_villa(id: &str, listing_id: &str) -> Property {
    Property {
        external_listing_id: Some(listing_id.to_string()),
        ..villa(id)
    }
}

pub fn guest() -> GuestProfile {
    GuestProfile {
        name: "Dana Cohen".into(),
        email: "dana@example.com".into(),
        phone: Some("+972-50-000-0000".into()),
    }
}

pub fn stay_booking(property_id: &str, stay: NightRange, adults: u32) -> BookingRequest {
    BookingRequest {
        property_id: property_id.to_string(),
        basis: BookingBasis::Stay {
            range: stay,
            party: PartySize::new(adults, 0),
            promo_code: None,
        },
        guest: guest(),
        notes: None,
    }
}

pub fn quote_booking(property_id: &str, quote_id: &str) -> BookingRequest {
    BookingRequest {
        property_id: property_id.to_string(),
        basis: BookingBasis::Quote {
            quote_id: quote_id.to_string(),
        },
        guest: guest(),
        notes: Some("late arrival".into()),
    }
}

pub async fn memory_store(properties: &[Property]) -> Arc<SqliteStore> {
    let store = SqliteStore::connect(&DatabaseConfig {
        url: "sqlite::memory:".into(),
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    for property in properties {
        store.upsert_property(property).await.unwrap();
    }
    Arc::new(store)
}

pub struct Harness {
    pub engine: StayEngine,
    pub store: Arc<SqliteStore>,
    pub clock: Arc<FixedClock>,
}

pub fn engine_over(store: Arc<SqliteStore>, pms: Option<Arc<FlatRatePms>>) -> Harness {
    let clock = Arc::new(FixedClock::at(NOW));
    let mut config = Config::default();
    config.webhooks.retry_backoff_ms = 1;
    let deps = EngineDeps::from_store(
        &store,
        pms.map(|p| -> Arc<dyn PmsClient> { p }),
        Arc::new(MemoryCache::new(64)),
        clock.clone(),
        Arc::new(SequentialIds::new()),
    );
    Harness {
        engine: StayEngine::new(deps, &config),
        store,
        clock,
    }
}

/// Engine over an in-memory store holding `villa("p1")` and
/// `linked_villa("p2", "L-2")`.
pub async fn harness(pms: Option<Arc<FlatRatePms>>) -> Harness {
    let store = memory_store(&[villa("p1"), linked_villa("p2", "L-2")]).await;
    engine_over(store, pms)
}

pub fn created_event(
    external_id: &str,
    listing_id: &str,
    check_in: &str,
    check_out: &str,
) -> String {
    serde_json::json!({
        "event": "reservation.created",
        "id": format!("evt-{external_id}"),
        "reservation": {
            "_id": external_id,
            "listingId": listing_id,
            "checkInDateLocalized": check_in,
            "checkOutDateLocalized": check_out,
            "status": "confirmed",
            "guest": { "fullName": "Noa Levi", "email": "noa@example.com" },
            "guestsCount": { "adults": 2 },
            "money": { "totalPaid": 1843.5, "currency": "ILS" },
            "source": "Airbnb"
        }
    })
    .to_string()
}

pub fn cancelled_event(
    external_id: &str,
    listing_id: &str,
    check_in: &str,
    check_out: &str,
) -> String {
    serde_json::json!({
        "event": "reservation.cancelled",
        "reservation": {
            "_id": external_id,
            "listingId": listing_id,
            "checkIn": check_in,
            "checkOut": check_out,
            "status": "cancelled"
        }
    })
    .to_string()
}
