use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::adapters::cache::memory_cache::MemoryCache;
use crate::adapters::sqlite::SqliteStore;
use crate::config::types::{Config, DatabaseConfig};
use crate::domain::calendar::RateDay;
use crate::domain::dates::{NightRange, days_between, parse_date};
use crate::domain::money::Money;
use crate::domain::property::{GuestProfile, Property};
use crate::domain::reservation::{
    DIRECT_SOURCE, PartySize, PaymentStatus, Reservation, ReservationAmounts, ReservationStatus,
};
use crate::engine::{EngineDeps, StayEngine};
use crate::error::Result;
use crate::ports::clock::{Clock, IdGenerator};
use crate::ports::pms_client::{OutboundReservation, PmsClient};
use crate::ports::store::GuestDirectory;

type CalendarFn = Box<dyn Fn(&str, NaiveDate, NaiveDate) -> Result<Vec<RateDay>> + Send + Sync>;
type CreateFn = Box<dyn Fn(&OutboundReservation) -> Result<String> + Send + Sync>;

pub struct MockPmsClient {
    calendar_fn: Mutex<CalendarFn>,
    create_fn: Mutex<CreateFn>,
    calendar_calls: AtomicUsize,
    created: Mutex<Vec<OutboundReservation>>,
}

impl Default for MockPmsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPmsClient {
    /// Every night available at 750.00 unless configured otherwise.
    pub fn new() -> Self {
        Self {
            calendar_fn: Mutex::new(Box::new(|_, from, to| {
                Ok(make_rates(from, to, 75_000, true))
            })),
            create_fn: Mutex::new(Box::new(|r| Ok(format!("PMS-{}", r.reference)))),
            calendar_calls: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_calendar(
        self,
        f: impl Fn(&str, NaiveDate, NaiveDate) -> Result<Vec<RateDay>> + Send + Sync + 'static,
    ) -> Self {
        *self.calendar_fn.lock().unwrap() = Box::new(f);
        self
    }

    #[must_use]
    pub fn with_create(
        self,
        f: impl Fn(&OutboundReservation) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        *self.create_fn.lock().unwrap() = Box::new(f);
        self
    }

    pub fn calendar_calls(&self) -> usize {
        self.calendar_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<OutboundReservation> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PmsClient for MockPmsClient {
    async fn get_calendar(
        &self,
        listing_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<RateDay>> {
        self.calendar_calls.fetch_add(1, Ordering::SeqCst);
        (self.calendar_fn.lock().unwrap())(listing_id, from, to)
    }

    async fn create_reservation(&self, reservation: &OutboundReservation) -> Result<String> {
        self.created.lock().unwrap().push(reservation.clone());
        (self.create_fn.lock().unwrap())(reservation)
    }
}

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
    prefix: &'static str,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        format!("{}-{}", self.prefix, self.next.fetch_add(1, Ordering::SeqCst))
    }
}

pub fn make_property(id: &str) -> Property {
    Property {
        id: id.to_string(),
        organization_id: "org1".into(),
        slug: format!("{id}-villa"),
        name: format!("Villa {id}"),
        base_price: Money::from_minor(75_000),
        currency: "ILS".into(),
        cleaning_fee: Money::from_minor(25_000),
        min_nights: 2,
        max_nights: None,
        max_guests: 4,
        external_listing_id: None,
    }
}

pub fn make_linked_property(id: &str, listing_id: &str) -> Property {
    Property {
        external_listing_id: Some(listing_id.to_string()),
        ..make_property(id)
    }
}

pub fn make_rate_day(date: &str, price_minor: i64, available: bool) -> RateDay {
    RateDay {
        date: parse_date(date).unwrap(),
        price: Money::from_minor(price_minor),
        available,
        min_nights: None,
    }
}

/// One rate per night of `[from, to)`, all at the same price.
pub fn make_rates(
    from: NaiveDate,
    to: NaiveDate,
    price_minor: i64,
    available: bool,
) -> Vec<RateDay> {
    days_between(from, to)
        .map(|date| RateDay {
            date,
            price: Money::from_minor(price_minor),
            available,
            min_nights: None,
        })
        .collect()
}

pub fn make_guest_profile() -> GuestProfile {
    GuestProfile {
        name: "Dana Cohen".into(),
        email: "dana@example.com".into(),
        phone: None,
    }
}

/// A direct reservation for guest `g1` at property `p1`.
pub fn make_reservation(
    id: &str,
    check_in: &str,
    check_out: &str,
    status: ReservationStatus,
) -> Reservation {
    let at = DateTime::parse_from_rfc3339("2026-04-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    Reservation {
        id: id.to_string(),
        organization_id: "org1".into(),
        property_id: "p1".into(),
        guest_id: "g1".into(),
        status,
        range: NightRange::parse(check_in, check_out).unwrap(),
        party: PartySize::new(2, 0),
        amounts: ReservationAmounts::total_only(Money::from_minor(150_000), "ILS"),
        payment_status: PaymentStatus::Paid,
        source: DIRECT_SOURCE.into(),
        external_id: None,
        notes: None,
        created_at: at,
        updated_at: at,
    }
}

pub async fn memory_store() -> SqliteStore {
    SqliteStore::connect(&DatabaseConfig {
        url: "sqlite::memory:".into(),
        ..DatabaseConfig::default()
    })
    .await
    .unwrap()
}

/// In-memory store holding property `p1` and guest `g1`.
pub async fn seeded_store() -> SqliteStore {
    let store = memory_store().await;
    store.upsert_property(&make_property("p1")).await.unwrap();
    store
        .find_or_create_guest("org1", &make_guest_profile(), "g1")
        .await
        .unwrap();
    store
}

/// Engine over `store` with default config, a clock fixed at
/// 2026-05-01T08:00Z and sequential ids.
pub fn make_engine(store: &Arc<SqliteStore>, pms: Option<Arc<MockPmsClient>>) -> StayEngine {
    let pms = pms.map(|client| -> Arc<dyn PmsClient> { client });
    let deps = EngineDeps::from_store(
        store,
        pms,
        Arc::new(MemoryCache::new(64)),
        Arc::new(FixedClock::at("2026-05-01T08:00:00Z")),
        Arc::new(SequentialIds::new("id")),
    );
    StayEngine::new(deps, &Config::default())
}
