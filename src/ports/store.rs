use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::calendar::CalendarDay;
use crate::domain::dates::NightRange;
use crate::domain::events::EventLogEntry;
use crate::domain::property::{Guest, GuestProfile, Property};
use crate::domain::quote::QuoteRecord;
use crate::domain::reservation::{PartySize, Reservation, ReservationAmounts};
use crate::error::Result;

#[async_trait]
pub trait PropertyDirectory: Send + Sync {
    async fn get_property(&self, id: &str) -> Result<Property>;
    async fn find_by_listing(&self, external_listing_id: &str) -> Result<Option<Property>>;
}

#[async_trait]
pub trait GuestDirectory: Send + Sync {
    /// Returns the existing guest for `(organization, email)` or creates one
    /// with `new_id`.
    async fn find_or_create_guest(
        &self,
        organization_id: &str,
        profile: &GuestProfile,
        new_id: &str,
    ) -> Result<Guest>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub nights_released: u32,
    /// The reservation was already cancelled before this call.
    pub already_cancelled: bool,
}

/// Storage primitives behind the reservation ledger. Every night-range
/// write is atomic; a night held by someone else surfaces as `Conflict`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Booked or blocked dates in `range`, plus nights of live reservations
    /// overlapping it.
    async fn occupied_dates(&self, property_id: &str, range: &NightRange)
    -> Result<Vec<NaiveDate>>;

    /// Stored calendar rows in `[from, to)`.
    async fn calendar_days(
        &self,
        property_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarDay>>;

    /// Insert a reservation. A `confirmed` reservation has its nights
    /// reserved in the same transaction. A duplicate external id fails with
    /// `AlreadyExists`.
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()>;

    async fn get_reservation(&self, id: &str) -> Result<Reservation>;
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Reservation>>;

    /// Free the reservation's nights and mark it cancelled. Idempotent.
    async fn release(&self, reservation_id: &str, at: DateTime<Utc>) -> Result<ReleaseOutcome>;

    /// Move a live reservation to `new_range`. All or nothing.
    async fn transfer(
        &self,
        reservation_id: &str,
        new_range: &NightRange,
        at: DateTime<Utc>,
    ) -> Result<()>;

    /// `pending -> confirmed`, reserving the nights in the same transaction.
    async fn confirm(&self, reservation_id: &str, at: DateTime<Utc>) -> Result<()>;

    async fn update_details(
        &self,
        reservation_id: &str,
        party: &PartySize,
        amounts: &ReservationAmounts,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_external_id(&self, reservation_id: &str, external_id: &str) -> Result<()>;

    /// Returns the number of nights blocked. Refuses with `Conflict` when a
    /// night in the range is booked.
    async fn block(&self, property_id: &str, range: &NightRange, reason: Option<&str>)
    -> Result<u32>;

    /// Returns the number of nights unblocked. Booked nights are untouched.
    async fn unblock(&self, property_id: &str, range: &NightRange) -> Result<u32>;

    /// Calendar dates currently booked for a reservation.
    async fn reservation_nights(&self, reservation_id: &str) -> Result<Vec<NaiveDate>>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn save_quote(&self, quote: &QuoteRecord) -> Result<()>;
    async fn get_quote(&self, id: &str) -> Result<QuoteRecord>;
}

#[async_trait]
pub trait EventLog: Send + Sync {
    async fn record_event(&self, entry: &EventLogEntry) -> Result<()>;
    async fn recent_events(&self, limit: u32) -> Result<Vec<EventLogEntry>>;
}
