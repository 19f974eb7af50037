use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::dates::NightRange;
use crate::domain::reservation::{PartySize, Reservation, ReservationAmounts};
use crate::error::Result;
use crate::ports::cache::ReportCache;
use crate::ports::clock::Clock;
use crate::ports::store::{LedgerStore, ReleaseOutcome};

const DEFAULT_ATTEMPTS: u32 = 4;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(25);

/// The only writer of calendar nights. Every night-range write goes through
/// here so the no-double-booking guarantee lives in one place.
pub struct ReservationLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<dyn ReportCache>>,
    max_attempts: u32,
    backoff: Duration,
}

impl ReservationLedger {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            cache: None,
            max_attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Cached price-intelligence reports for a property are dropped after
    /// every write to its calendar.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ReportCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    async fn retrying<T, F, Fut>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(operation, attempt, error = %e, "Ledger write contended, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn invalidate(&self, property_id: &str) {
        if let Some(ref cache) = self.cache {
            let dropped = cache.invalidate_prefix(&format!("intel:{property_id}:"));
            if dropped > 0 {
                debug!(property_id, dropped, "Dropped cached intelligence reports");
            }
        }
    }

    /// Store a reservation. A confirmed one claims its nights atomically;
    /// losing the race to another booking is a `Conflict`.
    pub async fn reserve(&self, reservation: &Reservation) -> Result<()> {
        self.retrying("reserve", || self.store.insert_reservation(reservation))
            .await?;
        self.invalidate(&reservation.property_id);
        info!(
            reservation_id = %reservation.id,
            property_id = %reservation.property_id,
            stay = %reservation.range,
            status = %reservation.status,
            "Reservation recorded"
        );
        Ok(())
    }

    /// Cancel a reservation and free its nights. Releasing twice is a no-op.
    pub async fn release(&self, reservation_id: &str) -> Result<ReleaseOutcome> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        let at = self.clock.now();
        let outcome = self
            .retrying("release", || self.store.release(reservation_id, at))
            .await?;
        self.invalidate(&reservation.property_id);
        info!(
            reservation_id,
            nights = outcome.nights_released,
            already_cancelled = outcome.already_cancelled,
            "Reservation released"
        );
        Ok(outcome)
    }

    /// Move a reservation to new dates. On conflict the original nights are
    /// kept.
    pub async fn transfer(&self, reservation_id: &str, new_range: &NightRange) -> Result<()> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        let at = self.clock.now();
        self.retrying("transfer", || self.store.transfer(reservation_id, new_range, at))
            .await?;
        self.invalidate(&reservation.property_id);
        info!(
            reservation_id,
            from = %reservation.range,
            to = %new_range,
            "Reservation transferred"
        );
        Ok(())
    }

    pub async fn confirm(&self, reservation_id: &str) -> Result<()> {
        let reservation = self.store.get_reservation(reservation_id).await?;
        let at = self.clock.now();
        self.retrying("confirm", || self.store.confirm(reservation_id, at))
            .await?;
        self.invalidate(&reservation.property_id);
        info!(reservation_id, "Reservation confirmed");
        Ok(())
    }

    pub async fn update_details(
        &self,
        reservation_id: &str,
        party: &PartySize,
        amounts: &ReservationAmounts,
    ) -> Result<()> {
        let at = self.clock.now();
        self.retrying("update_details", || {
            self.store.update_details(reservation_id, party, amounts, at)
        })
        .await
    }

    /// Record the PMS's id for a reservation pushed there.
    pub async fn link_external(&self, reservation_id: &str, external_id: &str) -> Result<()> {
        self.retrying("link_external", || {
            self.store.set_external_id(reservation_id, external_id)
        })
        .await
    }

    pub async fn block(
        &self,
        property_id: &str,
        range: &NightRange,
        reason: Option<&str>,
    ) -> Result<u32> {
        let nights = self
            .retrying("block", || self.store.block(property_id, range, reason))
            .await?;
        self.invalidate(property_id);
        info!(property_id, stay = %range, nights, "Nights blocked");
        Ok(nights)
    }

    pub async fn unblock(&self, property_id: &str, range: &NightRange) -> Result<u32> {
        let nights = self
            .retrying("unblock", || self.store.unblock(property_id, range))
            .await?;
        self.invalidate(property_id);
        info!(property_id, stay = %range, nights, "Nights unblocked");
        Ok(nights)
    }

    pub async fn get(&self, reservation_id: &str) -> Result<Reservation> {
        self.store.get_reservation(reservation_id).await
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Reservation>> {
        self.store.find_by_external_id(external_id).await
    }
}
