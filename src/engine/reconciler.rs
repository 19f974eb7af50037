use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::domain::events::{
    EventKind, EventLogEntry, ExternalBooking, ExternalEvent, ProcessingOutcome, ProcessingResult,
};
use crate::domain::money::Money;
use crate::domain::property::Property;
use crate::domain::reservation::{
    PaymentStatus, Reservation, ReservationAmounts, ReservationStatus,
};
use crate::engine::ledger::ReservationLedger;
use crate::error::{Result, StayError};
use crate::ports::clock::{Clock, IdGenerator};
use crate::ports::store::{EventLog, GuestDirectory, PropertyDirectory};

/// What applying one event did, before it is wrapped into the
/// acknowledgement.
struct Applied {
    outcome: ProcessingOutcome,
    organization_id: Option<String>,
    reservation_id: Option<String>,
    detail: String,
}

impl Applied {
    fn new(outcome: ProcessingOutcome, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            organization_id: None,
            reservation_id: None,
            detail: detail.into(),
        }
    }

    fn on(mut self, reservation: &Reservation) -> Self {
        self.organization_id = Some(reservation.organization_id.clone());
        self.reservation_id = Some(reservation.id.clone());
        self
    }
}

/// Applies PMS reservation lifecycle events to the ledger. Redelivery of an
/// already-applied event is a `Duplicate`, never a second reservation.
pub struct WebhookReconciler {
    properties: Arc<dyn PropertyDirectory>,
    guests: Arc<dyn GuestDirectory>,
    ledger: Arc<ReservationLedger>,
    events: Arc<dyn EventLog>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookReconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        properties: Arc<dyn PropertyDirectory>,
        guests: Arc<dyn GuestDirectory>,
        ledger: Arc<ReservationLedger>,
        events: Arc<dyn EventLog>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            properties,
            guests,
            ledger,
            events,
            clock,
            ids,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Parse and apply a raw webhook body. An unparseable body is logged
    /// and rejected.
    pub async fn handle_payload(&self, body: &str) -> Result<ProcessingResult> {
        let started = Instant::now();
        match ExternalEvent::parse(body) {
            Ok(event) => self.handle(&event).await,
            Err(e) => {
                warn!(error = %e, "Rejected unparseable webhook");
                self.log(EventLogEntry {
                    id: self.ids.next_id(),
                    event_id: None,
                    kind: "unparseable".into(),
                    organization_id: None,
                    external_id: None,
                    aggregate_id: None,
                    outcome: "rejected".into(),
                    detail: e.to_string(),
                    latency_ms: elapsed_ms(started),
                    received_at: self.clock.now(),
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn handle(&self, event: &ExternalEvent) -> Result<ProcessingResult> {
        let started = Instant::now();
        let kind = event.effective_kind();

        let mut attempt = 1;
        let applied = loop {
            match self.apply(&kind, event).await {
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        event_id = ?event.event_id,
                        attempt,
                        error = %e,
                        "Webhook processing hit a transient error, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                result => break result,
            }
        };

        let applied = match applied {
            Ok(applied) => applied,
            Err(e) => {
                warn!(event_id = ?event.event_id, %kind, error = %e, "Webhook processing failed");
                self.log(self.entry(event, "failed", None, None, e.to_string(), started))
                    .await;
                return Err(e);
            }
        };

        self.log(self.entry(
            event,
            applied.outcome.as_str(),
            applied.organization_id.clone(),
            applied.reservation_id.clone(),
            applied.detail.clone(),
            started,
        ))
        .await;
        info!(
            event_id = ?event.event_id,
            %kind,
            external_id = ?event.external_id(),
            outcome = applied.outcome.as_str(),
            "Webhook processed"
        );

        Ok(ProcessingResult {
            event_id: event.event_id.clone(),
            kind: event.kind.clone(),
            external_id: event.external_id().map(str::to_string),
            outcome: applied.outcome,
            reservation_id: applied.reservation_id,
            detail: applied.detail,
            acknowledged: true,
        })
    }

    async fn apply(&self, kind: &EventKind, event: &ExternalEvent) -> Result<Applied> {
        let Some(ref booking) = event.booking else {
            return Ok(Applied::new(
                ProcessingOutcome::Ignored,
                format!("{} is not a reservation event", event.kind),
            ));
        };
        let result = match kind {
            EventKind::Created => self.on_created(booking).await,
            EventKind::Updated => self.on_updated(booking).await,
            EventKind::Cancelled => self.on_cancelled(booking).await,
            EventKind::Other(name) => Ok(Applied::new(
                ProcessingOutcome::Ignored,
                format!("{name} is not handled"),
            )),
        };
        match result {
            Err(StayError::Unmapped { listing_id }) => {
                warn!(
                    %listing_id,
                    external_id = %booking.external_id,
                    "Webhook for unknown listing"
                );
                Ok(Applied::new(
                    ProcessingOutcome::Unmapped,
                    format!("no property linked to listing {listing_id}"),
                ))
            }
            Err(StayError::Conflict { dates, .. }) => {
                warn!(
                    external_id = %booking.external_id,
                    nights = dates.len(),
                    "External reservation collides with existing bookings"
                );
                let dates: Vec<String> = dates.iter().map(ToString::to_string).collect();
                Ok(Applied::new(
                    ProcessingOutcome::Conflict,
                    format!("nights already held: {}", dates.join(", ")),
                ))
            }
            other => other,
        }
    }

    async fn property_for(&self, booking: &ExternalBooking) -> Result<Property> {
        self.properties
            .find_by_listing(&booking.listing_id)
            .await?
            .ok_or_else(|| StayError::Unmapped {
                listing_id: booking.listing_id.clone(),
            })
    }

    async fn on_created(&self, booking: &ExternalBooking) -> Result<Applied> {
        if let Some(existing) = self.ledger.find_by_external_id(&booking.external_id).await? {
            return Ok(
                Applied::new(ProcessingOutcome::Duplicate, "already recorded").on(&existing),
            );
        }
        if booking.status == Some(ReservationStatus::Cancelled) {
            return Ok(Applied::new(
                ProcessingOutcome::Ignored,
                "reservation arrived already cancelled",
            ));
        }

        let property = self.property_for(booking).await?;
        let guest_id = self.ids.next_id();
        let guest = self
            .guests
            .find_or_create_guest(&property.organization_id, &booking.guest, &guest_id)
            .await?;

        let now = self.clock.now();
        let reservation = Reservation {
            id: self.ids.next_id(),
            organization_id: property.organization_id.clone(),
            property_id: property.id.clone(),
            guest_id: guest.id,
            status: ReservationStatus::Confirmed,
            range: booking.range,
            party: booking.party,
            amounts: ReservationAmounts::total_only(
                booking.total.unwrap_or(Money::ZERO),
                booking.currency.clone().unwrap_or(property.currency),
            ),
            payment_status: PaymentStatus::External,
            source: booking.source.clone(),
            external_id: Some(booking.external_id.clone()),
            notes: None,
            created_at: now,
            updated_at: now,
        };

        match self.ledger.reserve(&reservation).await {
            Ok(()) => Ok(Applied::new(
                ProcessingOutcome::Created,
                format!("{} nights reserved", reservation.range.nights()),
            )
            .on(&reservation)),
            // Lost a race with a concurrent delivery of the same event
            Err(StayError::AlreadyExists { .. }) => {
                debug!(external_id = %booking.external_id, "Concurrent duplicate delivery");
                Ok(Applied::new(ProcessingOutcome::Duplicate, "already recorded"))
            }
            // The nights may be held by this same reservation, recorded by a
            // concurrent delivery after the lookup above
            Err(StayError::Conflict { property_id, dates }) => {
                match self.ledger.find_by_external_id(&booking.external_id).await? {
                    Some(existing) => {
                        debug!(external_id = %booking.external_id, "Concurrent duplicate delivery");
                        Ok(Applied::new(ProcessingOutcome::Duplicate, "already recorded")
                            .on(&existing))
                    }
                    None => Err(StayError::Conflict { property_id, dates }),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn on_updated(&self, booking: &ExternalBooking) -> Result<Applied> {
        let Some(existing) = self.ledger.find_by_external_id(&booking.external_id).await? else {
            debug!(external_id = %booking.external_id, "Update for unknown reservation, creating");
            return self.on_created(booking).await;
        };
        if existing.status == ReservationStatus::Cancelled {
            return Ok(
                Applied::new(ProcessingOutcome::Ignored, "reservation is cancelled").on(&existing),
            );
        }

        let mut changes = Vec::new();
        let mut outcome = ProcessingOutcome::Duplicate;

        if booking.range != existing.range {
            self.ledger.transfer(&existing.id, &booking.range).await?;
            changes.push(format!("dates {} -> {}", existing.range, booking.range));
            outcome = ProcessingOutcome::Transferred;
        }

        let total_changed = booking.total.is_some_and(|t| t != existing.amounts.total);
        if booking.party != existing.party || total_changed {
            let amounts = match booking.total {
                Some(total) if total_changed => ReservationAmounts::total_only(
                    total,
                    booking
                        .currency
                        .clone()
                        .unwrap_or_else(|| existing.amounts.currency.clone()),
                ),
                _ => existing.amounts.clone(),
            };
            self.ledger
                .update_details(&existing.id, &booking.party, &amounts)
                .await?;
            if booking.party != existing.party {
                changes.push(format!(
                    "guests {} -> {}",
                    existing.party.occupancy(),
                    booking.party.occupancy()
                ));
            }
            if total_changed {
                changes.push(format!("total {} -> {}", existing.amounts.total, amounts.total));
            }
            if outcome == ProcessingOutcome::Duplicate {
                outcome = ProcessingOutcome::Updated;
            }
        }

        let detail = if changes.is_empty() {
            "no changes".to_string()
        } else {
            changes.join("; ")
        };
        Ok(Applied::new(outcome, detail).on(&existing))
    }

    async fn on_cancelled(&self, booking: &ExternalBooking) -> Result<Applied> {
        let Some(existing) = self.ledger.find_by_external_id(&booking.external_id).await? else {
            // TODO: remember cancellations for unknown ids so a late `created`
            // for the same reservation is not materialized.
            return Ok(Applied::new(
                ProcessingOutcome::Ignored,
                "no reservation with this external id",
            ));
        };
        let released = self.ledger.release(&existing.id).await?;
        if released.already_cancelled {
            return Ok(
                Applied::new(ProcessingOutcome::Duplicate, "already cancelled").on(&existing),
            );
        }
        Ok(Applied::new(
            ProcessingOutcome::Released,
            format!("{} nights released", released.nights_released),
        )
        .on(&existing))
    }

    fn entry(
        &self,
        event: &ExternalEvent,
        outcome: &str,
        organization_id: Option<String>,
        aggregate_id: Option<String>,
        detail: String,
        started: Instant,
    ) -> EventLogEntry {
        EventLogEntry {
            id: self.ids.next_id(),
            event_id: event.event_id.clone(),
            kind: event.kind.as_str().to_string(),
            organization_id,
            external_id: event.external_id().map(str::to_string),
            aggregate_id,
            outcome: outcome.to_string(),
            detail,
            latency_ms: elapsed_ms(started),
            received_at: self.clock.now(),
        }
    }

    /// The audit row is best effort; the event has been applied either way.
    async fn log(&self, entry: EventLogEntry) {
        if let Err(e) = self.events.record_event(&entry).await {
            warn!(entry_id = %entry.id, error = %e, "Could not write event log entry");
        }
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
