use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::booking::{BookingBasis, BookingConfirmation, BookingRequest, PaymentRequest};
use crate::domain::property::{GuestProfile, Property};
use crate::domain::quote::QuoteRecord;
use crate::domain::reservation::{
    DIRECT_SOURCE, PaymentStatus, Reservation, ReservationAmounts, ReservationStatus,
};
use crate::engine::ledger::ReservationLedger;
use crate::engine::quote::{QuoteEngine, QuoteRequest};
use crate::engine::resolver::AvailabilityResolver;
use crate::error::{Result, StayError};
use crate::ports::clock::{Clock, IdGenerator};
use crate::ports::pms_client::{OutboundReservation, PmsClient};
use crate::ports::store::{GuestDirectory, PropertyDirectory, QuoteStore};

/// Turns a quote (or freshly computed stay price) into a confirmed
/// reservation.
pub struct BookingService {
    properties: Arc<dyn PropertyDirectory>,
    resolver: Arc<AvailabilityResolver>,
    quote_engine: Arc<QuoteEngine>,
    quotes: Arc<dyn QuoteStore>,
    guests: Arc<dyn GuestDirectory>,
    ledger: Arc<ReservationLedger>,
    pms: Option<Arc<dyn PmsClient>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        properties: Arc<dyn PropertyDirectory>,
        resolver: Arc<AvailabilityResolver>,
        quote_engine: Arc<QuoteEngine>,
        quotes: Arc<dyn QuoteStore>,
        guests: Arc<dyn GuestDirectory>,
        ledger: Arc<ReservationLedger>,
        pms: Option<Arc<dyn PmsClient>>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            properties,
            resolver,
            quote_engine,
            quotes,
            guests,
            ledger,
            pms,
            clock,
            ids,
        }
    }

    pub async fn create_booking(&self, request: &BookingRequest) -> Result<BookingConfirmation> {
        if request.guest.normalized_email().is_empty() {
            return Err(StayError::invalid("guest email is required"));
        }

        let (quote, property) = match request.basis {
            BookingBasis::Quote { ref quote_id } => {
                let quote = self.quotes.get_quote(quote_id).await?;
                if quote.property_id != request.property_id {
                    return Err(StayError::invalid(format!(
                        "quote {quote_id} is for property {}, not {}",
                        quote.property_id, request.property_id
                    )));
                }
                quote.ensure_valid(self.clock.now())?;
                // Dates may have been taken since the quote was issued
                let resolution = self
                    .resolver
                    .resolve(&quote.property_id, &quote.range, &quote.party)
                    .await?;
                if let Some(err) = resolution.availability.to_error() {
                    return Err(err);
                }
                (quote, resolution.property)
            }
            BookingBasis::Stay {
                range,
                party,
                ref promo_code,
            } => {
                let quote = self
                    .quote_engine
                    .quote(&QuoteRequest {
                        property_id: request.property_id.clone(),
                        range,
                        party,
                        promo_code: promo_code.clone(),
                    })
                    .await?;
                let property = self.properties.get_property(&quote.property_id).await?;
                (quote, property)
            }
        };

        let guest_id = self.ids.next_id();
        let guest = self
            .guests
            .find_or_create_guest(&property.organization_id, &request.guest, &guest_id)
            .await?;

        let now = self.clock.now();
        let b = &quote.breakdown;
        let reservation = Reservation {
            id: self.ids.next_id(),
            organization_id: property.organization_id.clone(),
            property_id: property.id.clone(),
            guest_id: guest.id,
            status: ReservationStatus::Confirmed,
            range: quote.range,
            party: quote.party,
            amounts: ReservationAmounts {
                accommodation: b.discounted_accommodation,
                cleaning: b.cleaning_fee,
                service: b.service_fee,
                taxes: b.taxes,
                total: b.total,
                currency: b.currency.clone(),
            },
            payment_status: PaymentStatus::Pending,
            source: DIRECT_SOURCE.to_string(),
            external_id: None,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.ledger.reserve(&reservation).await?;

        let payment = PaymentRequest {
            amount: b.total,
            currency: b.currency.clone(),
            reference: reservation.id.clone(),
        };
        info!(
            reservation_id = %reservation.id,
            quote_id = %quote.id,
            total = %payment.amount,
            "Booking confirmed"
        );

        self.push_to_pms(&property, &reservation, &request.guest, &quote);

        Ok(BookingConfirmation {
            reservation,
            quote_id: quote.id,
            payment,
        })
    }

    /// Fire-and-forget: the booking is already confirmed, so a failed push
    /// is logged and never rolls anything back.
    fn push_to_pms(
        &self,
        property: &Property,
        reservation: &Reservation,
        guest: &GuestProfile,
        quote: &QuoteRecord,
    ) {
        let (Some(pms), Some(listing_id)) = (
            self.pms.clone(),
            property
                .external_listing_id
                .clone()
                .filter(|_| property.is_linked()),
        ) else {
            return;
        };
        let outbound = OutboundReservation {
            listing_id,
            range: reservation.range,
            guest: guest.clone(),
            party: reservation.party,
            total: quote.breakdown.total,
            currency: quote.breakdown.currency.clone(),
            reference: reservation.id.clone(),
        };
        let ledger = Arc::clone(&self.ledger);

        tokio::spawn(async move {
            let reservation_id = outbound.reference.clone();
            match pms.create_reservation(&outbound).await {
                Ok(external_id) => {
                    if let Err(e) = ledger.link_external(&reservation_id, &external_id).await {
                        warn!(
                            %reservation_id,
                            %external_id,
                            error = %e,
                            "Could not record PMS reservation id"
                        );
                    } else {
                        info!(%reservation_id, %external_id, "Booking pushed to PMS");
                    }
                }
                Err(e) => {
                    warn!(%reservation_id, error = %e, "Outbound PMS sync failed");
                }
            }
        });
    }

    pub async fn cancel_booking(&self, reservation_id: &str) -> Result<Reservation> {
        self.ledger.release(reservation_id).await?;
        self.ledger.get(reservation_id).await
    }

    pub async fn confirm_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        self.ledger.confirm(reservation_id).await?;
        self.ledger.get(reservation_id).await
    }
}
