use std::fmt;

use serde::{Deserialize, Serialize};

use super::dates::NightRange;
use super::money::Money;
use super::property::GuestProfile;
use super::reservation::{PartySize, Reservation};

/// How the price of a booking is established: from a stored quote, or
/// recomputed from stay parameters at booking time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingBasis {
    Quote {
        quote_id: String,
    },
    Stay {
        range: NightRange,
        party: PartySize,
        promo_code: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub property_id: String,
    pub basis: BookingBasis,
    pub guest: GuestProfile,
    pub notes: Option<String>,
}

/// What the payment capture provider needs to collect the booking total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub currency: String,
    /// Reservation id, echoed back by the provider on capture.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub reservation: Reservation,
    pub quote_id: String,
    pub payment: PaymentRequest,
}

impl fmt::Display for BookingConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reservation)?;
        writeln!(f, "Quote: {}", self.quote_id)?;
        writeln!(
            f,
            "Payment due: {} {} (reference {})",
            self.payment.currency, self.payment.amount, self.payment.reference
        )
    }
}
