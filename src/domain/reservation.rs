use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dates::NightRange;
use super::money::Money;
use crate::error::{Result, StayError};

/// `pending → confirmed → cancelled`, plus `pending → cancelled`. Nothing
/// leaves `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed | Self::Cancelled) | (Self::Confirmed, Self::Cancelled)
        )
    }

    pub fn transition_to(self, next: ReservationStatus) -> Result<ReservationStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StayError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// Statuses that hold their dates against other bookings.
    pub fn holds_dates(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl FromStr for ReservationStatus {
    type Err = StayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(StayError::Database(format!(
                "unknown reservation status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Collected by the sales channel (OTA), not by this platform.
    External,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::External => "external",
            Self::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = StayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "external" => Ok(Self::External),
            "refunded" => Ok(Self::Refunded),
            other => Err(StayError::Database(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PartySize {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

impl PartySize {
    pub fn new(adults: u32, children: u32) -> Self {
        Self {
            adults,
            children,
            infants: 0,
        }
    }

    /// Guests counted against capacity. Infants do not occupy a bed.
    pub fn occupancy(&self) -> u32 {
        self.adults + self.children
    }
}

/// Monetary breakdown stored on a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationAmounts {
    pub accommodation: Money,
    pub cleaning: Money,
    pub service: Money,
    pub taxes: Money,
    pub total: Money,
    pub currency: String,
}

impl ReservationAmounts {
    /// Amounts known only as a channel total, e.g. from a PMS webhook.
    pub fn total_only(total: Money, currency: impl Into<String>) -> Self {
        Self {
            accommodation: total,
            cleaning: Money::ZERO,
            service: Money::ZERO,
            taxes: Money::ZERO,
            total,
            currency: currency.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub organization_id: String,
    pub property_id: String,
    pub guest_id: String,
    pub status: ReservationStatus,
    pub range: NightRange,
    pub party: PartySize,
    pub amounts: ReservationAmounts,
    pub payment_status: PaymentStatus,
    /// Sales channel tag: `direct`, `airbnb`, `booking.com`, ...
    pub source: String,
    /// External reservation id: the webhook correlation key.
    pub external_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_direct(&self) -> bool {
        self.source == DIRECT_SOURCE
    }
}

pub const DIRECT_SOURCE: &str = "direct";

impl fmt::Display for Reservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Reservation {}", self.id)?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Property: {}", self.property_id)?;
        writeln!(f, "Stay: {}", self.range)?;
        writeln!(
            f,
            "Guests: {} adults, {} children, {} infants",
            self.party.adults, self.party.children, self.party.infants
        )?;
        writeln!(
            f,
            "Total: {} {} (payment {})",
            self.amounts.currency,
            self.amounts.total,
            self.payment_status.as_str()
        )?;
        writeln!(f, "Source: {}", self.source)?;
        if let Some(ref ext) = self.external_id {
            writeln!(f, "External id: {ext}")?;
        }
        Ok(())
    }
}
